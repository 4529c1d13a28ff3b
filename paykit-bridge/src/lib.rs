//! Paykit Bridge
//!
//! Messaging between native code and the embedded web content of a
//! Connect screen. The content posts JSON messages on named channels; native
//! code answers by evaluating `postMessage` script in an isolated content
//! world. On top of that transport the crate provides:
//!
//! - typed one-way handlers ([`BridgeHost::install_one_way`]),
//! - request/reply correlation in both directions
//!   ([`BridgeHost::send_and_await_reply`], [`BridgeHost::install_with_reply`]),
//! - a setter multiplexer for callbacks that share one channel
//!   ([`setter::SetterChannel`]),
//! - analytics and metrics for everything that goes wrong.
//!
//! The platform web view is abstracted by [`ContentView`]; see
//! `paykit-bridge-mobile` for the Swift/Kotlin bindings and the `testing`
//! module (feature `test-utils`) for an in-memory implementation.

pub mod analytics;
pub mod channel;
pub mod codec;
pub mod config;
pub mod content_view;
pub mod errors;
pub mod handler;
pub mod host;
pub mod metrics;
pub mod registry;
pub mod reply;
pub mod setter;

/// Test doubles for the platform view and analytics sink.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use analytics::{BridgeAnalytics, BridgeErrorEvent, BridgeErrorKind, TracingAnalytics};
pub use channel::{ChannelId, ChannelName, Direction, IntoChannelName, KnownChannel};
pub use config::{BridgeConfig, ConcurrentRequestPolicy};
pub use content_view::{ContentView, ContentWorld};
pub use errors::{BridgeError, BridgeErrorCode, DecodingError};
pub use handler::{EmptyHandler, HandlerContext, MessageHandler, OneWayHandler};
pub use host::{BridgeHost, BridgeHostBuilder, BridgeSender};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use reply::{ReplyHandler, ReplyResponder, ReplyState, ResponderFn};
pub use setter::{KnownSetter, SetterChannel, SetterEvent, SetterOutcome};

/// Convenience alias for results returned by bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
