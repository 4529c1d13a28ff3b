//! Paykit Bridge Mobile FFI Bindings
//!
//! UniFFI bindings that let iOS (Swift) and Android (Kotlin) screens plug
//! their web view into the Paykit bridge.
//!
//! # Architecture
//!
//! - The platform implements [`ContentViewCallback`] on top of `WKWebView`
//!   or `android.webkit.WebView`.
//! - [`BridgeHostFFI`] owns the bridge for one screen and a Tokio runtime
//!   for reply handlers.
//! - Messages cross the boundary as raw JSON strings; typed decoding happens
//!   on the platform side.
//!
//! # Thread Safety
//!
//! All exposed types are thread-safe. `receive` should be called on the main
//! thread, where the web view delivers messages. `send_and_await_reply_json`
//! blocks and must be called off the main thread.

pub mod async_bridge;
pub mod content_view_ffi;
pub mod handlers_ffi;
pub mod host_ffi;

pub use async_bridge::AsyncRuntime;
pub use content_view_ffi::{ContentViewCallback, ContentViewResult};
pub use handlers_ffi::{JsonMessageCallback, JsonReplyCallback, JsonReplyResult, SetterCallback};
pub use host_ffi::{BridgeHostFFI, ReplyResultCallback};

use paykit_bridge::{
    BridgeConfig, BridgeError, ConcurrentRequestPolicy, MetricsSnapshot, ReplyState,
};

// UniFFI scaffolding
uniffi::setup_scaffolding!();

// ============================================================================
// Error Types
// ============================================================================

/// Mobile-friendly error type.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BridgeMobileError {
    /// A payload did not decode.
    #[error("Decoding error: {msg}")]
    Decoding { msg: String },

    /// Invalid, reserved or duplicate channel.
    #[error("Channel error: {msg}")]
    Channel { msg: String },

    /// Another request on the channel is still awaiting its reply.
    #[error("Request in flight: {msg}")]
    RequestInFlight { msg: String },

    /// The content did not reply in time.
    #[error("Reply timeout: {msg}")]
    ReplyTimeout { msg: String },

    /// The content replied with an error.
    #[error("Remote error: {msg}")]
    Remote { msg: String },

    /// The request was cancelled by teardown or unregistration.
    #[error("Cancelled: {msg}")]
    Cancelled { msg: String },

    /// The bridge has been torn down.
    #[error("Bridge closed: {msg}")]
    Closed { msg: String },

    /// The web view rejected an operation.
    #[error("Content view error: {msg}")]
    ContentView { msg: String },

    /// Validation error (invalid input, format).
    #[error("Validation error: {msg}")]
    Validation { msg: String },

    /// Internal error (unexpected state).
    #[error("Internal error: {msg}")]
    Internal { msg: String },
}

impl From<BridgeError> for BridgeMobileError {
    fn from(e: BridgeError) -> Self {
        let msg = e.to_string();
        match e {
            BridgeError::Decoding(_)
            | BridgeError::ReplyDecode(_)
            | BridgeError::Encoding { .. } => Self::Decoding { msg },
            BridgeError::DuplicateChannel(_)
            | BridgeError::ReservedChannelName(_)
            | BridgeError::InvalidChannelName { .. } => Self::Channel { msg },
            BridgeError::RequestInFlight(_) => Self::RequestInFlight { msg },
            BridgeError::ReplyTimeout { .. } => Self::ReplyTimeout { msg },
            BridgeError::RemoteError { message, .. } => Self::Remote { msg: message },
            BridgeError::Cancelled(_) => Self::Cancelled { msg },
            BridgeError::HostClosed => Self::Closed { msg },
            BridgeError::ContentView(_) => Self::ContentView { msg },
            BridgeError::InvalidConfig(_) => Self::Validation { msg },
            BridgeError::Handler(_) | BridgeError::NoRuntime(_) => Self::Internal { msg },
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeMobileError>;

// ============================================================================
// Configuration
// ============================================================================

/// Bridge configuration.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct BridgeConfigFFI {
    /// Isolated script context all bridge traffic runs in.
    pub content_world: String,
    /// Content-side global exposing `channels[name]`.
    pub receiver_object: String,
    /// Reply timeout in milliseconds; `None` waits until teardown.
    pub reply_timeout_ms: Option<u64>,
    /// Queue overlapping requests instead of rejecting them.
    pub queue_concurrent_requests: bool,
    /// Panic on duplicate registration instead of returning an error.
    pub strict_registration: bool,
}

impl From<BridgeConfig> for BridgeConfigFFI {
    fn from(config: BridgeConfig) -> Self {
        Self {
            content_world: config.content_world,
            receiver_object: config.receiver_object,
            reply_timeout_ms: config.reply_timeout_ms,
            queue_concurrent_requests: config.concurrent_requests
                == ConcurrentRequestPolicy::Queue,
            strict_registration: config.strict_registration,
        }
    }
}

impl From<BridgeConfigFFI> for BridgeConfig {
    fn from(config: BridgeConfigFFI) -> Self {
        Self {
            content_world: config.content_world,
            receiver_object: config.receiver_object,
            reply_timeout_ms: config.reply_timeout_ms,
            concurrent_requests: if config.queue_concurrent_requests {
                ConcurrentRequestPolicy::Queue
            } else {
                ConcurrentRequestPolicy::Reject
            },
            strict_registration: config.strict_registration,
        }
    }
}

/// Default bridge configuration.
///
/// Registration is never strict across the FFI boundary: a panic there
/// would abort the app, so duplicates are returned as `Channel` errors.
#[uniffi::export]
pub fn default_bridge_config() -> BridgeConfigFFI {
    BridgeConfig::default()
        .with_strict_registration(false)
        .into()
}

// ============================================================================
// Status Types
// ============================================================================

/// Whether a channel has a request awaiting its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, uniffi::Enum)]
pub enum ReplyStateFFI {
    Idle,
    Awaiting,
}

impl From<ReplyState> for ReplyStateFFI {
    fn from(state: ReplyState) -> Self {
        match state {
            ReplyState::Idle => Self::Idle,
            ReplyState::Awaiting => Self::Awaiting,
        }
    }
}

/// Bridge counters.
#[derive(Clone, Debug, PartialEq, Eq, uniffi::Record)]
pub struct BridgeMetricsFFI {
    pub uptime_secs: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub replies_awaited: u64,
    pub replies_resolved: u64,
    pub reply_timeouts: u64,
    pub reply_cancellations: u64,
    pub unsolicited_replies: u64,
    pub decode_errors: u64,
    pub unknown_channels: u64,
    pub unknown_setters: u64,
}

impl From<MetricsSnapshot> for BridgeMetricsFFI {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            uptime_secs: s.uptime_secs,
            messages_received: s.messages_received,
            messages_sent: s.messages_sent,
            bytes_received: s.bytes_received,
            bytes_sent: s.bytes_sent,
            replies_awaited: s.replies_awaited,
            replies_resolved: s.replies_resolved,
            reply_timeouts: s.reply_timeouts,
            reply_cancellations: s.reply_cancellations,
            unsolicited_replies: s.unsolicited_replies,
            decode_errors: s.decode_errors,
            unknown_channels: s.unknown_channels,
            unknown_setters: s.unknown_setters,
        }
    }
}
