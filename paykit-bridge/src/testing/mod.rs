//! Testing utilities for code built on the bridge.
//!
//! [`MockContentView`] stands in for the platform web view: it records every
//! evaluated script and installed handler, and can loop posted messages back
//! into another host to play the content side. [`RecordingAnalytics`]
//! captures analytics events for assertions.
//!
//! # Usage
//!
//! ```rust
//! use paykit_bridge::testing::MockContentView;
//! use paykit_bridge::{BridgeConfig, BridgeHost};
//!
//! let view = MockContentView::new();
//! let host = BridgeHost::new(view.as_content_view(), BridgeConfig::relaxed()).unwrap();
//! host.send("updateConnectInstance", &serde_json::json!({"locale": "en"})).unwrap();
//!
//! let posted = view.posted_messages();
//! assert_eq!(posted[0].channel, "updateConnectInstance");
//! assert_eq!(posted[0].body, r#"{"locale":"en"}"#);
//! ```

pub mod mock_content_view;
pub mod recording_analytics;

pub use mock_content_view::{EvaluatedScript, MockContentView, PostedMessage};
pub use recording_analytics::RecordingAnalytics;
