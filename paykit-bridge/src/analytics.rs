//! Logging hook for bridge failures.
//!
//! The bridge reports `{channel, errorKind}` events to a [`BridgeAnalytics`]
//! sink. The default sink writes them to `tracing`; hosting features usually
//! forward them into their own analytics client.

use serde::Serialize;

/// Kinds of failures the bridge reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeErrorKind {
    /// Inbound payload did not match the channel's shape.
    DecodeFailed,
    /// A reply arrived but did not decode.
    ReplyDecodeFailed,
    /// Content never replied.
    ReplyTimeout,
    /// A pending reply was cancelled by teardown or unregistration.
    ReplyCancelled,
    /// A reply arrived with nobody waiting for it.
    UnsolicitedReply,
    /// A message arrived on a channel with no handler.
    UnknownChannel,
    /// A native reply handler failed and an error envelope was sent.
    ReplyHandlerFailed,
    /// The content view rejected a script.
    ContentViewFailed,
}

impl BridgeErrorKind {
    /// Stable identifier for analytics pipelines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecodeFailed => "decode_failed",
            Self::ReplyDecodeFailed => "reply_decode_failed",
            Self::ReplyTimeout => "reply_timeout",
            Self::ReplyCancelled => "reply_cancelled",
            Self::UnsolicitedReply => "unsolicited_reply",
            Self::UnknownChannel => "unknown_channel",
            Self::ReplyHandlerFailed => "reply_handler_failed",
            Self::ContentViewFailed => "content_view_failed",
        }
    }
}

/// A single analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeErrorEvent {
    /// Channel the failure relates to.
    pub channel: String,
    /// What went wrong.
    pub error_kind: BridgeErrorKind,
}

impl BridgeErrorEvent {
    /// Create an event.
    pub fn new(channel: impl Into<String>, error_kind: BridgeErrorKind) -> Self {
        Self {
            channel: channel.into(),
            error_kind,
        }
    }
}

/// Sink for bridge failure events.
///
/// Called synchronously from the dispatching thread; implementations should
/// hand the event off rather than doing slow work inline.
pub trait BridgeAnalytics: Send + Sync {
    /// Record a failure.
    fn log_error(&self, event: &BridgeErrorEvent);
}

/// Default sink: structured `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl BridgeAnalytics for TracingAnalytics {
    fn log_error(&self, event: &BridgeErrorEvent) {
        tracing::warn!(
            channel = %event.channel,
            error_kind = event.error_kind.as_str(),
            "bridge error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = BridgeErrorEvent::new("fetchClientSecret", BridgeErrorKind::ReplyTimeout);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"channel": "fetchClientSecret", "errorKind": "reply_timeout"})
        );
    }

    #[test]
    fn test_kind_identifiers_match_serde() {
        for kind in [
            BridgeErrorKind::DecodeFailed,
            BridgeErrorKind::ReplyDecodeFailed,
            BridgeErrorKind::ReplyTimeout,
            BridgeErrorKind::ReplyCancelled,
            BridgeErrorKind::UnsolicitedReply,
            BridgeErrorKind::UnknownChannel,
            BridgeErrorKind::ReplyHandlerFailed,
            BridgeErrorKind::ContentViewFailed,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}
