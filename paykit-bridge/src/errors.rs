//! Error types for bridge operations.
//!
//! Every failure the bridge can surface is a [`BridgeError`]. Decode failures
//! carry a [`DecodingError`] with the channel name and the raw payload so the
//! hosting feature can log something actionable.

use crate::analytics::BridgeErrorKind;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BridgeErrorCode {
    /// Inbound payload did not match the expected shape
    Decoding = 1000,
    /// Outbound payload could not be serialized
    Encoding = 1001,
    /// A handler is already installed for the channel
    DuplicateChannel = 2000,
    /// The name is reserved for reply routing
    ReservedChannelName = 2001,
    /// The name is not a valid channel identifier
    InvalidChannelName = 2002,
    /// A request on the channel is still awaiting its reply
    RequestInFlight = 3000,
    /// Content never replied
    ReplyTimeout = 3001,
    /// Content replied but the reply could not be decoded
    ReplyDecode = 3002,
    /// Content replied with an error envelope
    RemoteError = 3003,
    /// The waiter was cancelled (screen torn down, channel removed)
    Cancelled = 3004,
    /// A native reply handler failed
    Handler = 3005,
    /// The host has been torn down
    HostClosed = 4000,
    /// The content view rejected a script or handler installation
    ContentView = 4001,
    /// No async runtime is available for reply handlers
    NoRuntime = 4002,
    /// Bridge configuration is invalid
    InvalidConfig = 5000,
}

/// A payload that failed to decode into the shape a channel expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode message on {channel}: {reason}")]
pub struct DecodingError {
    /// Channel the payload arrived on.
    pub channel: String,
    /// The raw payload, kept for diagnostics.
    pub raw: String,
    /// Decoder message.
    pub reason: String,
}

impl DecodingError {
    /// Create a decoding error.
    pub fn new(
        channel: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Comprehensive error type for bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Inbound payload did not match the expected shape.
    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// Outbound payload could not be serialized.
    #[error("failed to encode message for {channel}: {reason}")]
    Encoding {
        /// Destination channel
        channel: String,
        /// Serializer message
        reason: String,
    },

    /// A handler is already installed under this name.
    #[error("channel {0} already has a registered handler")]
    DuplicateChannel(String),

    /// Names ending in `_reply` belong to the reply machinery.
    #[error("channel {0} is reserved for reply routing")]
    ReservedChannelName(String),

    /// The name is not a usable channel identifier.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidChannelName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Only one request per channel may await a reply at a time.
    #[error("a request on {0} is already awaiting its reply")]
    RequestInFlight(String),

    /// Content did not reply in time.
    #[error("no reply on {channel} after {timeout_ms}ms")]
    ReplyTimeout {
        /// Request channel
        channel: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// Content replied, but the reply did not decode.
    #[error("reply could not be decoded: {0}")]
    ReplyDecode(DecodingError),

    /// Content replied with an error envelope.
    #[error("content reported an error on {channel}: {message}")]
    RemoteError {
        /// Request channel
        channel: String,
        /// Message carried by the envelope
        message: String,
    },

    /// The waiter was cancelled before a reply arrived.
    #[error("request on {0} was cancelled")]
    Cancelled(String),

    /// A native reply handler failed.
    #[error("reply handler failed: {0}")]
    Handler(String),

    /// The owning host has been torn down.
    #[error("bridge host has been torn down")]
    HostClosed,

    /// The content view rejected an operation.
    #[error("content view error: {0}")]
    ContentView(String),

    /// No Tokio runtime was available to run an async reply handler.
    #[error("no async runtime available for reply handler on {0}")]
    NoRuntime(String),

    /// Configuration rejected by validation.
    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> BridgeErrorCode {
        match self {
            Self::Decoding(_) => BridgeErrorCode::Decoding,
            Self::Encoding { .. } => BridgeErrorCode::Encoding,
            Self::DuplicateChannel(_) => BridgeErrorCode::DuplicateChannel,
            Self::ReservedChannelName(_) => BridgeErrorCode::ReservedChannelName,
            Self::InvalidChannelName { .. } => BridgeErrorCode::InvalidChannelName,
            Self::RequestInFlight(_) => BridgeErrorCode::RequestInFlight,
            Self::ReplyTimeout { .. } => BridgeErrorCode::ReplyTimeout,
            Self::ReplyDecode(_) => BridgeErrorCode::ReplyDecode,
            Self::RemoteError { .. } => BridgeErrorCode::RemoteError,
            Self::Cancelled(_) => BridgeErrorCode::Cancelled,
            Self::Handler(_) => BridgeErrorCode::Handler,
            Self::HostClosed => BridgeErrorCode::HostClosed,
            Self::ContentView(_) => BridgeErrorCode::ContentView,
            Self::NoRuntime(_) => BridgeErrorCode::NoRuntime,
            Self::InvalidConfig(_) => BridgeErrorCode::InvalidConfig,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if issuing the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestInFlight(_) | Self::ReplyTimeout { .. } | Self::ContentView(_)
        )
    }

    /// The analytics kind reported for this error, if it is one the
    /// analytics sink tracks.
    pub fn analytics_kind(&self) -> Option<BridgeErrorKind> {
        match self {
            Self::Decoding(_) => Some(BridgeErrorKind::DecodeFailed),
            Self::ReplyDecode(_) => Some(BridgeErrorKind::ReplyDecodeFailed),
            Self::ReplyTimeout { .. } => Some(BridgeErrorKind::ReplyTimeout),
            Self::Cancelled(_) => Some(BridgeErrorKind::ReplyCancelled),
            Self::Handler(_) | Self::NoRuntime(_) => Some(BridgeErrorKind::ReplyHandlerFailed),
            Self::ContentView(_) => Some(BridgeErrorKind::ContentViewFailed),
            _ => None,
        }
    }

    /// Create a handler error from anything displayable.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }

    /// Create a content view error from anything displayable.
    pub fn content_view(message: impl std::fmt::Display) -> Self {
        Self::ContentView(message.to_string())
    }
}
