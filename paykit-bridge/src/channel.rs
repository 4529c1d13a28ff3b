//! Channel names.
//!
//! Feature code addresses channels through [`ChannelName`] (validated) or
//! [`KnownChannel`] (the channels this SDK ships with). Raw strings only
//! appear at the transport edge, where [`ChannelId`] classifies them.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of the private channel a request's reply travels on.
pub const REPLY_SUFFIX: &str = "_reply";

/// A validated channel identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Validate a channel name supplied by feature code.
    ///
    /// Rejects empty names, characters outside `[A-Za-z0-9_]`, and names
    /// ending in `_reply`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        if name.ends_with(REPLY_SUFFIX) {
            return Err(BridgeError::ReservedChannelName(name));
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The private channel replies to this channel travel on.
    pub fn reply_channel(&self) -> ChannelName {
        ChannelName(format!("{}{}", self.0, REPLY_SUFFIX))
    }

    /// Whether this is a reply channel.
    pub fn is_reply_channel(&self) -> bool {
        self.0.ends_with(REPLY_SUFFIX)
    }

    /// The request channel a reply channel belongs to.
    pub fn request_channel(&self) -> Option<ChannelName> {
        self.0
            .strip_suffix(REPLY_SUFFIX)
            .map(|request| ChannelName(request.to_string()))
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::InvalidChannelName {
            name: name.to_string(),
            reason: "name is empty".into(),
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(BridgeError::InvalidChannelName {
            name: name.to_string(),
            reason: format!("unexpected character {c:?}"),
        });
    }
    Ok(())
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ChannelName {
    type Error = BridgeError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<KnownChannel> for ChannelName {
    fn from(channel: KnownChannel) -> Self {
        ChannelName(channel.as_str().to_string())
    }
}

/// Anything feature code may pass where a channel is expected.
///
/// Reply channels are rejected regardless of how the name was obtained.
pub trait IntoChannelName {
    /// Convert into a validated, non-reply channel name.
    fn into_channel_name(self) -> Result<ChannelName>;
}

impl IntoChannelName for ChannelName {
    fn into_channel_name(self) -> Result<ChannelName> {
        if self.is_reply_channel() {
            return Err(BridgeError::ReservedChannelName(self.0));
        }
        Ok(self)
    }
}

impl IntoChannelName for &ChannelName {
    fn into_channel_name(self) -> Result<ChannelName> {
        self.clone().into_channel_name()
    }
}

impl IntoChannelName for &str {
    fn into_channel_name(self) -> Result<ChannelName> {
        ChannelName::new(self)
    }
}

impl IntoChannelName for String {
    fn into_channel_name(self) -> Result<ChannelName> {
        ChannelName::new(self)
    }
}

impl IntoChannelName for KnownChannel {
    fn into_channel_name(self) -> Result<ChannelName> {
        Ok(self.into())
    }
}

/// Which side of the bridge posts on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The web content posts, native code handles.
    ContentToNative,
    /// Native code posts, the web content handles.
    NativeToContent,
}

/// Channels the native SDK understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KnownChannel {
    /// Content asks for the component's initial parameters.
    FetchInitParams,
    /// Content asks for a fresh account session client secret.
    FetchClientSecret,
    /// Content asks for component-specific props.
    FetchInitComponentProps,
    /// Content finished loading.
    PageDidLoad,
    /// The account session was claimed by the content.
    AccountSessionClaimed,
    /// Debug log line from the content.
    Debug,
    /// Multiplexed setter events.
    OnSetterFunctionCalled,
    /// Content wants an authenticated browser session.
    OpenAuthenticatedWebView,
    /// Content wants to start bank linking.
    OpenFinancialConnections,
    /// Native pushes appearance or locale updates.
    UpdateConnectInstance,
    /// Native asks the content to log out.
    Logout,
    /// Native calls a content setter with a serializable value.
    CallSetterWithSerializableValue,
    /// Native reports the outcome of an authenticated browser session.
    ReturnedFromAuthenticatedWebView,
}

impl KnownChannel {
    /// Every known channel.
    pub const ALL: [KnownChannel; 13] = [
        KnownChannel::FetchInitParams,
        KnownChannel::FetchClientSecret,
        KnownChannel::FetchInitComponentProps,
        KnownChannel::PageDidLoad,
        KnownChannel::AccountSessionClaimed,
        KnownChannel::Debug,
        KnownChannel::OnSetterFunctionCalled,
        KnownChannel::OpenAuthenticatedWebView,
        KnownChannel::OpenFinancialConnections,
        KnownChannel::UpdateConnectInstance,
        KnownChannel::Logout,
        KnownChannel::CallSetterWithSerializableValue,
        KnownChannel::ReturnedFromAuthenticatedWebView,
    ];

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchInitParams => "fetchInitParams",
            Self::FetchClientSecret => "fetchClientSecret",
            Self::FetchInitComponentProps => "fetchInitComponentProps",
            Self::PageDidLoad => "pageDidLoad",
            Self::AccountSessionClaimed => "accountSessionClaimed",
            Self::Debug => "debug",
            Self::OnSetterFunctionCalled => "onSetterFunctionCalled",
            Self::OpenAuthenticatedWebView => "openAuthenticatedWebView",
            Self::OpenFinancialConnections => "openFinancialConnections",
            Self::UpdateConnectInstance => "updateConnectInstance",
            Self::Logout => "logout",
            Self::CallSetterWithSerializableValue => "callSetterWithSerializableValue",
            Self::ReturnedFromAuthenticatedWebView => "returnedFromAuthenticatedWebView",
        }
    }

    /// Which side posts on this channel.
    pub fn direction(&self) -> Direction {
        match self {
            Self::UpdateConnectInstance
            | Self::Logout
            | Self::CallSetterWithSerializableValue
            | Self::ReturnedFromAuthenticatedWebView => Direction::NativeToContent,
            _ => Direction::ContentToNative,
        }
    }

    /// Whether the poster awaits a reply on the paired `_reply` channel.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Self::FetchInitParams
                | Self::FetchClientSecret
                | Self::FetchInitComponentProps
                | Self::Logout
        )
    }
}

impl fmt::Display for KnownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel name as seen at the transport edge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// A channel this SDK knows about.
    Known(KnownChannel),
    /// Anything else, typically from newer web content.
    Unrecognized(String),
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        KnownChannel::ALL
            .iter()
            .find(|known| known.as_str() == name)
            .map(|known| ChannelId::Known(*known))
            .unwrap_or_else(|| ChannelId::Unrecognized(name.to_string()))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(known) => f.write_str(known.as_str()),
            Self::Unrecognized(name) => f.write_str(name),
        }
    }
}
