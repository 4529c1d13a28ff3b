//! Configuration for a bridge host.

use crate::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when a second request is issued on a channel whose first
/// request is still awaiting its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrentRequestPolicy {
    /// Fail the second caller with `RequestInFlight`.
    #[default]
    Reject,
    /// Make the second caller wait until the first resolves.
    Queue,
}

/// Bridge host configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Isolated script context all bridge traffic runs in.
    #[serde(default = "default_content_world")]
    pub content_world: String,

    /// Global object on the content side that exposes `channels[name]`.
    #[serde(default = "default_receiver_object")]
    pub receiver_object: String,

    /// How long `send_and_await_reply` waits; `None` waits until teardown.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: Option<u64>,

    /// Policy for overlapping requests on one channel.
    #[serde(default)]
    pub concurrent_requests: ConcurrentRequestPolicy,

    /// Panic on duplicate registration instead of returning an error.
    #[serde(default = "default_strict_registration")]
    pub strict_registration: bool,
}

fn default_content_world() -> String {
    "paykitBridge".to_string()
}

fn default_receiver_object() -> String {
    "hostBridge".to_string()
}

fn default_reply_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_strict_registration() -> bool {
    cfg!(debug_assertions)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            content_world: default_content_world(),
            receiver_object: default_receiver_object(),
            reply_timeout_ms: default_reply_timeout_ms(),
            concurrent_requests: ConcurrentRequestPolicy::default(),
            strict_registration: default_strict_registration(),
        }
    }
}

impl BridgeConfig {
    /// Configuration for tests: duplicate registration returns an error
    /// and replies time out after one second.
    pub fn relaxed() -> Self {
        Self {
            reply_timeout_ms: Some(1_000),
            strict_registration: false,
            ..Self::default()
        }
    }

    /// Set the content world.
    pub fn with_content_world(mut self, world: impl Into<String>) -> Self {
        self.content_world = world.into();
        self
    }

    /// Set the content-side receiver object.
    pub fn with_receiver_object(mut self, receiver: impl Into<String>) -> Self {
        self.receiver_object = receiver.into();
        self
    }

    /// Set the reply timeout.
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Set the concurrent request policy.
    pub fn with_concurrent_requests(mut self, policy: ConcurrentRequestPolicy) -> Self {
        self.concurrent_requests = policy;
        self
    }

    /// Set strict registration.
    pub fn with_strict_registration(mut self, strict: bool) -> Self {
        self.strict_registration = strict;
        self
    }

    /// The reply timeout as a `Duration`.
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    /// Check that the configuration can be used to build scripts.
    ///
    /// The receiver object is interpolated into evaluated script, so it must
    /// be a dotted JavaScript identifier path.
    pub fn validate(&self) -> Result<()> {
        if self.content_world.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "content_world must not be empty".into(),
            ));
        }
        if !is_identifier_path(&self.receiver_object) {
            return Err(BridgeError::InvalidConfig(format!(
                "receiver_object {:?} is not a JavaScript identifier path",
                self.receiver_object
            )));
        }
        if self.reply_timeout_ms == Some(0) {
            return Err(BridgeError::InvalidConfig(
                "reply_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn is_identifier_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}
