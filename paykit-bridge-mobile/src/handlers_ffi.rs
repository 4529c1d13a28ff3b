//! Channel handler callbacks.
//!
//! Platform code receives messages as raw JSON and decodes them itself, so
//! the handlers here pass bodies through untouched.

use async_trait::async_trait;
use paykit_bridge::{BridgeError, ChannelName, HandlerContext, MessageHandler, ReplyResponder};
use serde_json::Value;
use std::sync::Arc;

/// Receives one-way messages on a channel.
#[uniffi::export(callback_interface)]
pub trait JsonMessageCallback: Send + Sync {
    /// `body` is the JSON the content posted, `None` if it posted nothing.
    fn on_message(&self, channel: String, body: Option<String>);
}

/// Answer produced by a [`JsonReplyCallback`].
#[derive(Clone, Debug, uniffi::Record)]
pub struct JsonReplyResult {
    /// Result as JSON. Ignored when `error` is set.
    pub result_json: Option<String>,
    /// Error message sent to the content instead of a result.
    pub error: Option<String>,
}

impl JsonReplyResult {
    pub fn ok(result_json: String) -> Self {
        Self {
            result_json: Some(result_json),
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            result_json: None,
            error: Some(message),
        }
    }
}

/// Answers requests the content awaits.
///
/// Called on a runtime thread; blocking is allowed.
#[uniffi::export(callback_interface)]
pub trait JsonReplyCallback: Send + Sync {
    fn on_request(&self, channel: String, request_json: String) -> JsonReplyResult;
}

/// Receives setter events on a setter channel.
#[uniffi::export(callback_interface)]
pub trait SetterCallback: Send + Sync {
    /// `values_json` is `None` when the event carried no values.
    fn on_setter(&self, setter: String, values_json: Option<String>);
}

/// Forwards raw bodies to a [`JsonMessageCallback`].
pub(crate) struct JsonMessageHandler {
    channel: ChannelName,
    callback: Box<dyn JsonMessageCallback>,
}

impl JsonMessageHandler {
    pub(crate) fn new(channel: ChannelName, callback: Box<dyn JsonMessageCallback>) -> Self {
        Self { channel, callback }
    }
}

impl MessageHandler for JsonMessageHandler {
    fn channel(&self) -> &ChannelName {
        &self.channel
    }

    fn handle(&self, _ctx: &HandlerContext<'_>, body: Option<&str>) {
        self.callback
            .on_message(self.channel.to_string(), body.map(str::to_owned));
    }
}

/// Runs a [`JsonReplyCallback`] off the runtime's async workers.
pub(crate) struct JsonResponder {
    channel: ChannelName,
    callback: Arc<dyn JsonReplyCallback>,
}

impl JsonResponder {
    pub(crate) fn new(channel: ChannelName, callback: Box<dyn JsonReplyCallback>) -> Self {
        Self {
            channel,
            callback: Arc::from(callback),
        }
    }
}

#[async_trait]
impl ReplyResponder<Value, Value> for JsonResponder {
    async fn respond(&self, request: Value) -> paykit_bridge::Result<Value> {
        let callback = Arc::clone(&self.callback);
        let channel = self.channel.to_string();
        let reply = tokio::task::spawn_blocking(move || {
            callback.on_request(channel, request.to_string())
        })
        .await
        .map_err(|e| BridgeError::handler(format!("reply callback panicked: {e}")))?;

        if let Some(message) = reply.error {
            return Err(BridgeError::Handler(message));
        }
        match reply.result_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| BridgeError::handler(format!("reply is not valid JSON: {e}"))),
            None => Ok(Value::Null),
        }
    }
}
