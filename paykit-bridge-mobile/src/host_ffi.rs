//! Bridge Host FFI
//!
//! One [`BridgeHostFFI`] per screen. Typical flow (Swift):
//!
//! ```swift
//! let bridge = try BridgeHostFFI(view: ConnectWebView(webView), config: defaultBridgeConfig())
//! try bridge.installChannel(channel: "pageDidLoad", callback: PageDidLoadHandler())
//! try bridge.installReplyChannel(channel: "fetchClientSecret", callback: ClientSecretProvider())
//!
//! // From WKScriptMessageHandler, on the main thread:
//! bridge.receive(channel: message.name, body: message.body as? String)
//!
//! // Off the main thread:
//! let props = try bridge.sendAndAwaitReplyJson(channel: "logout", requestJson: "{}")
//! ```

use crate::async_bridge::AsyncRuntime;
use crate::content_view_ffi::{CallbackContentView, ContentViewCallback};
use crate::handlers_ffi::{
    JsonMessageCallback, JsonMessageHandler, JsonReplyCallback, JsonResponder, SetterCallback,
};
use crate::{BridgeConfigFFI, BridgeMetricsFFI, BridgeMobileError, ReplyStateFFI, Result};
use paykit_bridge::{BridgeConfig, BridgeErrorCode, BridgeHost, ChannelName, SetterChannel};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Completion callback for [`BridgeHostFFI::send_and_await_reply_async`].
#[uniffi::export(callback_interface)]
pub trait ReplyResultCallback: Send + Sync {
    fn on_success(&self, result_json: String);
    fn on_error(&self, code: i32, message: String);
}

/// The bridge for one screen.
#[derive(uniffi::Object)]
pub struct BridgeHostFFI {
    host: BridgeHost,
    runtime: AsyncRuntime,
}

fn parse_json(json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(|e| BridgeMobileError::Validation {
        msg: format!("Invalid JSON: {}", e),
    })
}

fn channel_name(channel: String) -> Result<ChannelName> {
    Ok(ChannelName::new(channel)?)
}

#[uniffi::export]
impl BridgeHostFFI {
    /// Create a bridge on top of a platform web view.
    #[uniffi::constructor]
    pub fn new(view: Box<dyn ContentViewCallback>, config: BridgeConfigFFI) -> Result<Arc<Self>> {
        let runtime = AsyncRuntime::with_threads(2)?;
        let host = BridgeHost::builder(Arc::new(CallbackContentView::new(view)))
            .config(BridgeConfig::from(config))
            .runtime(runtime.handle())
            .build()?;
        tracing::debug!(world = %host.content_world(), "created bridge host for platform view");
        Ok(Arc::new(Self { host, runtime }))
    }

    /// Install a one-way channel.
    pub fn install_channel(
        &self,
        channel: String,
        callback: Box<dyn JsonMessageCallback>,
    ) -> Result<()> {
        let channel = channel_name(channel)?;
        self.host
            .install(Arc::new(JsonMessageHandler::new(channel, callback)))?;
        Ok(())
    }

    /// Install a channel whose requests the content awaits.
    pub fn install_reply_channel(
        &self,
        channel: String,
        callback: Box<dyn JsonReplyCallback>,
    ) -> Result<()> {
        let channel = channel_name(channel)?;
        let responder = Arc::new(JsonResponder::new(channel.clone(), callback));
        self.host.install_responder(channel, responder)?;
        Ok(())
    }

    /// Install a setter channel dispatching the listed setters. Events for
    /// other setters are ignored.
    pub fn install_setter_channel(
        &self,
        channel: String,
        setters: Vec<String>,
        callback: Box<dyn SetterCallback>,
    ) -> Result<()> {
        let unique: HashSet<&String> = setters.iter().collect();
        if unique.len() != setters.len() {
            return Err(BridgeMobileError::Validation {
                msg: "Setter names must be unique".to_string(),
            });
        }

        let callback: Arc<dyn SetterCallback> = Arc::from(callback);
        let mut setter_channel = SetterChannel::new(channel)?;
        for setter in setters {
            let callback = Arc::clone(&callback);
            let name = setter.clone();
            setter_channel = setter_channel.on(setter, move |values: Option<Value>| {
                callback.on_setter(name.clone(), values.map(|v| v.to_string()))
            });
        }
        self.host.install_setter_channel(setter_channel)?;
        Ok(())
    }

    /// Deliver a message the content posted. Call on the main thread.
    ///
    /// Returns false if no handler is installed for `channel`.
    pub fn receive(&self, channel: String, body: Option<String>) -> bool {
        self.host.receive(&channel, body.as_deref())
    }

    /// Post JSON to the content.
    pub fn send_json(&self, channel: String, payload_json: String) -> Result<()> {
        let payload = parse_json(&payload_json)?;
        self.host.send(channel, &payload)?;
        Ok(())
    }

    /// Post a request and block until the content replies.
    ///
    /// Must not be called on the main thread.
    pub fn send_and_await_reply_json(
        &self,
        channel: String,
        request_json: String,
    ) -> Result<String> {
        let request = parse_json(&request_json)?;
        let reply: Value = self
            .runtime
            .block_on(self.host.send_and_await_reply(channel, &request))?;
        Ok(reply.to_string())
    }

    /// Post a request and report the reply through `callback`.
    pub fn send_and_await_reply_async(
        &self,
        channel: String,
        request_json: String,
        callback: Box<dyn ReplyResultCallback>,
    ) {
        let request = match parse_json(&request_json) {
            Ok(request) => request,
            Err(e) => {
                callback.on_error(BridgeErrorCode::Encoding as i32, e.to_string());
                return;
            }
        };

        let sender = self.host.sender();
        self.runtime.spawn(async move {
            let reply: paykit_bridge::Result<Value> =
                sender.send_and_await_reply(channel, &request).await;
            match reply {
                Ok(reply) => callback.on_success(reply.to_string()),
                Err(e) => {
                    tracing::debug!(error = %e, "awaited reply failed");
                    callback.on_error(e.code() as i32, e.to_string())
                }
            }
        });
    }

    /// Remove a channel and cancel its pending reply, if any.
    pub fn unregister(&self, channel: String) -> Result<bool> {
        Ok(self.host.unregister(channel)?)
    }

    /// Remove every channel and cancel every pending reply.
    pub fn teardown(&self) {
        self.host.teardown();
    }

    pub fn is_open(&self) -> bool {
        self.host.is_open()
    }

    pub fn is_installed(&self, channel: String) -> bool {
        self.host.is_installed(&channel)
    }

    pub fn installed_channels(&self) -> Vec<String> {
        self.host.installed_channels()
    }

    pub fn reply_state(&self, channel: String) -> ReplyStateFFI {
        self.host.reply_state(&channel).into()
    }

    pub fn metrics(&self) -> BridgeMetricsFFI {
        self.host.metrics().into()
    }
}
