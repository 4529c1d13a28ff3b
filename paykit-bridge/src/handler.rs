//! Channel handlers.
//!
//! A [`MessageHandler`] receives every message the content posts on its
//! channel. The bridge ships one-way handlers (this module), reply handlers
//! ([`crate::reply`]) and the setter multiplexer ([`crate::setter`]);
//! features with unusual needs can implement the trait directly.

use crate::analytics::BridgeErrorKind;
use crate::channel::ChannelName;
use crate::codec;
use crate::host::{BridgeSender, HostInner};
use crate::metrics::BridgeMetrics;
use crate::DecodingError;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Receives the messages posted on one channel.
///
/// `handle` runs synchronously on the thread that delivered the message,
/// once per message, in delivery order. It must not block; asynchronous
/// work goes through [`HandlerContext::runtime`] and sends its result back
/// with a [`BridgeSender`].
pub trait MessageHandler: Send + Sync {
    /// The channel this handler is installed on.
    fn channel(&self) -> &ChannelName;

    /// Handle one message. `body` is `None` for payload-less posts.
    fn handle(&self, ctx: &HandlerContext<'_>, body: Option<&str>);
}

/// What a handler can reach while handling a message.
pub struct HandlerContext<'a> {
    pub(crate) host: &'a Arc<HostInner>,
}

impl HandlerContext<'_> {
    /// A handle for sending messages back to the content.
    pub fn sender(&self) -> BridgeSender {
        BridgeSender::new(Arc::downgrade(self.host))
    }

    /// Report a failure to the analytics sink.
    pub fn report(&self, channel: &str, kind: BridgeErrorKind) {
        self.host.report(channel, kind);
    }

    /// Report a payload that failed to decode. The handler stays installed.
    pub fn report_decode_error(&self, err: &DecodingError) {
        tracing::debug!(
            channel = %err.channel,
            reason = %err.reason,
            raw = %err.raw,
            "dropping undecodable bridge message"
        );
        self.host
            .report(&err.channel, BridgeErrorKind::DecodeFailed);
    }

    /// The host's metrics.
    pub fn metrics(&self) -> &BridgeMetrics {
        &self.host.metrics
    }

    /// Runtime for asynchronous work, if the host has one.
    pub fn runtime(&self) -> Option<&tokio::runtime::Handle> {
        self.host.runtime.as_ref()
    }

    pub(crate) fn host(&self) -> &Arc<HostInner> {
        self.host
    }
}

/// Invokes a callback with each decoded payload.
pub struct OneWayHandler<T> {
    channel: ChannelName,
    callback: Box<dyn Fn(T) + Send + Sync>,
}

impl<T: DeserializeOwned + 'static> OneWayHandler<T> {
    /// Create a handler for `channel`.
    pub fn new<F>(channel: ChannelName, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            channel,
            callback: Box::new(callback),
        }
    }
}

impl<T: DeserializeOwned + 'static> MessageHandler for OneWayHandler<T> {
    fn channel(&self) -> &ChannelName {
        &self.channel
    }

    fn handle(&self, ctx: &HandlerContext<'_>, body: Option<&str>) {
        // An absent body decodes as `null`, which only `Option<T>` accepts.
        match codec::decode::<T>(self.channel.as_str(), body.unwrap_or("null")) {
            Ok(payload) => (self.callback)(payload),
            Err(err) => ctx.report_decode_error(&err),
        }
    }
}

/// Invokes a callback for every message, ignoring any body.
pub struct EmptyHandler {
    channel: ChannelName,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl EmptyHandler {
    /// Create a handler for `channel`.
    pub fn new<F>(channel: ChannelName, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            channel,
            callback: Box::new(callback),
        }
    }
}

impl MessageHandler for EmptyHandler {
    fn channel(&self) -> &ChannelName {
        &self.channel
    }

    fn handle(&self, _ctx: &HandlerContext<'_>, _body: Option<&str>) {
        (self.callback)()
    }
}
