//! The bridge host.
//!
//! A [`BridgeHost`] is owned by one screen. It installs channel handlers on
//! the screen's [`ContentView`], dispatches inbound messages to them, sends
//! outbound messages as evaluated script, and correlates replies. Dropping
//! the host tears everything down: handlers are removed from the view and
//! every pending reply wait fails with `Cancelled`.

use crate::analytics::{BridgeAnalytics, BridgeErrorEvent, BridgeErrorKind, TracingAnalytics};
use crate::channel::{ChannelId, ChannelName, IntoChannelName};
use crate::codec;
use crate::config::{BridgeConfig, ConcurrentRequestPolicy};
use crate::content_view::{ContentView, ContentWorld};
use crate::handler::{EmptyHandler, HandlerContext, MessageHandler, OneWayHandler};
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::registry::ChannelRegistry;
use crate::reply::{
    PendingReplies, ReplyHandler, ReplyReceiver, ReplyResponder, ReplyState, ResponderFn,
};
use crate::setter::SetterChannel;
use crate::{BridgeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

pub(crate) struct HostInner {
    view: Arc<dyn ContentView>,
    world: ContentWorld,
    config: BridgeConfig,
    registry: ChannelRegistry,
    pub(crate) replies: PendingReplies,
    analytics: Arc<dyn BridgeAnalytics>,
    pub(crate) metrics: Arc<BridgeMetrics>,
    pub(crate) runtime: Option<Handle>,
    closed: AtomicBool,
}

impl HostInner {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BridgeError::HostClosed)
        }
    }

    pub(crate) fn report(&self, channel: &str, kind: BridgeErrorKind) {
        match kind {
            BridgeErrorKind::DecodeFailed | BridgeErrorKind::ReplyDecodeFailed => {
                self.metrics.record_decode_error()
            }
            BridgeErrorKind::ReplyTimeout => self.metrics.record_reply_timeout(),
            BridgeErrorKind::ReplyCancelled => self.metrics.record_reply_cancelled(),
            BridgeErrorKind::UnsolicitedReply => self.metrics.record_unsolicited_reply(),
            BridgeErrorKind::UnknownChannel => self.metrics.record_unknown_channel(),
            BridgeErrorKind::ReplyHandlerFailed | BridgeErrorKind::ContentViewFailed => {}
        }
        self.analytics
            .log_error(&BridgeErrorEvent::new(channel, kind));
    }

    fn install(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        self.ensure_open()?;
        let channel = handler.channel().clone();
        self.registry
            .install(handler, self.config.strict_registration)?;

        if let Err(err) = self.view.add_message_handler(channel.as_str(), &self.world) {
            self.registry.remove(channel.as_str());
            return Err(err);
        }
        tracing::debug!(channel = %channel, world = %self.world, "installed bridge channel");
        Ok(())
    }

    fn ensure_reply_receiver(&self, channel: &ChannelName) -> Result<()> {
        let reply_channel = channel.reply_channel();
        if self.registry.contains(reply_channel.as_str()) {
            return Ok(());
        }

        match self
            .registry
            .install_reserved(Arc::new(ReplyReceiver::new(channel.clone())))
        {
            Ok(()) => {}
            Err(BridgeError::DuplicateChannel(_)) => return Ok(()),
            Err(err) => return Err(err),
        }

        if let Err(err) = self
            .view
            .add_message_handler(reply_channel.as_str(), &self.world)
        {
            self.registry.remove(reply_channel.as_str());
            return Err(err);
        }
        tracing::debug!(channel = %reply_channel, "installed reply receiver");
        Ok(())
    }

    fn receive(self: &Arc<Self>, channel: &str, body: Option<&str>) -> bool {
        if !self.is_open() {
            tracing::debug!(channel, "dropping message after teardown");
            return false;
        }
        self.metrics
            .record_message_received(body.map_or(0, |b| b.len() as u64));

        let Some(handler) = self.registry.get(channel) else {
            tracing::debug!(channel = %ChannelId::from(channel), "no handler for bridge channel");
            self.report(channel, BridgeErrorKind::UnknownChannel);
            return false;
        };

        handler.handle(&HandlerContext { host: self }, body);
        true
    }

    fn send<T: Serialize + ?Sized>(&self, channel: &ChannelName, payload: &T) -> Result<()> {
        self.ensure_open()?;
        let literal = codec::encode(channel.as_str(), payload)?;
        self.post(channel.as_str(), &literal)
    }

    fn send_envelope(&self, reply_channel: &ChannelName, envelope: &str) -> Result<()> {
        self.ensure_open()?;
        self.post(reply_channel.as_str(), &codec::encode_js_literal(envelope))
    }

    fn post(&self, channel: &str, literal: &str) -> Result<()> {
        let script = codec::post_message_script(&self.config.receiver_object, channel, literal);
        match self.view.evaluate_script(&script, &self.world) {
            Ok(()) => {
                self.metrics.record_message_sent(literal.len() as u64);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(channel, error = %err, "content view rejected script");
                self.report(channel, BridgeErrorKind::ContentViewFailed);
                Err(err)
            }
        }
    }

    async fn send_and_await_reply<T, R>(
        self: &Arc<Self>,
        channel: ChannelName,
        request: &T,
    ) -> Result<R>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.ensure_open()?;

        let _queued = match self.config.concurrent_requests {
            ConcurrentRequestPolicy::Reject => None,
            ConcurrentRequestPolicy::Queue => {
                Some(self.replies.gate(channel.as_str()).lock_owned().await)
            }
        };
        // Teardown or unregister may have happened while queued.
        self.ensure_open()?;
        self.ensure_reply_receiver(&channel)?;

        let mut slot = self.replies.begin(&channel)?;
        self.metrics.record_reply_awaited();
        self.send(&channel, request)?;
        let mut abandoned = AbandonedWait {
            host: self,
            channel: channel.as_str(),
            armed: true,
        };

        let outcome = match self.config.reply_timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, slot.wait()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BridgeError::ReplyTimeout {
                    channel: channel.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
            None => slot.wait().await,
        };
        abandoned.armed = false;
        drop(slot);

        let result = outcome.and_then(|body| {
            self.metrics.record_reply_resolved();
            codec::decode_reply::<R>(channel.as_str(), &body)
        });
        if let Err(err) = &result {
            tracing::debug!(channel = %channel, error = %err, "reply wait failed");
            if let Some(kind) = err.analytics_kind() {
                self.report(channel.as_str(), kind);
            }
        }
        result
    }

    fn unregister(&self, channel: &ChannelName) -> bool {
        let removed = self.registry.remove(channel.as_str()).is_some();
        if removed {
            self.view
                .remove_message_handler(channel.as_str(), &self.world);
        }

        let reply_channel = channel.reply_channel();
        if self.registry.remove(reply_channel.as_str()).is_some() {
            self.view
                .remove_message_handler(reply_channel.as_str(), &self.world);
        }

        self.replies.cancel(channel.as_str());
        self.replies.forget_gate(channel.as_str());
        removed
    }

    fn teardown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let channels = self.registry.clear();
        for channel in &channels {
            self.view.remove_message_handler(channel, &self.world);
        }
        let cancelled = self.replies.cancel_all();
        tracing::debug!(
            channels = channels.len(),
            cancelled = cancelled.len(),
            "bridge host torn down"
        );
    }
}

/// Reports a reply wait whose future was dropped before it finished.
struct AbandonedWait<'a> {
    host: &'a HostInner,
    channel: &'a str,
    armed: bool,
}

impl Drop for AbandonedWait<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(channel = self.channel, "reply wait abandoned");
            self.host
                .report(self.channel, BridgeErrorKind::ReplyCancelled);
        }
    }
}

/// Owns the bridge for one screen.
///
/// # Example
///
/// ```rust,no_run
/// use paykit_bridge::{BridgeConfig, BridgeHost, ContentView, KnownChannel};
/// use std::sync::Arc;
///
/// # async fn run(view: Arc<dyn ContentView>) -> paykit_bridge::Result<()> {
/// let host = BridgeHost::new(view, BridgeConfig::default())?;
/// host.install_one_way_empty(KnownChannel::PageDidLoad, || println!("loaded"))?;
///
/// let secret: String = host
///     .send_and_await_reply(KnownChannel::FetchClientSecret, &serde_json::json!({}))
///     .await?;
/// # let _ = secret;
/// # Ok(())
/// # }
/// ```
pub struct BridgeHost {
    inner: Arc<HostInner>,
}

impl BridgeHost {
    /// Create a host with the default analytics sink and the ambient Tokio
    /// runtime, if any.
    pub fn new(view: Arc<dyn ContentView>, config: BridgeConfig) -> Result<Self> {
        Self::builder(view).config(config).build()
    }

    /// Start building a host around `view`.
    pub fn builder(view: Arc<dyn ContentView>) -> BridgeHostBuilder {
        BridgeHostBuilder {
            view,
            config: BridgeConfig::default(),
            analytics: None,
            metrics: None,
            runtime: None,
        }
    }

    /// Install a handler.
    ///
    /// Fails with `DuplicateChannel` (or panics, under strict registration)
    /// if the channel already has one.
    pub fn install(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        self.inner.install(handler)
    }

    /// Install a handler that decodes each message into `T`.
    pub fn install_one_way<T, F>(&self, channel: impl IntoChannelName, callback: F) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let channel = channel.into_channel_name()?;
        self.install(Arc::new(OneWayHandler::new(channel, callback)))
    }

    /// Install a handler for a channel that carries no payload.
    pub fn install_one_way_empty<F>(&self, channel: impl IntoChannelName, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let channel = channel.into_channel_name()?;
        self.install(Arc::new(EmptyHandler::new(channel, callback)))
    }

    /// Install an async handler whose result is sent back as the reply.
    pub fn install_with_reply<T, R, F, Fut>(
        &self,
        channel: impl IntoChannelName,
        handler: F,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.install_responder(channel, Arc::new(ResponderFn::<F, T, R>::new(handler)))
    }

    /// Install a [`ReplyResponder`] whose result is sent back as the reply.
    pub fn install_responder<T, R>(
        &self,
        channel: impl IntoChannelName,
        responder: Arc<dyn ReplyResponder<T, R>>,
    ) -> Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let channel = channel.into_channel_name()?;
        self.install(Arc::new(ReplyHandler::new(channel, responder)))
    }

    /// Install a setter multiplexer.
    pub fn install_setter_channel(&self, channel: SetterChannel) -> Result<()> {
        self.install(Arc::new(channel))
    }

    /// Post `payload` to the content on `channel`.
    pub fn send<T: Serialize + ?Sized>(
        &self,
        channel: impl IntoChannelName,
        payload: &T,
    ) -> Result<()> {
        let channel = channel.into_channel_name()?;
        self.inner.send(&channel, payload)
    }

    /// Post `request` on `channel` and wait for the content's reply on the
    /// paired reply channel.
    ///
    /// Fails with `RequestInFlight` if another request on the channel is
    /// still waiting (under the default policy), `ReplyTimeout` if the
    /// content does not answer in time, `RemoteError` if it answers with an
    /// error envelope, `ReplyDecode` if the answer does not decode, and
    /// `Cancelled` if the host is torn down first. Dropping the returned
    /// future frees the channel for the next request and reports
    /// `reply_cancelled`.
    pub async fn send_and_await_reply<T, R>(
        &self,
        channel: impl IntoChannelName,
        request: &T,
    ) -> Result<R>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let channel = channel.into_channel_name()?;
        self.inner.send_and_await_reply(channel, request).await
    }

    /// Deliver a message the content posted. Called by the platform layer
    /// on the main thread.
    ///
    /// Returns false if no handler is installed for `channel`.
    pub fn receive(&self, channel: &str, body: Option<&str>) -> bool {
        self.inner.receive(channel, body)
    }

    /// Remove the handler for `channel` and its reply channel, cancelling
    /// any pending reply wait. Returns whether a handler was installed.
    pub fn unregister(&self, channel: impl IntoChannelName) -> Result<bool> {
        let channel = channel.into_channel_name()?;
        Ok(self.inner.unregister(&channel))
    }

    /// Remove every handler and cancel every pending reply wait.
    ///
    /// Idempotent; also runs on drop.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    /// Whether the host is still accepting traffic.
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Whether a handler is installed for `channel`.
    pub fn is_installed(&self, channel: &str) -> bool {
        self.inner.registry.contains(channel)
    }

    /// Installed channel names, including reply receivers, sorted.
    pub fn installed_channels(&self) -> Vec<String> {
        self.inner.registry.channels()
    }

    /// Whether a request on `channel` is awaiting its reply.
    pub fn reply_state(&self, channel: &str) -> ReplyState {
        self.inner.replies.state(channel)
    }

    /// A weak sender for use from async tasks and callbacks.
    pub fn sender(&self) -> BridgeSender {
        BridgeSender::new(Arc::downgrade(&self.inner))
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// The configuration the host was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The content world all traffic runs in.
    pub fn content_world(&self) -> &ContentWorld {
        &self.inner.world
    }
}

impl Drop for BridgeHost {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

/// Builder for [`BridgeHost`].
pub struct BridgeHostBuilder {
    view: Arc<dyn ContentView>,
    config: BridgeConfig,
    analytics: Option<Arc<dyn BridgeAnalytics>>,
    metrics: Option<Arc<BridgeMetrics>>,
    runtime: Option<Handle>,
}

impl BridgeHostBuilder {
    /// Use `config`.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Report failures to `analytics` instead of `tracing`.
    pub fn analytics(mut self, analytics: Arc<dyn BridgeAnalytics>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Share a metrics collector.
    pub fn metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run reply handlers on `runtime`. Defaults to the runtime the host is
    /// built on, if any.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate the configuration and build the host.
    pub fn build(self) -> Result<BridgeHost> {
        self.config.validate()?;
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());
        if runtime.is_none() {
            tracing::debug!("no tokio runtime; reply handlers will answer with an error");
        }

        Ok(BridgeHost {
            inner: Arc::new(HostInner {
                world: ContentWorld::new(self.config.content_world.clone()),
                view: self.view,
                config: self.config,
                registry: ChannelRegistry::new(),
                replies: PendingReplies::new(),
                analytics: self.analytics.unwrap_or_else(|| Arc::new(TracingAnalytics)),
                metrics: self.metrics.unwrap_or_default(),
                runtime,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

/// Weak handle to a [`BridgeHost`].
///
/// Cheap to clone and safe to move into async tasks. Every operation fails
/// with `HostClosed` once the host is torn down or dropped.
#[derive(Clone)]
pub struct BridgeSender {
    inner: Weak<HostInner>,
}

impl BridgeSender {
    pub(crate) fn new(inner: Weak<HostInner>) -> Self {
        Self { inner }
    }

    fn upgrade(&self) -> Result<Arc<HostInner>> {
        self.inner
            .upgrade()
            .filter(|inner| inner.is_open())
            .ok_or(BridgeError::HostClosed)
    }

    /// Whether the host is still open.
    pub fn is_open(&self) -> bool {
        self.upgrade().is_ok()
    }

    /// Post `payload` to the content on `channel`.
    pub fn send<T: Serialize + ?Sized>(
        &self,
        channel: impl IntoChannelName,
        payload: &T,
    ) -> Result<()> {
        let channel = channel.into_channel_name()?;
        self.upgrade()?.send(&channel, payload)
    }

    /// See [`BridgeHost::send_and_await_reply`].
    pub async fn send_and_await_reply<T, R>(
        &self,
        channel: impl IntoChannelName,
        request: &T,
    ) -> Result<R>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let channel = channel.into_channel_name()?;
        let inner = self.upgrade()?;
        inner.send_and_await_reply(channel, request).await
    }

    /// Deliver an inbound message, as [`BridgeHost::receive`] does.
    pub fn receive(&self, channel: &str, body: Option<&str>) -> bool {
        match self.upgrade() {
            Ok(inner) => inner.receive(channel, body),
            Err(_) => false,
        }
    }

    pub(crate) fn send_envelope(&self, reply_channel: &ChannelName, envelope: &str) -> Result<()> {
        self.upgrade()?.send_envelope(reply_channel, envelope)
    }

    pub(crate) fn report(&self, channel: &str, kind: BridgeErrorKind) {
        if let Some(inner) = self.inner.upgrade() {
            inner.report(channel, kind);
        }
    }
}

impl std::fmt::Debug for BridgeSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSender")
            .field("open", &self.is_open())
            .finish()
    }
}
