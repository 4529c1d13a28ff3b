//! Reply correlation.
//!
//! Requests and replies are correlated by channel name alone: the reply to a
//! request on `name` arrives on `name_reply`. Because nothing else tells two
//! requests apart, at most one request per name may await its reply at any
//! time. [`PendingReplies`] enforces that and hands each waiter a
//! [`PendingSlot`] that frees itself when dropped.

use crate::analytics::BridgeErrorKind;
use crate::channel::ChannelName;
use crate::codec;
use crate::handler::{HandlerContext, MessageHandler};
use crate::{BridgeError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Produces the reply to a request the content is awaiting.
#[async_trait]
pub trait ReplyResponder<T, R>: Send + Sync {
    /// Answer one request. An error is sent to the content as an error
    /// envelope.
    async fn respond(&self, request: T) -> Result<R>;
}

/// Adapts an async closure to [`ReplyResponder`].
pub struct ResponderFn<F, T, R> {
    f: F,
    _marker: PhantomData<fn(T) -> R>,
}

impl<F, T, R> ResponderFn<F, T, R> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T, R> ReplyResponder<T, R> for ResponderFn<F, T, R>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    async fn respond(&self, request: T) -> Result<R> {
        (self.f)(request).await
    }
}

/// Answers requests the content sends on a channel.
///
/// The request is decoded and handed to the responder on the host's
/// runtime. Whatever happens, exactly one envelope is sent back on the
/// reply channel so the content side never waits forever.
pub struct ReplyHandler<T, R> {
    channel: ChannelName,
    reply_channel: ChannelName,
    responder: Arc<dyn ReplyResponder<T, R>>,
}

impl<T, R> ReplyHandler<T, R>
where
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    /// Create a reply handler for `channel`.
    pub fn new(channel: ChannelName, responder: Arc<dyn ReplyResponder<T, R>>) -> Self {
        Self {
            reply_channel: channel.reply_channel(),
            channel,
            responder,
        }
    }

    fn fail(&self, ctx: &HandlerContext<'_>, err: &BridgeError) {
        tracing::warn!(channel = %self.channel, error = %err, "sending error reply");
        if let Some(kind) = err.analytics_kind() {
            ctx.report(self.channel.as_str(), kind);
        }
        let envelope = codec::error_envelope(&error_message(err));
        if let Err(err) = ctx.sender().send_envelope(&self.reply_channel, &envelope) {
            tracing::debug!(
                channel = %self.reply_channel,
                error = %err,
                "error reply not delivered"
            );
        }
    }
}

impl<T, R> MessageHandler for ReplyHandler<T, R>
where
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn channel(&self) -> &ChannelName {
        &self.channel
    }

    fn handle(&self, ctx: &HandlerContext<'_>, body: Option<&str>) {
        let request = match codec::decode::<T>(self.channel.as_str(), body.unwrap_or("null")) {
            Ok(request) => request,
            Err(err) => {
                self.fail(ctx, &BridgeError::Decoding(err));
                return;
            }
        };

        let Some(runtime) = ctx.runtime().cloned() else {
            self.fail(ctx, &BridgeError::NoRuntime(self.channel.to_string()));
            return;
        };

        let sender = ctx.sender();
        let responder = Arc::clone(&self.responder);
        let channel = self.channel.clone();
        let reply_channel = self.reply_channel.clone();

        let outer = runtime.clone();
        outer.spawn(async move {
            // The responder runs in its own task so a panic still produces
            // an error envelope.
            let outcome = runtime
                .spawn(async move { responder.respond(request).await })
                .await
                .unwrap_or_else(|e| {
                    Err(BridgeError::handler(format!("reply handler panicked: {e}")))
                });
            let envelope = match outcome {
                Ok(result) => codec::reply_envelope(channel.as_str(), &result),
                Err(err) => Err(err),
            };
            let envelope = envelope.unwrap_or_else(|err| {
                tracing::warn!(channel = %channel, error = %err, "reply handler failed");
                sender.report(channel.as_str(), BridgeErrorKind::ReplyHandlerFailed);
                codec::error_envelope(&error_message(&err))
            });
            if let Err(err) = sender.send_envelope(&reply_channel, &envelope) {
                tracing::debug!(channel = %reply_channel, error = %err, "reply not delivered");
            }
        });
    }
}

fn error_message(err: &BridgeError) -> String {
    match err {
        BridgeError::Handler(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Private receiver installed on `name_reply` the first time native code
/// awaits a reply on `name`.
pub(crate) struct ReplyReceiver {
    reply_channel: ChannelName,
    request_channel: ChannelName,
}

impl ReplyReceiver {
    pub(crate) fn new(request_channel: ChannelName) -> Self {
        Self {
            reply_channel: request_channel.reply_channel(),
            request_channel,
        }
    }
}

impl MessageHandler for ReplyReceiver {
    fn channel(&self) -> &ChannelName {
        &self.reply_channel
    }

    fn handle(&self, ctx: &HandlerContext<'_>, body: Option<&str>) {
        let body = body.unwrap_or("null").to_string();
        let replies = &ctx.host().replies;
        if !replies.resolve(self.request_channel.as_str(), body) {
            tracing::debug!(channel = %self.request_channel, "dropping reply with no waiter");
            ctx.report(self.request_channel.as_str(), BridgeErrorKind::UnsolicitedReply);
        }
    }
}

/// Whether a channel has a request awaiting its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyState {
    /// No request outstanding.
    Idle,
    /// One request is awaiting its reply.
    Awaiting,
}

type Waiter = oneshot::Sender<Result<String>>;

struct PendingEntry {
    id: u64,
    waiter: Waiter,
}

type Entries = Arc<Mutex<HashMap<String, PendingEntry>>>;

/// Table of outstanding requests, at most one per channel.
pub(crate) struct PendingReplies {
    entries: Entries,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    next_id: AtomicU64,
}

impl PendingReplies {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            gates: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Claim the slot for `channel`, failing if a request already holds it.
    pub(crate) fn begin(&self, channel: &ChannelName) -> Result<PendingSlot> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(channel.as_str()) {
            return Err(BridgeError::RequestInFlight(channel.to_string()));
        }

        let (waiter, receiver) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entries.insert(channel.to_string(), PendingEntry { id, waiter });

        Ok(PendingSlot {
            entries: Arc::clone(&self.entries),
            channel: channel.to_string(),
            id,
            receiver,
        })
    }

    /// Hand a reply body to the waiter on `channel`. Returns false when
    /// nobody is waiting.
    pub(crate) fn resolve(&self, channel: &str, body: String) -> bool {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(channel)
        };
        match entry {
            Some(entry) => entry.waiter.send(Ok(body)).is_ok(),
            None => false,
        }
    }

    /// Cancel the waiter on `channel`, if any.
    pub(crate) fn cancel(&self, channel: &str) -> bool {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(channel)
        };
        match entry {
            Some(entry) => {
                let _ = entry
                    .waiter
                    .send(Err(BridgeError::Cancelled(channel.to_string())));
                true
            }
            None => false,
        }
    }

    /// Cancel every waiter. Returns the affected channels.
    pub(crate) fn cancel_all(&self) -> Vec<String> {
        let drained: Vec<(String, PendingEntry)> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.drain().collect()
        };
        self.gates.lock().unwrap_or_else(|e| e.into_inner()).clear();

        drained
            .into_iter()
            .map(|(channel, entry)| {
                let _ = entry
                    .waiter
                    .send(Err(BridgeError::Cancelled(channel.clone())));
                channel
            })
            .collect()
    }

    pub(crate) fn state(&self, channel: &str) -> ReplyState {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(channel) {
            ReplyState::Awaiting
        } else {
            ReplyState::Idle
        }
    }

    /// The queue gate serialising requests on `channel`.
    pub(crate) fn gate(&self, channel: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(gates.entry(channel.to_string()).or_default())
    }

    /// Drop the gate for `channel` unless a request still holds or waits
    /// on it; later callers must queue behind the same gate.
    pub(crate) fn forget_gate(&self, channel: &str) {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        if gates
            .get(channel)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(channel);
        }
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new()
    }
}

/// A claimed request slot. Dropping it frees the slot.
pub(crate) struct PendingSlot {
    entries: Entries,
    channel: String,
    id: u64,
    receiver: oneshot::Receiver<Result<String>>,
}

impl PendingSlot {
    /// Wait for the raw reply body.
    pub(crate) async fn wait(&mut self) -> Result<String> {
        match (&mut self.receiver).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BridgeError::Cancelled(self.channel.clone())),
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.get(&self.channel).map(|entry| entry.id) == Some(self.id) {
            entries.remove(&self.channel);
        }
    }
}
