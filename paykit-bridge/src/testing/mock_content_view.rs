//! In-memory content view.

use crate::content_view::{ContentView, ContentWorld};
use crate::host::BridgeSender;
use crate::{BridgeError, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// A script the bridge asked the view to evaluate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluatedScript {
    /// Script source.
    pub script: String,
    /// Content world it was evaluated in.
    pub world: ContentWorld,
}

/// A `postMessage` call recovered from an evaluated script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    /// Channel the message was posted to.
    pub channel: String,
    /// The JSON string the content side receives.
    pub body: String,
}

impl PostedMessage {
    /// Parse a script produced by the bridge's outbound path.
    pub fn parse(script: &str) -> Option<Self> {
        const CHANNELS: &str = ".channels[";
        let rest = &script[script.find(CHANNELS)? + CHANNELS.len()..];
        let (channel, rest) = take_string_literal(rest)?;
        let rest = rest.strip_prefix("].postMessage(")?;
        let (body, rest) = take_string_literal(rest)?;
        (rest == ");").then_some(Self { channel, body })
    }

    /// The body parsed as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

fn take_string_literal(input: &str) -> Option<(String, &str)> {
    let mut stream = serde_json::Deserializer::from_str(input).into_iter::<String>();
    let value = stream.next()?.ok()?;
    let offset = stream.byte_offset();
    Some((value, &input[offset..]))
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<Vec<EvaluatedScript>>,
    handlers: Mutex<BTreeSet<(String, String)>>,
    peer: Mutex<Option<BridgeSender>>,
    fail_evaluation: AtomicBool,
    fail_install: AtomicBool,
    evaluated: Notify,
}

/// Test double for [`ContentView`].
///
/// Clones share state, so a test can keep one clone for assertions while
/// the host owns another.
#[derive(Clone, Default)]
pub struct MockContentView {
    state: Arc<MockState>,
}

impl MockContentView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// This view as the trait object a host takes.
    pub fn as_content_view(&self) -> Arc<dyn ContentView> {
        Arc::new(self.clone())
    }

    /// Deliver every message posted through this view to `peer`, which
    /// plays the content side. Delivery is synchronous.
    pub fn connect(&self, peer: BridgeSender) {
        *self.state.peer.lock().unwrap() = Some(peer);
    }

    /// Stop looping messages back.
    pub fn disconnect(&self) {
        self.state.peer.lock().unwrap().take();
    }

    /// Make `evaluate_script` fail.
    pub fn set_fail_evaluation(&self, fail: bool) {
        self.state.fail_evaluation.store(fail, Ordering::SeqCst);
    }

    /// Make `add_message_handler` fail.
    pub fn set_fail_install(&self, fail: bool) {
        self.state.fail_install.store(fail, Ordering::SeqCst);
    }

    /// Every script evaluated so far.
    pub fn scripts(&self) -> Vec<EvaluatedScript> {
        self.state.scripts.lock().unwrap().clone()
    }

    /// Every message posted so far, in order.
    pub fn posted_messages(&self) -> Vec<PostedMessage> {
        self.scripts()
            .iter()
            .filter_map(|s| PostedMessage::parse(&s.script))
            .collect()
    }

    /// Messages posted to `channel`.
    pub fn posted_to(&self, channel: &str) -> Vec<PostedMessage> {
        self.posted_messages()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    /// Channels with a message handler installed, sorted.
    pub fn installed_handlers(&self) -> Vec<String> {
        self.state
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Whether `channel` has a handler installed in `world`.
    pub fn has_handler(&self, channel: &str, world: &ContentWorld) -> bool {
        self.state
            .handlers
            .lock()
            .unwrap()
            .contains(&(channel.to_string(), world.name().to_string()))
    }

    /// Wait until at least `count` scripts have been evaluated.
    pub async fn wait_for_scripts(&self, count: usize) {
        loop {
            let evaluated = self.state.evaluated.notified();
            if self.state.scripts.lock().unwrap().len() >= count {
                return;
            }
            evaluated.await;
        }
    }

    /// Forget recorded scripts.
    pub fn clear_scripts(&self) {
        self.state.scripts.lock().unwrap().clear();
    }
}

impl ContentView for MockContentView {
    fn evaluate_script(&self, script: &str, world: &ContentWorld) -> Result<()> {
        if self.state.fail_evaluation.load(Ordering::SeqCst) {
            return Err(BridgeError::content_view("script evaluation failed"));
        }

        self.state.scripts.lock().unwrap().push(EvaluatedScript {
            script: script.to_string(),
            world: world.clone(),
        });
        self.state.evaluated.notify_waiters();

        // Delivery may re-enter this view, so no lock is held here.
        let peer = self.state.peer.lock().unwrap().clone();
        if let (Some(peer), Some(message)) = (peer, PostedMessage::parse(script)) {
            peer.receive(&message.channel, Some(&message.body));
        }
        Ok(())
    }

    fn add_message_handler(&self, channel: &str, world: &ContentWorld) -> Result<()> {
        if self.state.fail_install.load(Ordering::SeqCst) {
            return Err(BridgeError::content_view("handler installation failed"));
        }
        self.state
            .handlers
            .lock()
            .unwrap()
            .insert((channel.to_string(), world.name().to_string()));
        Ok(())
    }

    fn remove_message_handler(&self, channel: &str, world: &ContentWorld) {
        self.state
            .handlers
            .lock()
            .unwrap()
            .remove(&(channel.to_string(), world.name().to_string()));
    }
}
