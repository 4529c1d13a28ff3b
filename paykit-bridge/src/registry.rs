//! Channel registry.
//!
//! Maps a channel name to exactly one [`MessageHandler`]. The registry is
//! owned by a single bridge host; the lock only guards against misuse from
//! off-main threads and is never held while a handler runs.

use crate::channel::ChannelName;
use crate::handler::MessageHandler;
use crate::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of installed channel handlers.
pub struct ChannelRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl ChannelRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a feature handler.
    ///
    /// Reply channels are refused. A second handler for the same name is a
    /// programming error: with `strict` set this panics, otherwise it
    /// returns [`BridgeError::DuplicateChannel`]. The existing handler is
    /// never replaced.
    pub fn install(&self, handler: Arc<dyn MessageHandler>, strict: bool) -> Result<()> {
        let channel = handler.channel().clone();
        if channel.is_reply_channel() {
            return Err(BridgeError::ReservedChannelName(channel.to_string()));
        }
        self.insert(channel, handler, strict)
    }

    /// Installs the private receiver for a reply channel.
    pub(crate) fn install_reserved(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let channel = handler.channel().clone();
        debug_assert!(channel.is_reply_channel());
        self.insert(channel, handler, false)
    }

    fn insert(
        &self,
        channel: ChannelName,
        handler: Arc<dyn MessageHandler>,
        strict: bool,
    ) -> Result<()> {
        let inserted = {
            let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
            if handlers.contains_key(channel.as_str()) {
                false
            } else {
                handlers.insert(channel.as_str().to_string(), handler);
                true
            }
        };

        if inserted {
            return Ok(());
        }
        if strict {
            panic!("duplicate handler registered for bridge channel `{channel}`");
        }
        Err(BridgeError::DuplicateChannel(channel.to_string()))
    }

    /// Removes a handler, returning it if it existed.
    pub fn remove(&self, channel: &str) -> Option<Arc<dyn MessageHandler>> {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.remove(channel)
    }

    /// Gets the handler for a channel.
    pub fn get(&self, channel: &str) -> Option<Arc<dyn MessageHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(channel).cloned()
    }

    /// Checks if a channel has a handler.
    pub fn contains(&self, channel: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(channel)
    }

    /// Returns all installed channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut channels: Vec<String> = handlers.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Returns the number of installed handlers.
    pub fn len(&self) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.len()
    }

    /// Returns true if no handlers are installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every handler and returns the names that were installed.
    pub fn clear(&self) -> Vec<String> {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let mut channels: Vec<String> = handlers.drain().map(|(name, _)| name).collect();
        channels.sort();
        channels
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
