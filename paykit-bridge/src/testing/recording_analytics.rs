//! Analytics sink that records events.

use crate::analytics::{BridgeAnalytics, BridgeErrorEvent, BridgeErrorKind};
use std::sync::Mutex;

/// Keeps every reported event in memory.
#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<BridgeErrorEvent>>,
}

impl RecordingAnalytics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, in order.
    pub fn events(&self) -> Vec<BridgeErrorEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events of `kind`.
    pub fn count(&self, kind: BridgeErrorKind) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.error_kind == kind)
            .count()
    }

    /// Whether an event of `kind` was reported for `channel`.
    pub fn contains(&self, channel: &str, kind: BridgeErrorKind) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.channel == channel && e.error_kind == kind)
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl BridgeAnalytics for RecordingAnalytics {
    fn log_error(&self, event: &BridgeErrorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
