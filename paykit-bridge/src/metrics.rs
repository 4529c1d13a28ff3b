//! Metrics collection for monitoring bridge traffic.
//!
//! # Example
//!
//! ```rust
//! use paykit_bridge::metrics::BridgeMetrics;
//!
//! let metrics = BridgeMetrics::new();
//! metrics.record_message_received(64);
//! metrics.record_decode_error();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.messages_received, 1);
//! assert_eq!(snapshot.decode_errors, 1);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one bridge host.
///
/// Thread-safe via atomic operations.
#[derive(Debug)]
pub struct BridgeMetrics {
    // Traffic
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,

    // Reply correlation
    replies_awaited: AtomicU64,
    replies_resolved: AtomicU64,
    reply_timeouts: AtomicU64,
    reply_cancellations: AtomicU64,
    unsolicited_replies: AtomicU64,

    // Failures and ignored input
    decode_errors: AtomicU64,
    unknown_channels: AtomicU64,
    unknown_setters: AtomicU64,

    start_time: Instant,
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            replies_awaited: AtomicU64::new(0),
            replies_resolved: AtomicU64::new(0),
            reply_timeouts: AtomicU64::new(0),
            reply_cancellations: AtomicU64::new(0),
            unsolicited_replies: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            unknown_channels: AtomicU64::new(0),
            unknown_setters: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an inbound message.
    pub fn record_message_received(&self, bytes: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an outbound script evaluation.
    pub fn record_message_sent(&self, bytes: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a request that now awaits its reply.
    pub fn record_reply_awaited(&self) {
        self.replies_awaited.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply delivered to its waiter.
    pub fn record_reply_resolved(&self) {
        self.replies_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply wait that timed out.
    pub fn record_reply_timeout(&self) {
        self.reply_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply wait cancelled by teardown.
    pub fn record_reply_cancelled(&self) {
        self.reply_cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply nobody was waiting for.
    pub fn record_unsolicited_reply(&self) {
        self.unsolicited_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload that failed to decode.
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message on a channel with no handler.
    pub fn record_unknown_channel(&self) {
        self.unknown_channels.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a setter event with no registered sub-handler.
    pub fn record_unknown_setter(&self) {
        self.unknown_setters.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            replies_awaited: self.replies_awaited.load(Ordering::Relaxed),
            replies_resolved: self.replies_resolved.load(Ordering::Relaxed),
            reply_timeouts: self.reply_timeouts.load(Ordering::Relaxed),
            reply_cancellations: self.reply_cancellations.load(Ordering::Relaxed),
            unsolicited_replies: self.unsolicited_replies.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_channels: self.unknown_channels.load(Ordering::Relaxed),
            unknown_setters: self.unknown_setters.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.messages_received.store(0, Ordering::Relaxed);
        self.messages_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.replies_awaited.store(0, Ordering::Relaxed);
        self.replies_resolved.store(0, Ordering::Relaxed);
        self.reply_timeouts.store(0, Ordering::Relaxed);
        self.reply_cancellations.store(0, Ordering::Relaxed);
        self.unsolicited_replies.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.unknown_channels.store(0, Ordering::Relaxed);
        self.unknown_setters.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of all metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the collector was created.
    pub uptime_secs: u64,

    pub messages_received: u64,
    pub messages_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,

    pub replies_awaited: u64,
    pub replies_resolved: u64,
    pub reply_timeouts: u64,
    pub reply_cancellations: u64,
    pub unsolicited_replies: u64,

    pub decode_errors: u64,
    pub unknown_channels: u64,
    pub unknown_setters: u64,
}

impl MetricsSnapshot {
    /// Replies that were awaited but never resolved.
    pub fn unresolved_replies(&self) -> u64 {
        self.replies_awaited.saturating_sub(self.replies_resolved)
    }

    /// Format as JSON for logging/monitoring.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
