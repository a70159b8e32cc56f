/// Hub and per-connection delivery counters
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// CONNECTION METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    messages_received: AtomicU64,
}

impl ConnectionMetrics {
    pub fn inc_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionMetricsSnapshot {
        ConnectionMetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionMetricsSnapshot {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub messages_received: u64,
}

// ============================================================================
// HUB METRICS
// ============================================================================

/// Lifetime totals across all connections
#[derive(Debug, Default)]
pub struct HubMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    /// Inbound frames dropped as malformed
    messages_rejected: AtomicU64,
}

impl HubMetrics {
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_failed(&self) {
        self.messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub messages_rejected: u64,
}
