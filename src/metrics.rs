//! Metrics for a mock endpoint.
//!
//! Lightweight counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-engine counters
#[derive(Debug)]
pub struct Metrics {
    pub steps_declared: AtomicU64,
    pub steps_evaluated: AtomicU64,
    pub steps_skipped: AtomicU64,
    pub actions_executed: AtomicU64,
    pub actions_dropped: AtomicU64,
    pub events_published: AtomicU64,
    pub connections_accepted: AtomicU64,
    pub duplicate_connections: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_read: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            steps_declared: AtomicU64::new(0),
            steps_evaluated: AtomicU64::new(0),
            steps_skipped: AtomicU64::new(0),
            actions_executed: AtomicU64::new(0),
            actions_dropped: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            connections_accepted: AtomicU64::new(0),
            duplicate_connections: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_declared(&self, steps: u64) {
        self.steps_declared.fetch_add(steps, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evaluated(&self) {
        self.steps_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.steps_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.actions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connection(&self, duplicate: bool) {
        if duplicate {
            self.duplicate_connections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_send(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_receive(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps_declared: self.steps_declared.load(Ordering::Relaxed),
            steps_evaluated: self.steps_evaluated.load(Ordering::Relaxed),
            steps_skipped: self.steps_skipped.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            duplicate_connections: self.duplicate_connections.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub steps_declared: u64,
    pub steps_evaluated: u64,
    pub steps_skipped: u64,
    pub actions_executed: u64,
    pub actions_dropped: u64,
    pub events_published: u64,
    pub connections_accepted: u64,
    pub duplicate_connections: u64,
    pub bytes_sent: u64,
    pub bytes_read: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "steps={} evaluated={} skipped={} actions={} dropped={} events={} conns={} dup={} bytes_tx={} bytes_rx={}",
            self.steps_declared,
            self.steps_evaluated,
            self.steps_skipped,
            self.actions_executed,
            self.actions_dropped,
            self.events_published,
            self.connections_accepted,
            self.duplicate_connections,
            self.bytes_sent,
            self.bytes_read
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let m = Metrics::new();
        m.record_declared(3);
        m.record_evaluated();
        m.record_skipped();
        m.record_executed();
        m.record_connection(false);
        m.record_connection(true);
        m.record_send(5);

        let s = m.snapshot();
        assert_eq!(s.steps_declared, 3);
        assert_eq!(s.steps_evaluated, 1);
        assert_eq!(s.steps_skipped, 1);
        assert_eq!(s.actions_executed, 1);
        assert_eq!(s.connections_accepted, 1);
        assert_eq!(s.duplicate_connections, 1);
        assert_eq!(s.bytes_sent, 5);
    }

    #[test]
    fn test_snapshot_display() {
        let m = Metrics::new();
        m.record_receive(7);
        let text = m.snapshot().to_string();
        assert!(text.starts_with("steps=0"));
        assert!(text.ends_with("bytes_rx=7"));
    }
}
