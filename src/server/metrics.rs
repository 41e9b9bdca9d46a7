//! Server metrics.
//!
//! Cheap atomic counters updated on the hot path and reported as a
//! snapshot at shutdown (and to anyone holding the server handle).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters covering both listeners.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Puts accepted by the store
    pub puts_accepted: AtomicU64,
    /// Puts rejected by the backfill policy
    pub puts_rejected: AtomicU64,
    /// Puts that failed with a storage error
    pub puts_failed: AtomicU64,
    /// Query requests served
    pub queries: AtomicU64,
    /// Request lines that failed to decode
    pub parse_errors: AtomicU64,
    /// Connections accepted
    pub connections_opened: AtomicU64,
    /// Connections closed
    pub connections_closed: AtomicU64,
    /// Connections turned away at the limit
    pub connections_rejected: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Puts accepted by the store
    pub puts_accepted: u64,
    /// Puts rejected by the backfill policy
    pub puts_rejected: u64,
    /// Puts that failed with a storage error
    pub puts_failed: u64,
    /// Query requests served
    pub queries: u64,
    /// Request lines that failed to decode
    pub parse_errors: u64,
    /// Connections accepted
    pub connections_opened: u64,
    /// Connections closed
    pub connections_closed: u64,
    /// Connections turned away at the limit
    pub connections_rejected: u64,
}

impl ServerMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_put_accepted(&self) {
        self.puts_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_put_rejected(&self) {
        self.puts_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_put_failed(&self) {
        self.puts_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            puts_accepted: self.puts_accepted.load(Ordering::Relaxed),
            puts_rejected: self.puts_rejected.load(Ordering::Relaxed),
            puts_failed: self.puts_failed.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ServerMetrics::new();
        metrics.record_put_accepted();
        metrics.record_put_accepted();
        metrics.record_put_rejected();
        metrics.record_query();

        let snap = metrics.snapshot();
        assert_eq!(snap.puts_accepted, 2);
        assert_eq!(snap.puts_rejected, 1);
        assert_eq!(snap.queries, 1);
        assert_eq!(snap.parse_errors, 0);
    }
}
