//! Metrics hooks for listener operations
//!
//! Every swallowed per-connection error ends up here as a counter, next to
//! the log line it produced.
//!
//! ## Usage
//!
//! ```ignore
//! use sc_transfer_listener::metrics::ListenerMetrics;
//!
//! let metrics = Arc::new(ListenerMetrics::new());
//! let server = TransferServer::new(config, sink).with_metrics(metrics.clone());
//!
//! // later
//! let snapshot = metrics.snapshot();
//! println!("acknowledged: {}", snapshot.transfers_acknowledged);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::FailureKind;

/// Metrics collector for listener operations
///
/// Thread-safe counters, shared by the accept loop and every worker.
#[derive(Default)]
pub struct ListenerMetrics {
    /// Connections returned by `accept()`
    pub connections_accepted: AtomicU64,
    /// Connections closed by the admission policy
    pub connections_rejected: AtomicU64,
    /// Connections whose handler finished
    pub connections_closed: AtomicU64,
    /// Frames read and decoded
    pub transfers_received: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Transfers delivered and confirmed with `OK`
    pub transfers_acknowledged: AtomicU64,
    pub accept_failures: AtomicU64,
    pub deserialization_failures: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub reply_failures: AtomicU64,
    pub close_failures: AtomicU64,
    pub timeouts: AtomicU64,
    /// Cumulative handling time of acknowledged transfers in nanoseconds
    pub handle_time_ns: AtomicU64,
}

impl ListenerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded frame of `bytes` payload bytes
    pub fn record_transfer_received(&self, bytes: usize) {
        self.transfers_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a confirmed transfer
    ///
    /// # Arguments
    /// * `duration` - Time from accept to confirmation sent
    pub fn record_transfer_acknowledged(&self, duration: Duration) {
        self.transfers_acknowledged.fetch_add(1, Ordering::Relaxed);
        self.handle_time_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Accept => &self.accept_failures,
            FailureKind::Deserialization => &self.deserialization_failures,
            FailureKind::Delivery => &self.delivery_failures,
            FailureKind::Reply => &self.reply_failures,
            FailureKind::Close => &self.close_failures,
            FailureKind::Timeout => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let accepted = self.connections_accepted.load(Ordering::Relaxed);
        let rejected = self.connections_rejected.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);

        MetricsSnapshot {
            connections_accepted: accepted,
            connections_rejected: rejected,
            connections_closed: closed,
            open_connections: accepted.saturating_sub(rejected).saturating_sub(closed),
            transfers_received: self.transfers_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            transfers_acknowledged: self.transfers_acknowledged.load(Ordering::Relaxed),
            accept_failures: self.accept_failures.load(Ordering::Relaxed),
            deserialization_failures: self.deserialization_failures.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            reply_failures: self.reply_failures.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            avg_handle_ns: self.avg_handle_time_ns(),
        }
    }

    /// Average handling time of acknowledged transfers in nanoseconds
    pub fn avg_handle_time_ns(&self) -> u64 {
        let total = self.handle_time_ns.load(Ordering::Relaxed);
        let count = self.transfers_acknowledged.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.connections_accepted,
            &self.connections_rejected,
            &self.connections_closed,
            &self.transfers_received,
            &self.bytes_received,
            &self.transfers_acknowledged,
            &self.accept_failures,
            &self.deserialization_failures,
            &self.delivery_failures,
            &self.reply_failures,
            &self.close_failures,
            &self.timeouts,
            &self.handle_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub connections_closed: u64,
    pub open_connections: u64,
    pub transfers_received: u64,
    pub bytes_received: u64,
    pub transfers_acknowledged: u64,
    pub accept_failures: u64,
    pub deserialization_failures: u64,
    pub delivery_failures: u64,
    pub reply_failures: u64,
    pub close_failures: u64,
    pub timeouts: u64,
    pub avg_handle_ns: u64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to forward listener events to an external metrics
/// system.
pub trait MetricsRecorder: Send + Sync {
    fn record_connection_accepted(&self);

    fn record_connection_rejected(&self);

    fn record_connection_closed(&self);

    fn record_transfer_received(&self, bytes: usize);

    fn record_transfer_acknowledged(&self, duration: Duration);

    fn record_failure(&self, kind: FailureKind);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_connection_accepted(&self) {}
    fn record_connection_rejected(&self) {}
    fn record_connection_closed(&self) {}
    fn record_transfer_received(&self, _: usize) {}
    fn record_transfer_acknowledged(&self, _: Duration) {}
    fn record_failure(&self, _: FailureKind) {}
}

impl MetricsRecorder for ListenerMetrics {
    fn record_connection_accepted(&self) {
        ListenerMetrics::record_connection_accepted(self);
    }

    fn record_connection_rejected(&self) {
        ListenerMetrics::record_connection_rejected(self);
    }

    fn record_connection_closed(&self) {
        ListenerMetrics::record_connection_closed(self);
    }

    fn record_transfer_received(&self, bytes: usize) {
        ListenerMetrics::record_transfer_received(self, bytes);
    }

    fn record_transfer_acknowledged(&self, duration: Duration) {
        ListenerMetrics::record_transfer_acknowledged(self, duration);
    }

    fn record_failure(&self, kind: FailureKind) {
        ListenerMetrics::record_failure(self, kind);
    }
}
