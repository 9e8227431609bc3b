use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// In-memory counter. Monotonically increasing.
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Aggregate counters for the distribution pipeline, surfaced on the stats
/// endpoint. Intended for monitoring, not for alerting on individual
/// message loss.
pub struct ServiceMetrics {
    events_dispatched: Counter,
    deliveries: Counter,
    delivery_failures: Counter,
    connections_opened: Counter,
    connections_evicted: Counter,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            events_dispatched: Counter::new(),
            deliveries: Counter::new(),
            delivery_failures: Counter::new(),
            connections_opened: Counter::new(),
            connections_evicted: Counter::new(),
        }
    }

    /// Record one dispatch call and its per-target outcome counts.
    pub fn record_dispatch(&self, sent: u64, failed: u64) {
        self.events_dispatched.increment(1);
        self.deliveries.increment(sent);
        self.delivery_failures.increment(failed);
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.increment(1);
    }

    pub fn record_connections_evicted(&self, n: u64) {
        self.connections_evicted.increment(n);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_dispatched: self.events_dispatched.get(),
            deliveries: self.deliveries.get(),
            delivery_failures: self.delivery_failures.get(),
            connections_opened: self.connections_opened.get(),
            connections_evicted: self.connections_evicted.get(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the service counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_dispatched: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub connections_opened: u64,
    pub connections_evicted: u64,
}
