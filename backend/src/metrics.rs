//! Prometheus-style metrics for the oracle node.
//!
//! Counters are atomics; payment totals sit behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use vrf_coordinator::FulfillmentOutcome;

/// Aggregated metrics for the oracle node.
///
/// Thread-safe via atomics; shared via `Arc<Metrics>`.
#[derive(Default)]
pub struct Metrics {
    /// Requests picked up by the listener.
    pub requests_received: AtomicU64,
    /// Requests fulfilled and paid.
    pub requests_fulfilled: AtomicU64,
    /// Fulfillments that failed permanently.
    pub requests_failed: AtomicU64,
    /// Fulfillments whose consumer callback failed.
    pub callback_failures: AtomicU64,
    /// Requests already fulfilled by the time the node got to them.
    pub requests_skipped: AtomicU64,
    /// Sum of fulfillment latencies in milliseconds (for computing average).
    pub fulfillment_latency_sum_ms: AtomicU64,
    // u128 amounts do not fit an atomic.
    payments: Mutex<Payments>,
}

#[derive(Default, Clone, Copy)]
struct Payments {
    link: u128,
    native: u128,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settled fulfillment with its latency.
    pub fn record_fulfillment(&self, outcome: &FulfillmentOutcome, latency_ms: u64) {
        self.requests_fulfilled.fetch_add(1, Ordering::Relaxed);
        self.fulfillment_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        if !outcome.success {
            self.callback_failures.fetch_add(1, Ordering::Relaxed);
        }

        let mut payments = self.payments.lock();
        if outcome.native_payment {
            payments.native = payments.native.saturating_add(outcome.payment);
        } else {
            payments.link = payments.link.saturating_add(outcome.payment);
        }
    }

    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.requests_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Compute average fulfillment latency in milliseconds, or 0 if none.
    pub fn avg_latency_ms(&self) -> u64 {
        let count = self.requests_fulfilled.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.fulfillment_latency_sum_ms.load(Ordering::Relaxed) / count
    }

    /// Serialize metrics as a JSON value. Payments are strings to survive
    /// JSON number precision.
    pub fn to_json(&self) -> serde_json::Value {
        let payments = *self.payments.lock();
        serde_json::json!({
            "requests_received": self.requests_received.load(Ordering::Relaxed),
            "requests_fulfilled": self.requests_fulfilled.load(Ordering::Relaxed),
            "requests_failed": self.requests_failed.load(Ordering::Relaxed),
            "requests_skipped": self.requests_skipped.load(Ordering::Relaxed),
            "callback_failures": self.callback_failures.load(Ordering::Relaxed),
            "avg_fulfillment_latency_ms": self.avg_latency_ms(),
            "total_fulfillment_latency_ms": self.fulfillment_latency_sum_ms.load(Ordering::Relaxed),
            "link_paid": payments.link.to_string(),
            "native_paid": payments.native.to_string(),
        })
    }
}
