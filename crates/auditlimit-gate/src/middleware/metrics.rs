//! Admission metrics.
//!
//! Plain atomic counters, exported as JSON on `/metrics`.

use crate::domain::AdmissionDecision;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Gate metrics
#[derive(Debug, Default)]
pub struct GateMetrics {
    // Decision counters
    pub requests_total: AtomicU64,
    pub admitted: AtomicU64,
    pub unauthorized: AtomicU64,
    pub bad_requests: AtomicU64,
    pub content_rejected: AtomicU64,
    pub entitlement_rejected: AtomicU64,
    pub throttled: AtomicU64,

    // Dependency health
    pub moderation_degraded: AtomicU64,
    pub entitlement_degraded: AtomicU64,
    pub entitlement_cache_hits: AtomicU64,
    pub entitlement_cache_misses: AtomicU64,

    // Latency tracking
    pub total_latency_ms: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished admission check
    pub fn record_decision(&self, decision: &AdmissionDecision, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let counter = match decision {
            AdmissionDecision::Admit => &self.admitted,
            AdmissionDecision::Unauthorized => &self.unauthorized,
            AdmissionDecision::BadRequest(_) => &self.bad_requests,
            AdmissionDecision::RejectContent(_) => &self.content_rejected,
            AdmissionDecision::RejectEntitlement { .. } => &self.entitlement_rejected,
            AdmissionDecision::Throttled { .. } => &self.throttled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_moderation_degraded(&self) {
        self.moderation_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entitlement_degraded(&self) {
        self.entitlement_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.entitlement_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.entitlement_cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.requests_total.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self, tracked_visitors: usize) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "admitted": self.admitted.load(Ordering::Relaxed),
                "unauthorized": self.unauthorized.load(Ordering::Relaxed),
                "bad_request": self.bad_requests.load(Ordering::Relaxed),
                "content_rejected": self.content_rejected.load(Ordering::Relaxed),
                "entitlement_rejected": self.entitlement_rejected.load(Ordering::Relaxed),
                "throttled": self.throttled.load(Ordering::Relaxed),
            },
            "dependencies": {
                "moderation_degraded": self.moderation_degraded.load(Ordering::Relaxed),
                "entitlement_degraded": self.entitlement_degraded.load(Ordering::Relaxed),
                "entitlement_cache_hits": self.entitlement_cache_hits.load(Ordering::Relaxed),
                "entitlement_cache_misses": self.entitlement_cache_misses.load(Ordering::Relaxed),
            },
            "rate_limiting": {
                "tracked_visitors": tracked_visitors,
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<GateMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<GateMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, decision: &AdmissionDecision) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_decision(decision, latency_ms);
    }
}
