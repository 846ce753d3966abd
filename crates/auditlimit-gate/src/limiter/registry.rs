//! Visitor registry: one token bucket per visitor key.
//!
//! Buckets are created lazily on first reference with an atomic
//! insert-if-absent, so concurrent first requests from an unseen caller
//! share one bucket. Each bucket carries its own lock; the map only guards
//! membership.

use super::bucket::TokenBucket;
use crate::domain::Tier;
use crate::ports::Clock;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key of a rate-limit bucket: the identity, plus a tier suffix for tiers
/// that keep a separate budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorKey(String);

impl VisitorKey {
    /// Build the key for `identity` on `tier`.
    pub fn for_tier(identity: &str, tier: Tier, heavy_suffix: &str) -> Self {
        match tier {
            Tier::Standard => Self(identity.to_string()),
            Tier::Heavy => Self(format!("{}|{}", identity, heavy_suffix)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide bucket map. Created once at startup and shared via `Arc`.
#[derive(Debug, Default)]
pub struct VisitorRegistry {
    buckets: DashMap<VisitorKey, Arc<TokenBucket>>,
}

impl VisitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bucket for `key`, creating a full one if absent.
    ///
    /// `capacity` and `refill_period` only apply when the bucket is created.
    pub fn get_or_create(
        &self,
        key: &VisitorKey,
        capacity: u32,
        refill_period: Duration,
        now: Instant,
    ) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let bucket = self.buckets.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, capacity, period_secs = refill_period.as_secs(), "Creating new rate limit bucket");
            Arc::new(TokenBucket::new(capacity, refill_period, now))
        });
        Arc::clone(bucket.value())
    }

    /// Remove buckets that are full at `now` and not held by an in-flight
    /// request. Such a bucket is identical to the one that would be recreated,
    /// so eviction never changes a decision. Returns the number removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.buckets.retain(|key, bucket| {
            // The shard is write-locked here, so nobody can clone the Arc
            // concurrently; a count above one means a request holds it.
            if Arc::strong_count(bucket) > 1 || !bucket.is_full_at(now) {
                return true;
            }
            debug!(key = %key, "Removing idle rate limit bucket");
            evicted += 1;
            false
        });
        evicted
    }

    /// Get number of tracked visitor keys
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Background task evicting idle buckets every `interval`.
pub async fn cleanup_task(registry: Arc<VisitorRegistry>, clock: Arc<dyn Clock>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let evicted = registry.evict_idle(clock.now());
        if evicted > 0 {
            debug!(evicted, remaining = registry.len(), "Visitor registry cleanup");
        }
    }
}
