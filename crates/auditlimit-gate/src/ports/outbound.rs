//! Outbound ports for the admission gate.
//!
//! Every external collaborator sits behind one of these traits so the gate
//! can be exercised with in-process doubles.

use crate::domain::{CacheError, DependencyError, EntitlementRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source for token buckets
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// System clock implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// External content moderation
#[async_trait]
pub trait ModerationClient: Send + Sync {
    /// Returns `true` when the service flags `text`
    async fn is_flagged(&self, text: &str) -> Result<bool, DependencyError>;
}

/// External entitlement ("is this caller premium") service
#[async_trait]
pub trait EntitlementClient: Send + Sync {
    async fn is_premium(&self, identity: &str) -> Result<bool, DependencyError>;
}

/// Short-lived store for resolved entitlements
#[async_trait]
pub trait EntitlementCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<EntitlementRecord>, CacheError>;

    async fn set(
        &self,
        key: &str,
        record: EntitlementRecord,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop expired entries. Stores with native expiry keep the default.
    fn purge_expired(&self) -> usize {
        0
    }
}
