//! Entitlement resolution with a short-lived cache.
//!
//! `is_premium` never fails: any cache or service error resolves the caller
//! as non-premium. Failed lookups are not cached, so an outage is retried on
//! the next request.

use crate::domain::EntitlementRecord;
use crate::middleware::GateMetrics;
use crate::ports::{EntitlementCache, EntitlementClient};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CACHE_KEY_PREFIX: &str = "entitlement:";

/// Decides whether a caller holds premium entitlement
pub struct EntitlementResolver {
    client: Option<Arc<dyn EntitlementClient>>,
    cache: Arc<dyn EntitlementCache>,
    ttl: Duration,
    metrics: Arc<GateMetrics>,
}

impl EntitlementResolver {
    /// `client = None` resolves every caller as non-premium.
    pub fn new(
        client: Option<Arc<dyn EntitlementClient>>,
        cache: Arc<dyn EntitlementCache>,
        ttl: Duration,
        metrics: Arc<GateMetrics>,
    ) -> Self {
        Self {
            client,
            cache,
            ttl,
            metrics,
        }
    }

    pub async fn is_premium(&self, identity: &str) -> bool {
        let key = format!("{}{}", CACHE_KEY_PREFIX, identity);

        match self.cache.get(&key).await {
            Ok(Some(record)) if !record.is_expired(self.ttl, Utc::now()) => {
                self.metrics.record_cache_lookup(true);
                return record.is_premium;
            }
            Ok(_) => self.metrics.record_cache_lookup(false),
            Err(e) => {
                self.metrics.record_cache_lookup(false);
                warn!(error = %e, "Failed to read entitlement cache");
            }
        }

        let Some(client) = &self.client else {
            return false;
        };

        let is_premium = match client.is_premium(identity).await {
            Ok(is_premium) => is_premium,
            Err(e) => {
                self.metrics.record_entitlement_degraded();
                warn!(error = %e, "Entitlement check failed, treating caller as non-premium");
                return false;
            }
        };

        debug!(is_premium, "Entitlement resolved");
        let record = EntitlementRecord::new(identity, is_premium);
        if let Err(e) = self.cache.set(&key, record, self.ttl).await {
            warn!(error = %e, "Failed to store entitlement in cache");
        }

        is_premium
    }
}
