//! # Admission Gate
//!
//! Runs one linear pipeline per request and produces exactly one
//! [`AdmissionDecision`]:
//!
//! ```text
//! credential ─► body ─► content filter ─► entitlement ─► tier ─► bucket
//!    401         400          400              400        (free)   429
//! ```
//!
//! No step is retried. Optional dependencies degrade inside their own
//! components (moderation fails open, entitlement fails closed).

use crate::domain::config::TiersConfig;
use crate::domain::{bearer_identity, AdmissionDecision, ChatRequest, Tier, TierConfig};
use crate::limiter::{Acquire, VisitorKey, VisitorRegistry};
use crate::policy::{ContentFilter, ContentVerdict, EntitlementResolver};
use crate::ports::Clock;
use std::sync::Arc;
use tracing::{debug, info};

/// Orchestrates content, entitlement and rate checks
pub struct AdmissionGate {
    filter: ContentFilter,
    resolver: EntitlementResolver,
    registry: Arc<VisitorRegistry>,
    tiers: TiersConfig,
    clock: Arc<dyn Clock>,
}

impl AdmissionGate {
    pub fn new(
        filter: ContentFilter,
        resolver: EntitlementResolver,
        registry: Arc<VisitorRegistry>,
        tiers: TiersConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            filter,
            resolver,
            registry,
            tiers,
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<VisitorRegistry> {
        &self.registry
    }

    /// Decide one request from its `Authorization` header and raw body.
    pub async fn admit(&self, authorization: Option<&str>, body: &[u8]) -> AdmissionDecision {
        let Some(identity) = bearer_identity(authorization) else {
            return AdmissionDecision::Unauthorized;
        };

        let request = match ChatRequest::parse(body) {
            Ok(request) => request,
            Err(e) => return AdmissionDecision::BadRequest(e.to_string()),
        };
        debug!(action = %request.action, model = %request.model, "Admission check");

        if let ContentVerdict::Blocked(reason) = self.filter.check(&request.prompt).await {
            info!(reason = %reason, "Request rejected by content filter");
            return AdmissionDecision::RejectContent(reason);
        }

        // The free model is open to everyone, so only other models need the lookup
        if request.model != self.tiers.free_model && !self.resolver.is_premium(identity).await {
            info!(model = %request.model, "Non-premium caller requested premium model");
            return AdmissionDecision::RejectEntitlement {
                model: request.model,
                free_model: self.tiers.free_model.clone(),
            };
        }

        match self.select_tier(&request.model) {
            Some((tier, config)) => self.consume(identity, tier, config),
            None => AdmissionDecision::Admit,
        }
    }

    /// Heavy models take precedence over the standard list.
    fn select_tier(&self, model: &str) -> Option<(Tier, &TierConfig)> {
        if self.tiers.heavy.contains(model) {
            Some((Tier::Heavy, &self.tiers.heavy))
        } else if self.tiers.standard.contains(model) {
            Some((Tier::Standard, &self.tiers.standard))
        } else {
            None
        }
    }

    fn consume(&self, identity: &str, tier: Tier, config: &TierConfig) -> AdmissionDecision {
        let key = VisitorKey::for_tier(identity, tier, &self.tiers.heavy_key_suffix);
        let now = self.clock.now();
        let bucket = self
            .registry
            .get_or_create(&key, config.limit, config.period, now);

        // Refill, check and consume happen under one lock at one instant, so
        // the reported wait matches the reading that caused the denial.
        match bucket.try_acquire(now) {
            Acquire::Granted { remaining } => {
                debug!(tier = %tier, remaining, "Token consumed");
                AdmissionDecision::Admit
            }
            Acquire::Denied {
                available,
                retry_after,
            } => {
                info!(tier = %tier, available, retry_after_ms = retry_after.as_millis() as u64, "Caller throttled");
                AdmissionDecision::Throttled {
                    tier,
                    limit: bucket.capacity(),
                    period: bucket.refill_period(),
                    retry_after,
                }
            }
        }
    }
}
