//! Cached entitlement record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one entitlement lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub identity: String,
    pub is_premium: bool,
    pub resolved_at: DateTime<Utc>,
}

impl EntitlementRecord {
    pub fn new(identity: impl Into<String>, is_premium: bool) -> Self {
        Self {
            identity: identity.into(),
            is_premium,
            resolved_at: Utc::now(),
        }
    }

    /// A record older than `ttl` must be re-resolved.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.resolved_at) >= ttl,
            // TTL beyond chrono's range never expires
            Err(_) => false,
        }
    }
}
