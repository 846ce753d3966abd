//! In-process entitlement cache.

use crate::domain::{CacheError, EntitlementRecord};
use crate::ports::EntitlementCache;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CachedEntry {
    record: EntitlementRecord,
    expires_at: Instant,
}

/// TTL map keyed by cache key. Entries vanish lazily on read or on
/// `purge_expired`.
#[derive(Default)]
pub struct MemoryEntitlementCache {
    entries: DashMap<String, CachedEntry>,
}

impl MemoryEntitlementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EntitlementCache for MemoryEntitlementCache {
    async fn get(&self, key: &str) -> Result<Option<EntitlementRecord>, CacheError> {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at > now {
            return Ok(Some(entry.record.clone()));
        }
        drop(entry);
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        record: EntitlementRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Unavailable(format!("ttl {:?} out of range", ttl)))?;
        self.entries
            .insert(key.to_string(), CachedEntry { record, expires_at });
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }
}
