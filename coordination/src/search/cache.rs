//! Time-bounded memo of lookup results.
//!
//! Keys are `blake3("{hat}:{normalized query}")` where normalization is
//! trim + lowercase. Expiry is lazy: an entry older than the TTL is treated
//! as absent on read and removed at that point. `purge_expired` sweeps the
//! rest.
//!
//! The clock is `tokio::time::Instant`, so a paused test runtime can move
//! time forward with `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::hats::Hat;
use crate::search::types::LookupResult;

type CacheKey = [u8; 32];

#[derive(Debug, Clone)]
struct CacheEntry {
    results: Vec<LookupResult>,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

impl CacheStats {
    /// Share of stored entries that could still serve a hit.
    pub fn hit_potential(&self) -> f64 {
        self.valid as f64 / self.total.max(1) as f64
    }
}

pub struct SearchCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(hat: Hat, query: &str) -> CacheKey {
        let normalized = query.trim().to_lowercase();
        *blake3::hash(format!("{hat}:{normalized}").as_bytes()).as_bytes()
    }

    /// Stored results for `(hat, query)` if present and not expired.
    pub fn get(&self, hat: Hat, query: &str) -> Option<Vec<LookupResult>> {
        let key = Self::key(hat, query);
        let now = Instant::now();

        {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match entries.get(&key) {
                None => return None,
                Some(entry) if !entry.is_expired(now, self.ttl) => {
                    return Some(entry.results.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: drop it. Re-check under the write lock since a concurrent
        // `set` may have refreshed the entry in between.
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries
            .get(&key)
            .is_some_and(|e| e.is_expired(now, self.ttl))
        {
            entries.remove(&key);
            debug!(hat = %hat, query, "cache entry expired");
        }
        None
    }

    /// Store `results` for `(hat, query)`. Last write wins.
    pub fn set(&self, hat: Hat, query: &str, results: Vec<LookupResult>) {
        let key = Self::key(hat, query);
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key,
            CacheEntry {
                results,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now, self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let expired = entries
            .values()
            .filter(|e| e.is_expired(now, self.ttl))
            .count();
        CacheStats {
            total: entries.len(),
            valid: entries.len() - expired,
            expired,
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.entries.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}
