//! The response cache layer.
//!
//! At most one cached value exists per fingerprint. Only successful results
//! are ever stored; failed results are never cached. Lookups and stores are
//! best-effort: store failures degrade to cache misses, never to call
//! failures.

use crate::fingerprint::Fingerprint;
use pipeline_core::AgentOutput;
use pipeline_store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// A serialized result snapshot with its expiry metadata.
///
/// The store's TTL already bounds the entry's life; `cached_at`/`ttl_secs`
/// guard against backends with coarse or absent expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    /// The cached output.
    pub output: AgentOutput,
    /// Unix timestamp of the store.
    pub cached_at: u64,
    /// TTL in seconds at store time.
    pub ttl_secs: u64,
}

impl CachedResult {
    /// Wrap an output for storage.
    #[must_use]
    pub fn new(output: AgentOutput, ttl: Duration) -> Self {
        let cached_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            output,
            cached_at,
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Whether the entry has outlived its TTL.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now > self.cached_at + self.ttl_secs
    }
}

/// Hit/miss/store counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Successful stores.
    pub stores: u64,
}

impl CacheStatsSnapshot {
    /// Hit rate as a percentage of lookups.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Content-addressed response cache over the shared key-value store.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl ResponseCache {
    /// Create a cache over the shared store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// Look up a cached result.
    ///
    /// Returns `None` on miss, expiry, or any store/deserialization
    /// problem.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<AgentOutput> {
        let data = match self.store.read(fingerprint.as_str()).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(error) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(fingerprint = %fingerprint, %error, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<CachedResult>(&data) {
            Ok(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, "cache hit");
                Some(entry.output.into_cached())
            }
            Ok(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let _ = self.store.delete(fingerprint.as_str()).await;
                None
            }
            Err(error) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!(fingerprint = %fingerprint, %error, "cache entry corrupt, discarding");
                let _ = self.store.delete(fingerprint.as_str()).await;
                None
            }
        }
    }

    /// Store a successful result under its fingerprint.
    pub async fn store(&self, fingerprint: &Fingerprint, output: &AgentOutput, ttl: Duration) {
        let entry = CachedResult::new(output.clone(), ttl);
        let data = match serde_json::to_vec(&entry) {
            Ok(data) => data,
            Err(error) => {
                warn!(fingerprint = %fingerprint, %error, "cache entry serialization failed");
                return;
            }
        };

        match self
            .store
            .write(fingerprint.as_str(), data, Some(ttl))
            .await
        {
            Ok(()) => {
                self.stores.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, ttl_secs = ttl.as_secs(), "response cached");
            }
            Err(error) => {
                warn!(fingerprint = %fingerprint, %error, "cache write failed");
            }
        }
    }

    /// Remove a cached result.
    pub async fn invalidate(&self, fingerprint: &Fingerprint) {
        if let Err(error) = self.store.delete(fingerprint.as_str()).await {
            warn!(fingerprint = %fingerprint, %error, "cache invalidation failed");
        }
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }
}
