//! Key-value store backend abstraction.
//!
//! Cache entries, spend counters, and alert markers all live in one shared
//! external store so multi-process deployments stay correct. The in-memory
//! implementation here serves single-process deployments and tests; a
//! Redis-like backend implements the same trait in production.

use async_trait::async_trait;
use pipeline_core::PipelineResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key-value backend with TTL support.
///
/// TTL semantics: a `Some(ttl)` on `write` sets the expiry; `None`
/// preserves an existing key's expiry (or leaves a new key without one).
/// `increment` applies its TTL only when the key is first created, so
/// repeated increments never extend a counter's life past its period
/// boundary.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn read(&self, key: &str) -> PipelineResult<Option<Vec<u8>>>;

    /// Write a value.
    async fn write(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> PipelineResult<()>;

    /// Write a value only if the key does not exist. Returns true when the
    /// write happened.
    async fn write_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> PipelineResult<bool>;

    /// Whether a key exists (and has not expired).
    async fn exists(&self, key: &str) -> PipelineResult<bool>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> PipelineResult<()>;

    /// Atomically add `amount` to the numeric counter at `key`, returning
    /// the new value. Missing keys start at zero. The TTL is applied only
    /// on first creation.
    ///
    /// Backends that cannot increment atomically should return their best
    /// effort and report `false` from `supports_atomic_increment`, so the
    /// caller can select the read-modify-write counter path explicitly.
    async fn increment(
        &self,
        key: &str,
        amount: f64,
        ttl: Option<Duration>,
    ) -> PipelineResult<f64>;

    /// Whether `increment` is atomic on this backend.
    fn supports_atomic_increment(&self) -> bool;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
struct StoredEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// In-memory store for single-process deployments and tests.
///
/// All mutation happens under one write lock, so `increment` is atomic
/// within the process.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries.
    pub async fn prune_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_counter(data: &[u8]) -> f64 {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> PipelineResult<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        let expired = entries.get(key).is_some_and(StoredEntry::is_expired);
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.data.clone()))
    }

    async fn write(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> PipelineResult<()> {
        let mut entries = self.entries.write().await;
        let live = entries.get(key).is_some_and(|entry| !entry.is_expired());
        if live {
            if let Some(entry) = entries.get_mut(key) {
                entry.data = value;
                if let Some(ttl) = ttl {
                    entry.expires_at = Some(Instant::now() + ttl);
                }
            }
        } else {
            entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        }
        Ok(())
    }

    async fn write_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> PipelineResult<bool> {
        let mut entries = self.entries.write().await;
        let live = entries.get(key).is_some_and(|entry| !entry.is_expired());
        if live {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    async fn exists(&self, key: &str) -> PipelineResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|e| !e.is_expired()))
    }

    async fn delete(&self, key: &str) -> PipelineResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        amount: f64,
        ttl: Option<Duration>,
    ) -> PipelineResult<f64> {
        let mut entries = self.entries.write().await;
        let current = entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| parse_counter(&entry.data));
        let new_value = match current {
            Some(current) => {
                let next = current + amount;
                if let Some(entry) = entries.get_mut(key) {
                    entry.data = next.to_string().into_bytes();
                }
                next
            }
            None => {
                entries.insert(
                    key.to_string(),
                    StoredEntry::new(amount.to_string().into_bytes(), ttl),
                );
                amount
            }
        };
        Ok(new_value)
    }

    fn supports_atomic_increment(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
