//! Counter increment strategies.
//!
//! Spend counters require increment-and-read semantics. Backends with a
//! native atomic increment get the `AtomicCounter` path; everything else
//! falls back to `ReadModifyWriteCounter`, which is subject to lost updates
//! under concurrent writers. The selection happens once at configuration
//! time via `counter_for`, never silently at call time.

use crate::kv::KeyValueStore;
use async_trait::async_trait;
use pipeline_core::PipelineResult;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Increment-and-read over a counter key.
#[async_trait]
pub trait Counter: Send + Sync {
    /// Add `amount` to the counter at `key`, returning the new total. The
    /// TTL applies only when the key is first created.
    async fn increment(&self, key: &str, amount: f64, ttl: Duration) -> PipelineResult<f64>;

    /// Strategy name for logs.
    fn strategy(&self) -> &'static str;
}

/// Counter backed by the store's native atomic increment.
pub struct AtomicCounter {
    store: Arc<dyn KeyValueStore>,
}

impl AtomicCounter {
    /// Create a counter over a backend with atomic increment support.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Counter for AtomicCounter {
    async fn increment(&self, key: &str, amount: f64, ttl: Duration) -> PipelineResult<f64> {
        self.store.increment(key, amount, Some(ttl)).await
    }

    fn strategy(&self) -> &'static str {
        "atomic"
    }
}

/// Counter emulated with read-modify-write.
///
/// Concurrent increments to the same key can lose updates: two writers can
/// read the same current value and both write `current + amount`. This is
/// an accepted weakness of backends without native increment, not a hidden
/// one; spend totals remain approximately correct and monotonic within a
/// period.
pub struct ReadModifyWriteCounter {
    store: Arc<dyn KeyValueStore>,
}

impl ReadModifyWriteCounter {
    /// Create a counter over a backend without atomic increment support.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Counter for ReadModifyWriteCounter {
    async fn increment(&self, key: &str, amount: f64, ttl: Duration) -> PipelineResult<f64> {
        let current = self.store.read(key).await?;
        match current {
            Some(data) => {
                let current = std::str::from_utf8(&data)
                    .ok()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .unwrap_or(0.0);
                let next = current + amount;
                // Preserve the existing expiry: the period boundary was set
                // when the key was created.
                self.store
                    .write(key, next.to_string().into_bytes(), None)
                    .await?;
                Ok(next)
            }
            None => {
                self.store
                    .write(key, amount.to_string().into_bytes(), Some(ttl))
                    .await?;
                Ok(amount)
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "read-modify-write"
    }
}

/// Select the counter strategy for a backend.
#[must_use]
pub fn counter_for(store: Arc<dyn KeyValueStore>) -> Arc<dyn Counter> {
    if store.supports_atomic_increment() {
        Arc::new(AtomicCounter::new(store))
    } else {
        debug!(
            backend = store.name(),
            "store lacks atomic increment, using read-modify-write counters"
        );
        Arc::new(ReadModifyWriteCounter::new(store))
    }
}
