//! In-process TTL store: the default backend, and the one a single-instance
//! deployment or the test suite reaches for. Grounded on the JWKS cache
//! idiom used elsewhere in the workspace (`RwLock<HashMap<...>>` guarding an
//! `(value, expiry)` pair, refreshed/evicted lazily and by a background
//! sweep) generalised from a single cached value to a keyed map.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::interval;

use crate::{LeaseStore, Store, StoreError};

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// In-memory store backing the flow store / authorization-code store for a
/// single-process deployment. A background task sweeps expired entries on
/// `eviction_interval`; `get`/`take` also check expiry lazily so a reader
/// never observes a stale entry between sweeps.
pub struct InMemoryStore<V> {
    entries: Arc<RwLock<HashMap<String, Entry<V>>>>,
    leases: Arc<RwLock<HashSet<String>>>,
}

impl<V> Clone for InMemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            leases: self.leases.clone(),
        }
    }
}

impl<V> InMemoryStore<V>
where
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            leases: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Spawn the background eviction sweep. Returns the task handle so the
    /// caller can abort it on shutdown; dropping the handle does not stop
    /// the task.
    pub fn spawn_eviction(&self, sweep_interval: Duration) -> tokio::task::JoinHandle<()> {
        let entries = self.entries.clone();
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                let mut guard = entries.write().await;
                let before = guard.len();
                guard.retain(|_, entry| entry.expires_at > now);
                let evicted = before - guard.len();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = guard.len(), "swept expired store entries");
                }
            }
        })
    }
}

impl<V> Default for InMemoryStore<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Store<V> for InMemoryStore<V>
where
    V: Send + Sync + Clone + 'static,
{
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).and_then(|entry| {
            if entry.expires_at > Utc::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        }))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl<V> LeaseStore for InMemoryStore<V>
where
    V: Send + Sync + 'static,
{
    async fn acquire(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.leases.write().await;
        if guard.contains(key) {
            return Err(StoreError::LeaseHeld(key.to_string()));
        }
        guard.insert(key.to_string());
        Ok(())
    }

    async fn release(&self, key: &str) {
        self.leases.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        store
            .put("flow-1", "hello".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("flow-1").await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        store
            .put("flow-1", "hello".to_string(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("flow-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn take_removes_after_reading_once() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        store
            .put("code-1", "auth-code".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.take("code-1").await.unwrap(),
            Some("auth-code".to_string())
        );
        assert_eq!(store.take("code-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_lease_acquisition_is_rejected_until_released() {
        let store: InMemoryStore<()> = InMemoryStore::new();
        store.acquire("flow-1").await.unwrap();
        assert!(matches!(
            store.acquire("flow-1").await,
            Err(StoreError::LeaseHeld(_))
        ));

        store.release("flow-1").await;
        assert!(store.acquire("flow-1").await.is_ok());
    }
}
