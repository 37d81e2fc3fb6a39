//! # Castellan Store
//!
//! Generic TTL-backed key-value storage used for the flow store and the
//! authorization-code store. Both are concurrent maps with per-key write
//! serialisation
//! and TTL-driven background eviction; this crate models that once and lets
//! the engine and OAuth2 layers parametrise it by value type.
//!
//! `store-memory` (default) is the in-process backend. `store-redis` and
//! `store-sqlx` (with `postgres`/`mysql`/`sqlite`) back the same trait with
//! a shared datastore for multi-instance deployments.

#![allow(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

#[cfg(feature = "store-redis")]
pub mod redis_store;

#[cfg(feature = "store-sqlx")]
pub mod sqlx_store;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("a lease is already held for key {0}")]
    LeaseHeld(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A concurrent, TTL-evicting key-value store keyed by `String`.
///
/// Writes to a given key must be serialised; readers never
/// need to lock after bootstrap completion for the bootstrap-only
/// registries, but flow/code records mutate throughout their lifetime, so
/// every backend here does take a per-key lock on write.
#[async_trait]
pub trait Store<V>: Send + Sync
where
    V: Send + Sync + Clone + 'static,
{
    /// Insert or replace a value, resetting its TTL.
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Fetch a value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    /// Remove a value unconditionally (used for single-use consumption,
    /// e.g. authorization code redemption).
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically fetch-and-remove, used where a value must be consumed
    /// exactly once (authorization codes are single-use).
    async fn take(&self, key: &str) -> Result<Option<V>, StoreError> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.remove(key).await?;
        }
        Ok(value)
    }
}

/// Per-key turn serialisation: at most one concurrent turn per flow-id,
/// enforced by compare-and-swap on a lease.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Acquire the lease for `key`. Returns `LeaseHeld` if another turn
    /// currently holds it.
    async fn acquire(&self, key: &str) -> Result<(), StoreError>;

    /// Release a previously acquired lease. Idempotent.
    async fn release(&self, key: &str);
}

/// Marks a lease as held for the duration of one flow turn. `release` must
/// be called explicitly when the turn ends (success, FAILURE, or a
/// cancelled/aborted turn) — there is no async `Drop`, so a
/// caller that forgets to release leaks the lease until the flow's own TTL
/// expiry reclaims it.
pub struct LeaseGuard<'a, L: LeaseStore + ?Sized> {
    store: &'a L,
    key: String,
}

impl<'a, L: LeaseStore + ?Sized> LeaseGuard<'a, L> {
    pub async fn acquire(store: &'a L, key: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        store.acquire(&key).await?;
        Ok(Self { store, key })
    }

    pub async fn release(self) {
        self.store.release(&self.key).await;
    }
}
