//! Postgres-backed store via `sqlx`.
//! One connection pool, one table, rows identified by key with an
//! `expires_at` column, expired rows filtered out by the `WHERE` clause
//! rather than an eager sweep (the background sweep still runs to reclaim
//! space, see `reap_expired`).

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Pool, Postgres, Row};

use crate::{LeaseStore, Store, StoreError};

/// Expects a table of shape `(key TEXT PRIMARY KEY, value JSONB, expires_at
/// TIMESTAMPTZ)`, created by the embedding application's own migrations —
/// this crate does not own schema migration.
pub struct SqlxStore<V> {
    pool: Pool<Postgres>,
    table: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqlxStore<V> {
    pub fn new(pool: Pool<Postgres>, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            _value: PhantomData,
        }
    }

    /// Delete all rows past their `expires_at`. Intended to be called
    /// periodically from a background task, mirroring the in-memory
    /// backend's sweep.
    pub async fn reap_expired(&self) -> Result<u64, StoreError> {
        let query = format!("DELETE FROM {} WHERE expires_at <= $1", self.table);
        let result = sqlx::query(&query)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<V> Store<V> for SqlxStore<V>
where
    V: Send + Sync + Clone + Serialize + DeserializeOwned + 'static,
{
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        let payload =
            serde_json::to_value(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).map_err(|e| StoreError::Backend(e.to_string()))?;

        let query = format!(
            "INSERT INTO {} (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
            self.table
        );
        sqlx::query(&query)
            .bind(key)
            .bind(payload)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let query = format!(
            "SELECT value FROM {} WHERE key = $1 AND expires_at > $2",
            self.table
        );
        let row = sqlx::query(&query)
            .bind(key)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|row| {
            let raw: serde_json::Value = row.try_get("value").map_err(|e| StoreError::Backend(e.to_string()))?;
            serde_json::from_value(raw).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE key = $1", self.table);
        sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl<V> LeaseStore for SqlxStore<V>
where
    V: Send + Sync + 'static,
{
    /// Uses a dedicated `{table}_leases` table keyed by flow-id; the unique
    /// constraint on `key` makes acquisition a single atomic insert.
    async fn acquire(&self, key: &str) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {}_leases (key, acquired_at) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
            self.table
        );
        let result = sqlx::query(&query)
            .bind(key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::LeaseHeld(key.to_string()))
        }
    }

    async fn release(&self, key: &str) {
        let query = format!("DELETE FROM {}_leases WHERE key = $1", self.table);
        let _ = sqlx::query(&query).bind(key).execute(&self.pool).await;
    }
}
