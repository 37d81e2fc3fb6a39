//! Redis-backed store for multi-instance deployments. Values are
//! JSON-serialised; TTL is delegated to Redis's native key expiry (`SET ...
//! EX`) rather than re-implemented, since Redis already evicts for us.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::{LeaseStore, Store, StoreError};

pub struct RedisStore<V> {
    client: redis::Client,
    key_prefix: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> RedisStore<V> {
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            _value: PhantomData,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn lease_key(&self, key: &str) -> String {
        format!("{}:lease:{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl<V> Store<V> for RedisStore<V>
where
    V: Send + Sync + Clone + Serialize + DeserializeOwned + 'static,
{
    async fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.namespaced(key), payload, ttl.as_secs().max(1))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(self.namespaced(key))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        payload
            .map(|raw| serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string())))
            .transpose()
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.namespaced(key))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl<V> LeaseStore for RedisStore<V>
where
    V: Send + Sync + 'static,
{
    async fn acquire(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let acquired: bool = redis::cmd("SET")
            .arg(self.lease_key(key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(30)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if acquired {
            Ok(())
        } else {
            Err(StoreError::LeaseHeld(key.to_string()))
        }
    }

    async fn release(&self, key: &str) {
        if let Ok(mut conn) = self.connection().await {
            let _: Result<(), _> = conn.del(self.lease_key(key)).await;
        }
    }
}
