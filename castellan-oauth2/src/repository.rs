//! The `OAuth2Client` repository boundary. Persistence (Postgres/MySQL/
//! SQLite/Redis/in-memory) is `castellan-store`'s concern; this trait is
//! the seam the authorize/token/DCR handlers code against.

use async_trait::async_trait;

use crate::client::OAuth2Client;
use crate::error::OAuth2Error;

/// Looks up and persists [`OAuth2Client`] registrations. A
/// `castellan_store::Store<OAuth2Client>` keyed by `client_id` satisfies
/// this trivially (see [`StoreClientRepository`]); a SQL-backed deployment
/// may instead implement it directly against a `client_id` unique index.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find(&self, client_id: &str) -> Result<Option<OAuth2Client>, OAuth2Error>;

    async fn insert(&self, client: OAuth2Client) -> Result<(), OAuth2Error>;
}

/// Adapts any `castellan_store::Store<OAuth2Client>` (in-memory, Redis,
/// sqlx) into a [`ClientRepository`], keyed by `client_id` with no TTL —
/// client registrations are durable, not ephemeral.
pub struct StoreClientRepository<S> {
    store: S,
}

impl<S> StoreClientRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

/// Client registrations never expire on their own; `Store::put` still
/// requires a `Duration`, so registrations use a notional ten-year TTL
/// rather than special-casing "no expiry" in the generic store trait.
const NO_EXPIRY: std::time::Duration = std::time::Duration::from_secs(60 * 60 * 24 * 365 * 10);

#[async_trait]
impl<S> ClientRepository for StoreClientRepository<S>
where
    S: castellan_store::Store<OAuth2Client>,
{
    async fn find(&self, client_id: &str) -> Result<Option<OAuth2Client>, OAuth2Error> {
        Ok(self.store.get(client_id).await?)
    }

    async fn insert(&self, client: OAuth2Client) -> Result<(), OAuth2Error> {
        self.store
            .put(&client.client_id, client, NO_EXPIRY)
            .await?;
        Ok(())
    }
}
