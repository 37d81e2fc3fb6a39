//! In-memory default implementations of the executor framework's external
//! collaborator traits (user storage, notification transport, WebAuthn
//! ceremony, authorization decisions, OU management). These are kept out
//! of the core crates on purpose; every one of them is a real production
//! concern (a user database, an SMS gateway, a KMS-backed attestation
//! verifier) this binary does not implement. What follows is the smallest
//! working stand-in so `castellan-server` boots and drives a flow
//! end-to-end out of the box — swap any of these for a real backend by
//! implementing the same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::state::Identity;
use castellan_core::{AttributeValue, AuthenticatedUser, UserType};
use castellan_executors::authorization::AuthorizationPort;
use castellan_executors::credentials::{CredentialsAuth, ResolvedUser, UserLookup};
use castellan_executors::federated::FederatedUserMapper;
use castellan_executors::ou_creation::{OuService, OuServiceError};
use castellan_executors::otp::OtpChannel;
use castellan_executors::passkey::PasskeyCeremony;
use castellan_executors::provisioning::UserProvisioner;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredUser {
    user_id: String,
    org_unit_id: Option<String>,
    password: String,
}

#[derive(Default)]
struct UserStoreInner {
    by_username: RwLock<HashMap<String, StoredUser>>,
    by_external_id: RwLock<HashMap<String, String>>,
}

/// A process-local user directory. Not durable across restarts — a real
/// deployment points every trait impl here at its own user database
/// instead. Cheaply [`Clone`]: every clone shares the same underlying
/// table, so the same store can back the credentials, provisioning, and
/// federated-mapping executors at once.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    inner: Arc<UserStoreInner>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a username/password pair for local testing and demos.
    pub fn seed(&self, username: &str, password: &str) {
        let user_id = format!("user-{}", Uuid::new_v4());
        self.inner.by_username.write().expect("lock poisoned").insert(
            username.to_string(),
            StoredUser {
                user_id,
                org_unit_id: None,
                password: password.to_string(),
            },
        );
    }
}

#[async_trait]
impl UserLookup for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<ResolvedUser>, AuthError> {
        Ok(self
            .inner
            .by_username
            .read()
            .expect("lock poisoned")
            .get(username)
            .map(|stored| ResolvedUser {
                user_id: stored.user_id.clone(),
                org_unit_id: stored.org_unit_id.clone(),
            }))
    }
}

#[async_trait]
impl CredentialsAuth for InMemoryUserStore {
    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        Ok(self
            .inner
            .by_username
            .read()
            .expect("lock poisoned")
            .values()
            .any(|stored| stored.user_id == user_id && stored.password == password))
    }
}

#[async_trait]
impl UserProvisioner for InMemoryUserStore {
    async fn provision(&self, provisional: &AuthenticatedUser) -> Result<String, AuthError> {
        let username = match provisional.attributes.get("username") {
            Some(AttributeValue::String(s)) => s.clone(),
            _ => format!("user-{}", Uuid::new_v4()),
        };
        let mut guard = self.inner.by_username.write().expect("lock poisoned");
        if let Some(existing) = guard.get(&username) {
            return Ok(existing.user_id.clone());
        }
        let user_id = format!("user-{}", Uuid::new_v4());
        guard.insert(
            username,
            StoredUser {
                user_id: user_id.clone(),
                org_unit_id: None,
                password: String::new(),
            },
        );
        Ok(user_id)
    }
}

#[async_trait]
impl FederatedUserMapper for InMemoryUserStore {
    async fn map(&self, identity: &Identity) -> Result<AuthenticatedUser, AuthError> {
        let key = format!("{}:{}", identity.provider_id, identity.external_id);
        if let Some(user_id) = self.inner.by_external_id.read().expect("lock poisoned").get(&key).cloned() {
            return Ok(AuthenticatedUser {
                is_authenticated: true,
                user_id: Some(user_id),
                org_unit_id: None,
                user_type: Some(UserType::Standard),
                attributes: HashMap::new(),
            });
        }

        let user_id = format!("user-{}", Uuid::new_v4());
        self.inner
            .by_external_id
            .write()
            .expect("lock poisoned")
            .insert(key, user_id.clone());

        let mut attributes = HashMap::new();
        if let Some(email) = &identity.email {
            attributes.insert("email".to_string(), AttributeValue::String(email.clone()));
        }
        Ok(AuthenticatedUser {
            is_authenticated: true,
            user_id: Some(user_id),
            org_unit_id: None,
            user_type: Some(UserType::Standard),
            attributes,
        })
    }
}

/// Logs the one-time code via `tracing` instead of sending SMS/email.
/// Stands in for the abstract notification sender kept out of
/// scope.
#[derive(Default)]
pub struct TracingOtpChannel {
    challenges: RwLock<HashMap<String, String>>,
}

impl TracingOtpChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpChannel for TracingOtpChannel {
    async fn send(&self, user_id: &str) -> Result<String, AuthError> {
        let challenge_id = Uuid::new_v4().to_string();
        let code = format!("{:06}", rand::random::<u32>() % 1_000_000);
        tracing::info!(user_id, challenge_id, code, "one-time code issued (dev channel: not actually sent)");
        self.challenges
            .write()
            .expect("lock poisoned")
            .insert(challenge_id.clone(), code);
        Ok(challenge_id)
    }

    async fn verify(&self, challenge_id: &str, code: &str) -> Result<bool, AuthError> {
        Ok(self
            .challenges
            .read()
            .expect("lock poisoned")
            .get(challenge_id)
            .is_some_and(|expected| expected == code))
    }
}

/// Grants every requested permission unconditionally. A real authorization
/// decision point (policy engine, RBAC store) replaces this.
#[derive(Default)]
pub struct AllowAllAuthorization;

#[async_trait]
impl AuthorizationPort for AllowAllAuthorization {
    async fn authorize(
        &self,
        _user_id: &str,
        _group_ids: &[String],
        requested: &[String],
    ) -> Result<Vec<String>, AuthError> {
        Ok(requested.to_vec())
    }
}

/// An in-memory organizational-unit directory standing in for the OU
/// management service, kept external.
#[derive(Default)]
pub struct InMemoryOuService {
    by_name: RwLock<HashMap<String, String>>,
    by_handle: RwLock<HashMap<String, String>>,
}

impl InMemoryOuService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OuService for InMemoryOuService {
    async fn create(&self, name: &str, handle: &str, _description: Option<&str>) -> Result<String, OuServiceError> {
        if self.by_name.read().expect("lock poisoned").contains_key(name) {
            return Err(OuServiceError::NameConflict);
        }
        if self.by_handle.read().expect("lock poisoned").contains_key(handle) {
            return Err(OuServiceError::HandleConflict);
        }
        let ou_id = format!("ou-{}", Uuid::new_v4());
        self.by_name.write().expect("lock poisoned").insert(name.to_string(), ou_id.clone());
        self.by_handle.write().expect("lock poisoned").insert(handle.to_string(), ou_id.clone());
        Ok(ou_id)
    }
}

/// A passkey ceremony stand-in: the real WebAuthn attestation/assertion
/// cryptography is out of scope here,
/// so this always rejects — a deployment that wants passkeys must
/// implement [`PasskeyCeremony`] against a real WebAuthn library.
#[derive(Default)]
pub struct UnimplementedPasskeyCeremony;

#[async_trait]
impl PasskeyCeremony for UnimplementedPasskeyCeremony {
    async fn begin_assertion(&self, _user_id: &str) -> Result<(String, serde_json::Value), AuthError> {
        Err(AuthError::Provider(
            "passkey ceremony is not configured on this deployment".to_string(),
        ))
    }

    async fn verify_assertion(&self, _challenge_id: &str, _assertion: &serde_json::Value) -> Result<bool, AuthError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(provider_id: &str, external_id: &str, email: Option<&str>) -> Identity {
        Identity {
            provider_id: provider_id.to_string(),
            external_id: external_id.to_string(),
            email: email.map(str::to_string),
            username: None,
            attributes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn seeded_user_is_found_by_username() {
        let store = InMemoryUserStore::new();
        store.seed("alice", "hunter2");
        let resolved = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(store.verify_password(&resolved.user_id, "hunter2").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_username_resolves_to_none() {
        let store = InMemoryUserStore::new();
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_fails_verification() {
        let store = InMemoryUserStore::new();
        store.seed("alice", "hunter2");
        let resolved = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(!store.verify_password(&resolved.user_id, "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn provisioning_a_new_username_creates_a_fresh_user() {
        let store = InMemoryUserStore::new();
        let mut provisional = AuthenticatedUser::default();
        provisional.attributes.insert("username".to_string(), AttributeValue::String("bob".to_string()));
        let user_id = store.provision(&provisional).await.unwrap();
        let resolved = store.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(resolved.user_id, user_id);
    }

    #[tokio::test]
    async fn provisioning_an_existing_username_is_idempotent() {
        let store = InMemoryUserStore::new();
        let mut provisional = AuthenticatedUser::default();
        provisional.attributes.insert("username".to_string(), AttributeValue::String("bob".to_string()));
        let first = store.provision(&provisional).await.unwrap();
        let second = store.provision(&provisional).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn federated_mapping_creates_a_new_local_user_on_first_sight() {
        let store = InMemoryUserStore::new();
        let outcome = store
            .map(&identity("github", "gh-123", Some("a@example.com")))
            .await
            .unwrap();
        assert!(outcome.is_authenticated);
        assert!(outcome.user_id.is_some());
        assert_eq!(
            outcome.attributes.get("email").and_then(AttributeValue::as_str),
            Some("a@example.com")
        );
    }

    #[tokio::test]
    async fn federated_mapping_is_stable_across_repeat_sign_ins() {
        let store = InMemoryUserStore::new();
        let first = store.map(&identity("github", "gh-123", None)).await.unwrap();
        let second = store.map(&identity("github", "gh-123", None)).await.unwrap();
        assert_eq!(first.user_id, second.user_id);
    }

    #[tokio::test]
    async fn distinct_providers_with_the_same_external_id_map_to_distinct_users() {
        let store = InMemoryUserStore::new();
        let github = store.map(&identity("github", "same-id", None)).await.unwrap();
        let google = store.map(&identity("google", "same-id", None)).await.unwrap();
        assert_ne!(github.user_id, google.user_id);
    }

    #[tokio::test]
    async fn otp_round_trips_with_the_issued_code() {
        let channel = TracingOtpChannel::new();
        let challenge_id = channel.send("user-1").await.unwrap();
        let challenges = channel.challenges.read().unwrap();
        let code = challenges.get(&challenge_id).unwrap().clone();
        drop(challenges);
        assert!(channel.verify(&challenge_id, &code).await.unwrap());
    }

    #[tokio::test]
    async fn otp_rejects_a_wrong_code() {
        let channel = TracingOtpChannel::new();
        let challenge_id = channel.send("user-1").await.unwrap();
        assert!(!channel.verify(&challenge_id, "000000").await.unwrap());
    }

    #[tokio::test]
    async fn otp_rejects_an_unknown_challenge_id() {
        let channel = TracingOtpChannel::new();
        assert!(!channel.verify("never-issued", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn allow_all_authorization_grants_every_requested_scope() {
        let authz = AllowAllAuthorization;
        let granted = authz
            .authorize("user-1", &["group-a".to_string()], &["read".to_string(), "write".to_string()])
            .await
            .unwrap();
        assert_eq!(granted, vec!["read".to_string(), "write".to_string()]);
    }

    #[tokio::test]
    async fn ou_creation_succeeds_on_first_use_of_a_name_and_handle() {
        let ous = InMemoryOuService::new();
        let ou_id = ous.create("Engineering", "engineering", None).await.unwrap();
        assert!(ou_id.starts_with("ou-"));
    }

    #[tokio::test]
    async fn ou_creation_rejects_a_duplicate_name() {
        let ous = InMemoryOuService::new();
        ous.create("Engineering", "eng-1", None).await.unwrap();
        let err = ous.create("Engineering", "eng-2", None).await.unwrap_err();
        assert!(matches!(err, OuServiceError::NameConflict));
    }

    #[tokio::test]
    async fn ou_creation_rejects_a_duplicate_handle() {
        let ous = InMemoryOuService::new();
        ous.create("Engineering", "shared-handle", None).await.unwrap();
        let err = ous.create("Sales", "shared-handle", None).await.unwrap_err();
        assert!(matches!(err, OuServiceError::HandleConflict));
    }

    #[tokio::test]
    async fn unimplemented_passkey_ceremony_always_refuses_to_begin() {
        let ceremony = UnimplementedPasskeyCeremony;
        assert!(ceremony.begin_assertion("user-1").await.is_err());
    }

    #[tokio::test]
    async fn unimplemented_passkey_ceremony_never_verifies_an_assertion() {
        let ceremony = UnimplementedPasskeyCeremony;
        assert!(!ceremony
            .verify_assertion("challenge-1", &serde_json::json!({}))
            .await
            .unwrap());
    }
}
