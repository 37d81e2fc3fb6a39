//! Wires the configured concrete collaborators, executors, graphs, and
//! stores into a [`castellan::CastellanServices`] bundle. The builder
//! itself (`castellan::CastellanBuilder`) only assembles services from
//! already-constructed pieces; this module is where those pieces get
//! built for a single-process, in-memory deployment.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use castellan_assurance::AuthenticatorRegistry;
use castellan_core::{AuthenticationFactor, AuthenticatorMeta};
use castellan_crypto::{EncryptionService, FilePkiProvider, PkiKeyFile, PkiProvider};
use castellan_engine::EngineContext;
use castellan_executors::authorization::AuthorizationExecutor;
use castellan_executors::credentials::CredentialsExecutor;
use castellan_executors::federated::FederatedExecutor;
use castellan_executors::otp::OtpExecutor;
use castellan_executors::ou_creation::OuCreationExecutor;
use castellan_executors::provisioning::ProvisioningExecutor;
use castellan_executors::ExecutorRegistry;
use castellan_graph::GraphRegistry;
use castellan_guard::{Authenticator, JwtValidator, TokenStrategy};
use castellan_oauth2::authorize::PendingAuthorizationWire;
use castellan_oauth2::repository::StoreClientRepository;
use castellan_oauth2::{AuthorizationCode, ClientRepository};
use castellan_providers_discord::DiscordProvider;
use castellan_providers_github::GithubProvider;
use castellan_providers_google::GoogleProvider;
use castellan_store::memory::InMemoryStore;
use castellan_token::JwksCache;

use crate::collaborators::{
    AllowAllAuthorization, InMemoryOuService, InMemoryUserStore, TracingOtpChannel, UnimplementedPasskeyCeremony,
};
use crate::config::CastellanConfig;

/// Everything this process needs to run, independent of which HTTP
/// framework serves it.
pub struct Runtime {
    pub services: castellan::CastellanServices<InMemoryStore<EngineContext>, InMemoryStore<PendingAuthorizationWire>, castellan_guard::BearerIdentity>,
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to load PKI keys: {0}")]
    Pki(#[from] castellan_crypto::pki::PkiError),
    #[error("failed to load encryption key: {0}")]
    EncryptionKey(String),
    #[error(transparent)]
    Encryption(#[from] castellan_crypto::envelope::EncryptionError),
    #[error("failed to load authentication/registration graphs: {0}")]
    Graph(#[from] castellan_graph::error::GraphError),
    #[error(transparent)]
    Build(#[from] castellan::CastellanBuildError),
}

fn oauth_env(name_prefix: &str) -> (String, String, String) {
    let client_id = std::env::var(format!("CASTELLAN_{name_prefix}_CLIENT_ID")).unwrap_or_default();
    let client_secret = std::env::var(format!("CASTELLAN_{name_prefix}_CLIENT_SECRET")).unwrap_or_default();
    let redirect_uri = std::env::var(format!("CASTELLAN_{name_prefix}_REDIRECT_URI")).unwrap_or_default();
    (client_id, client_secret, redirect_uri)
}

/// Builds the flow-graph executor set: the local authenticators backed by
/// the in-memory dev collaborators from [`crate::collaborators`], the
/// federated authenticators (credentials optional, taken from environment
/// variables so a deployment without a GitHub/Google/Discord app configured
/// still boots), and the two registration-only utility executors.
fn build_executors(user_store: InMemoryUserStore) -> (Arc<ExecutorRegistry>, Arc<AuthenticatorRegistry>) {
    let mut executors = ExecutorRegistry::new();
    let authenticators = AuthenticatorRegistry::new();

    executors.register(Arc::new(CredentialsExecutor::new(user_store.clone(), user_store.clone())));
    authenticators.register(AuthenticatorMeta {
        name: "credentials".to_string(),
        factors: vec![AuthenticationFactor::Knowledge],
        idp_type: None,
    });

    executors.register(Arc::new(OtpExecutor::new(TracingOtpChannel::new())));
    authenticators.register(AuthenticatorMeta {
        name: "sms-otp".to_string(),
        factors: vec![AuthenticationFactor::Possession],
        idp_type: None,
    });

    executors.register(Arc::new(
        castellan_executors::passkey::PasskeyExecutor::new(UnimplementedPasskeyCeremony),
    ));
    authenticators.register(AuthenticatorMeta {
        name: "passkey".to_string(),
        factors: vec![AuthenticationFactor::Possession, AuthenticationFactor::Inherence],
        idp_type: None,
    });

    let (github_id, github_secret, github_redirect) = oauth_env("GITHUB");
    executors.register(Arc::new(FederatedExecutor::new(
        "github",
        GithubProvider::new(github_id, github_secret, github_redirect),
        user_store.clone(),
        vec!["read:user", "user:email"],
    )));
    authenticators.register(AuthenticatorMeta {
        name: "github".to_string(),
        factors: vec![AuthenticationFactor::Knowledge],
        idp_type: Some("github".to_string()),
    });

    let (google_id, google_secret, google_redirect) = oauth_env("GOOGLE");
    executors.register(Arc::new(FederatedExecutor::new(
        "google",
        GoogleProvider::new(google_id, google_secret, google_redirect),
        user_store.clone(),
        vec!["openid", "email", "profile"],
    )));
    authenticators.register(AuthenticatorMeta {
        name: "google".to_string(),
        factors: vec![AuthenticationFactor::Knowledge],
        idp_type: Some("google".to_string()),
    });

    let (discord_id, discord_secret, discord_redirect) = oauth_env("DISCORD");
    executors.register(Arc::new(FederatedExecutor::new(
        "discord",
        DiscordProvider::new(discord_id, discord_secret, discord_redirect),
        user_store.clone(),
        vec!["identify", "email"],
    )));
    authenticators.register(AuthenticatorMeta {
        name: "discord".to_string(),
        factors: vec![AuthenticationFactor::Knowledge],
        idp_type: Some("discord".to_string()),
    });

    executors.register(Arc::new(AuthorizationExecutor::new(AllowAllAuthorization)));
    executors.register(Arc::new(OuCreationExecutor::new(InMemoryOuService::new())));
    executors.register(Arc::new(ProvisioningExecutor::new(user_store)));

    (Arc::new(executors), Arc::new(authenticators))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_executors_registers_every_local_and_federated_authenticator() {
        let user_store = InMemoryUserStore::new();
        let (executors, authenticators) = build_executors(user_store);

        for name in ["credentials", "sms-otp", "passkey", "github", "google", "discord"] {
            assert!(authenticators.lookup(name).is_some(), "missing authenticator: {name}");
        }
        for name in [
            "credentials",
            "sms-otp",
            "passkey",
            "github",
            "google",
            "discord",
            "authorization",
            "ou-creation",
            castellan_executors::provisioning::PROVISIONING_EXECUTOR_NAME,
        ] {
            assert!(executors.lookup(name).is_some(), "missing executor: {name}");
        }
    }

    #[test]
    fn federated_authenticators_carry_their_idp_type() {
        let user_store = InMemoryUserStore::new();
        let (_executors, authenticators) = build_executors(user_store);

        assert_eq!(
            authenticators.lookup_by_idp("github").map(|meta| meta.name),
            Some("github".to_string())
        );
        assert_eq!(
            authenticators.lookup_by_idp("google").map(|meta| meta.name),
            Some("google".to_string())
        );
    }
}

pub async fn bootstrap(config: &CastellanConfig) -> Result<Runtime, BootstrapError> {
    let pki_entries: Vec<PkiKeyFile<'_>> = config
        .crypto
        .pki_keys
        .iter()
        .map(|k| PkiKeyFile {
            id: &k.id,
            cert_file: k.cert_file.as_path(),
            key_file: k.key_file.as_path(),
        })
        .collect();
    let pki: Arc<dyn PkiProvider> = Arc::new(FilePkiProvider::load(&pki_entries)?);

    let key_bytes = hex::decode(&config.crypto.encryption_key_hex)
        .map_err(|e| BootstrapError::EncryptionKey(e.to_string()))?;
    let secrets = Arc::new(EncryptionService::new("default", &key_bytes)?);

    let user_store = InMemoryUserStore::new();
    user_store.seed("demo", "demo-password");
    let (executors, authenticators) = build_executors(user_store);

    let graphs = Arc::new(GraphRegistry::load_directory(
        Path::new(&config.graph.directory),
        executors.as_ref(),
    )?);
    graphs.validate_default(&config.graph.default_authentication_graph_id)?;

    let engine_store = Arc::new(InMemoryStore::<EngineContext>::new());
    engine_store.spawn_eviction(Duration::from_secs(60));
    let pending_store = Arc::new(InMemoryStore::<PendingAuthorizationWire>::new());
    pending_store.spawn_eviction(Duration::from_secs(60));
    let codes_store: Arc<dyn castellan_store::Store<AuthorizationCode>> =
        Arc::new(InMemoryStore::<AuthorizationCode>::new());
    let denylist_store: Arc<dyn castellan_store::Store<()>> = Arc::new(InMemoryStore::<()>::new());

    let client_store = InMemoryStore::<castellan_oauth2::client::OAuth2Client>::new();
    let clients: Arc<dyn ClientRepository> = Arc::new(StoreClientRepository::new(client_store));

    let jwks_uri = format!("{}/oauth2/jwks", config.token.issuer);
    let jwks = Arc::new(JwksCache::new(jwks_uri, reqwest::Client::new()));

    let audience = config.token.audience.clone().unwrap_or_else(|| config.token.issuer.clone());
    let validator = JwtValidator::new(jwks.clone(), config.token.issuer.clone(), audience.clone());
    let guard = Arc::new(Authenticator::builder().with_strategy(TokenStrategy::new(validator)).build());

    let services = castellan::CastellanBuilder::new()
        .graphs(graphs)
        .executors(executors)
        .authenticators(authenticators)
        .engine_store(engine_store, Duration::from_secs(600))
        .clients(clients)
        .codes(codes_store)
        .pending(pending_store)
        .denylist(denylist_store)
        .pki(pki)
        .secrets(secrets)
        .jwks(jwks)
        .guard(guard)
        .issuer(config.token.issuer.clone())
        .default_graph_id(config.graph.default_authentication_graph_id.clone())
        .default_audience(audience)
        .build()?;

    Ok(Runtime { services })
}
