//! Wires the flow-graph engine, a federated GitHub executor, and
//! `castellan-axum`'s router together into one running server: the same
//! shape `castellan-server` deploys, trimmed to a single federated
//! authentication graph and in-memory stores throughout.
//!
//! Browser-session login UX is out of scope here - this demonstrates the
//! standards-surface `/oauth2/authorize` endpoint driving the federated
//! flow, not a cookie-backed application session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castellan_assurance::AuthenticatorRegistry;
use castellan_core::error::AuthError;
use castellan_core::state::Identity;
use castellan_core::{AttributeValue, AuthenticatedUser, AuthenticationFactor, AuthenticatorMeta};
use castellan_crypto::envelope::EncryptionService;
use castellan_crypto::pki::{FilePkiProvider, PkiKeyFile};
use castellan_crypto::PkiProvider;
use castellan_engine::EngineContext;
use castellan_executors::federated::{FederatedExecutor, FederatedUserMapper};
use castellan_executors::ExecutorRegistry;
use castellan_graph::loader::load_graph;
use castellan_graph::GraphRegistry;
use castellan_guard::{Authenticator, JwtValidator, TokenStrategy};
use castellan_oauth2::authorize::PendingAuthorizationWire;
use castellan_oauth2::repository::StoreClientRepository;
use castellan_oauth2::AuthorizationCode;
use castellan_providers_github::GithubProvider;
use castellan_store::memory::InMemoryStore;
use castellan_token::JwksCache;

const GRAPH_JSON: &str = r#"{
    "id": "github-login",
    "type": "AUTHENTICATION",
    "nodes": [
        { "id": "github_redirect", "type": "TASK_EXECUTION", "executor": { "name": "github" }, "next": ["auth_success"] },
        { "id": "auth_success", "type": "AUTH_SUCCESS", "next": [] }
    ]
}"#;

struct DemoMapper;

#[async_trait]
impl FederatedUserMapper for DemoMapper {
    async fn map(&self, identity: &Identity) -> Result<AuthenticatedUser, AuthError> {
        let mut attributes = HashMap::new();
        if let Some(email) = &identity.email {
            attributes.insert("email".to_string(), AttributeValue::String(email.clone()));
        }
        Ok(AuthenticatedUser {
            is_authenticated: true,
            user_id: Some(format!("github:{}", identity.external_id)),
            attributes,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let client_id = std::env::var("CASTELLAN_GITHUB_CLIENT_ID").unwrap_or_else(|_| "demo-client-id".to_string());
    let client_secret = std::env::var("CASTELLAN_GITHUB_CLIENT_SECRET").unwrap_or_else(|_| "demo-secret".to_string());
    let redirect_uri = std::env::var("CASTELLAN_GITHUB_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:3000/oauth2/authorize/resume/github".to_string());
    let provider = GithubProvider::new(client_id, client_secret, redirect_uri);

    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(FederatedExecutor::new(
        "github",
        provider,
        DemoMapper,
        vec!["read:user", "user:email"],
    )));
    let executors = Arc::new(executors);

    let authenticators = Arc::new(AuthenticatorRegistry::new());
    authenticators.register(AuthenticatorMeta {
        name: "github".to_string(),
        factors: vec![AuthenticationFactor::Possession],
        idp_type: Some("github".to_string()),
    });

    let graph = load_graph(GRAPH_JSON, executors.as_ref())?;
    let graphs = Arc::new(GraphRegistry::from_graphs(HashMap::from([(graph.id.clone(), graph)])));

    let pki_entries = [PkiKeyFile {
        id: "demo-2026",
        cert_file: Path::new("fixtures/dev-cert.pem"),
        key_file: Path::new("fixtures/dev-key.pem"),
    }];
    let pki: Arc<dyn PkiProvider> = Arc::new(FilePkiProvider::load(&pki_entries)?);

    // All-zero key: fine for this demo, never for a real deployment.
    let secrets = Arc::new(EncryptionService::new("default", &[0u8; 32])?);

    let issuer = "http://localhost:3000".to_string();
    let jwks = Arc::new(JwksCache::new(format!("{issuer}/oauth2/jwks"), reqwest::Client::new()));
    let validator = JwtValidator::new(jwks.clone(), issuer.clone(), issuer.clone());
    let guard = Arc::new(
        Authenticator::builder()
            .with_strategy(TokenStrategy::new(validator))
            .build(),
    );

    let engine_store = Arc::new(InMemoryStore::<EngineContext>::new());
    let pending_store = Arc::new(InMemoryStore::<PendingAuthorizationWire>::new());
    let codes_store = Arc::new(InMemoryStore::<AuthorizationCode>::new());
    let denylist_store = Arc::new(InMemoryStore::<()>::new());
    let client_repository = Arc::new(StoreClientRepository::new(InMemoryStore::<castellan_oauth2::OAuth2Client>::new()));

    let services = castellan::CastellanBuilder::new()
        .graphs(graphs)
        .executors(executors)
        .authenticators(authenticators)
        .engine_store(engine_store, Duration::from_secs(300))
        .clients(client_repository)
        .codes(codes_store)
        .pending(pending_store)
        .denylist(denylist_store)
        .pki(pki)
        .secrets(secrets)
        .jwks(jwks)
        .guard(guard)
        .issuer(issuer)
        .default_graph_id("github-login")
        .build()?;

    let state: castellan_axum::CastellanState<_, _, _> = services.into();
    let app = castellan_axum::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    println!("listening on http://localhost:3000 - GET /oauth2/authorize?client_id=...&response_type=code&redirect_uri=...&graph_id=github-login starts the GitHub flow");
    axum::serve(listener, app).await?;

    Ok(())
}
