//! Drives a two-node federated-login graph (redirect to GitHub, then
//! exchange the returned code) directly through `castellan-engine`,
//! printing each turn. No HTTP server involved - this is the engine's
//! own view of the flow, the same one `castellan-axum`'s
//! `/oauth2/authorize` handler drives internally.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castellan_assurance::AuthenticatorRegistry;
use castellan_core::error::AuthError;
use castellan_core::state::Identity;
use castellan_core::{AttributeValue, AuthenticatedUser, AuthenticationFactor, AuthenticatorMeta};
use castellan_engine::{EngineContext, FlowEngine};
use castellan_executors::federated::{FederatedExecutor, FederatedUserMapper};
use castellan_executors::ExecutorRegistry;
use castellan_graph::loader::load_graph;
use castellan_graph::GraphRegistry;
use castellan_providers_github::GithubProvider;
use castellan_store::memory::InMemoryStore;

const GRAPH_JSON: &str = r#"{
    "id": "github-login",
    "type": "AUTHENTICATION",
    "nodes": [
        { "id": "github_redirect", "type": "TASK_EXECUTION", "executor": { "name": "github" }, "next": ["auth_success"] },
        { "id": "auth_success", "type": "AUTH_SUCCESS", "next": [] }
    ]
}"#;

struct PrintingMapper;

#[async_trait]
impl FederatedUserMapper for PrintingMapper {
    async fn map(&self, identity: &Identity) -> Result<AuthenticatedUser, AuthError> {
        println!("mapped external identity {}:{} to a local user", identity.provider_id, identity.external_id);
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
    let client_id = std::env::var("CASTELLAN_GITHUB_CLIENT_ID").unwrap_or_else(|_| "demo-client-id".to_string());
    let client_secret = std::env::var("CASTELLAN_GITHUB_CLIENT_SECRET").unwrap_or_else(|_| "demo-secret".to_string());
    let redirect_uri = std::env::var("CASTELLAN_GITHUB_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8080/oauth2/authorize/resume/github".to_string());

    let provider = GithubProvider::new(client_id, client_secret, redirect_uri);
    let executor = FederatedExecutor::new("github", provider, PrintingMapper, vec!["read:user", "user:email"]);

    let mut executors = ExecutorRegistry::new();
    executors.register(Arc::new(executor));
    let executors = Arc::new(executors);

    let authenticators = Arc::new(AuthenticatorRegistry::new());
    authenticators.register(AuthenticatorMeta {
        name: "github".to_string(),
        factors: vec![AuthenticationFactor::Possession],
        idp_type: Some("github".to_string()),
    });

    let graph = load_graph(GRAPH_JSON, executors.as_ref())?;
    let graphs = Arc::new(GraphRegistry::from_graphs(HashMap::from([(graph.id.clone(), graph)])));

    let store = Arc::new(InMemoryStore::<EngineContext>::new());
    let engine = FlowEngine::new(graphs, executors, authenticators, store, Duration::from_secs(300));

    let step = engine.start("github-login", "demo-app", HashMap::new()).await?;
    println!("turn 1: status={:?} redirect_url={:?}", step.status, step.redirect_url);

    let state = step
        .additional_data
        .get("state")
        .and_then(|v| v.as_str())
        .expect("federated executor always stashes the csrf state on its first turn")
        .to_string();

    println!("turn 2: exchanging a simulated provider callback (will fail without real GitHub credentials)");
    let mut resume_input = HashMap::new();
    resume_input.insert("code".to_string(), "simulated-authorization-code".to_string());
    resume_input.insert("state".to_string(), state);

    match engine.resume(&step.flow_id, resume_input).await {
        Ok(step) => println!("turn 2: status={:?} authenticated={:?}", step.status, step.authenticated_user.is_some()),
        Err(e) => println!("turn 2: provider exchange failed as expected without real credentials: {e}"),
    }

    Ok(())
}
