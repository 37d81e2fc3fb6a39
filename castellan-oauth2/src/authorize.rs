//! `/oauth2/authorize` (RFC 6749 §4.1.1): validates the request against the
//! client registration, starts (or resumes) a flow through
//! `castellan-engine`, and — once the flow engine reports COMPLETE — mints
//! the single-use [`AuthorizationCode`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use castellan_core::pkce::ChallengeMethod;
use castellan_engine::{EngineContext, FlowEngine, FlowStep, FlowStepStatus, FlowStepType};
use castellan_store::{LeaseStore, Store};
use chrono::Utc;
use rand::RngCore;

use crate::client::{GrantType, OAuth2Client, ResponseType};
use crate::code::{AuthorizationCode, AUTHORIZATION_CODE_TTL};
use crate::error::OAuth2Error;
use crate::repository::ClientRepository;

/// The parsed `/oauth2/authorize` query/form parameters.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
}

/// What the authorize endpoint needs remembered across HTTP turns of the
/// same flow — the parts of the request the flow engine itself has no
/// reason to know about.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct PendingAuthorization {
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<ChallengeMethod>,
    state: Option<String>,
    nonce: Option<String>,
}

/// The result of driving one authorize-endpoint turn.
pub enum AuthorizeOutcome {
    /// The flow suspended; the caller renders the `FlowStep` (a VIEW
    /// prompt or a REDIRECTION to a federated IdP) and calls
    /// [`AuthorizationService::resume`] with the next turn's input.
    Pending(FlowStep),
    /// The flow completed (or failed after the redirect URI was already
    /// validated): redirect the user-agent here. A failure is carried as
    /// `error`/`error_description` query parameters per RFC 6749 §4.1.2.1,
    /// not as an `OAuth2Error`, because the redirect URI is the correct
    /// place for it once validated.
    Redirect { url: String },
}

pub struct AuthorizationService<S, P> {
    engine: Arc<FlowEngine<S>>,
    clients: Arc<dyn ClientRepository>,
    codes: Arc<dyn Store<AuthorizationCode>>,
    pending: Arc<P>,
    default_graph_id: String,
    flow_ttl: Duration,
}

impl<S, P> AuthorizationService<S, P>
where
    S: Store<EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    pub fn new(
        engine: Arc<FlowEngine<S>>,
        clients: Arc<dyn ClientRepository>,
        codes: Arc<dyn Store<AuthorizationCode>>,
        pending: Arc<P>,
        default_graph_id: impl Into<String>,
        flow_ttl: Duration,
    ) -> Self {
        Self {
            engine,
            clients,
            codes,
            pending,
            default_graph_id: default_graph_id.into(),
            flow_ttl,
        }
    }

    /// Validate the request, start a flow, and drive its first turn.
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let client = self
            .clients
            .find(&request.client_id)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;

        if !client.allows_redirect_uri(&request.redirect_uri) {
            return Err(OAuth2Error::InvalidRequest(
                "redirect_uri does not match a registered URI".to_string(),
            ));
        }

        let response_type = ResponseType::parse(&request.response_type).ok_or_else(|| {
            OAuth2Error::UnsupportedResponseType(request.response_type.clone())
        })?;
        if !client.allows_response_type(response_type) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed this response_type".to_string(),
            ));
        }
        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed the authorization_code grant".to_string(),
            ));
        }

        let code_challenge_method = match &request.code_challenge {
            Some(_) => Some(ChallengeMethod::parse(request.code_challenge_method.as_deref())?),
            None if client.require_pkce => {
                return Err(OAuth2Error::InvalidRequest(
                    "code_challenge is required for this client".to_string(),
                ));
            }
            None => None,
        };
        if client.is_public() && code_challenge_method != Some(ChallengeMethod::S256) {
            return Err(OAuth2Error::InvalidRequest(
                "public clients must use S256 PKCE".to_string(),
            ));
        }

        let scopes: Vec<String> = request
            .scope
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let graph_id = client
            .flow_graph_id
            .clone()
            .unwrap_or_else(|| self.default_graph_id.clone());

        let step = self
            .engine
            .start(&graph_id, &client.client_id, HashMap::new())
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        let pending = PendingAuthorization {
            client_id: client.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            code_challenge: request.code_challenge,
            code_challenge_method,
            state: request.state,
            nonce: request.nonce,
        };
        self.pending
            .put(&step.flow_id, pending.clone().into(), self.flow_ttl)
            .await?;

        self.handle_step(&client, &pending, step).await
    }

    /// Drive the next turn of an already-started authorization flow.
    pub async fn resume(
        &self,
        flow_id: &str,
        user_input: HashMap<String, String>,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        let pending: PendingAuthorization = self
            .pending
            .get(flow_id)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidGrant("unknown or expired flow".to_string()))?
            .into();

        let client = self
            .clients
            .find(&pending.client_id)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;

        let step = self
            .engine
            .resume(flow_id, user_input)
            .await
            .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;

        self.handle_step(&client, &pending, step).await
    }

    async fn handle_step(
        &self,
        client: &OAuth2Client,
        pending: &PendingAuthorization,
        step: FlowStep,
    ) -> Result<AuthorizeOutcome, OAuth2Error> {
        match step.status {
            FlowStepStatus::Incomplete => {
                debug_assert!(matches!(
                    step.step_type,
                    Some(FlowStepType::View) | Some(FlowStepType::Redirection)
                ));
                Ok(AuthorizeOutcome::Pending(step))
            }
            FlowStepStatus::Complete => {
                self.pending.remove(&step.flow_id).await.ok();
                let user = step.authenticated_user.unwrap_or_default();
                let assurance = step.assurance.unwrap_or_default();
                let subject = user
                    .user_id
                    .ok_or_else(|| OAuth2Error::ServerError("completed flow has no subject".to_string()))?;

                let code = generate_code();
                let record = AuthorizationCode {
                    code: code.clone(),
                    client_id: client.client_id.clone(),
                    redirect_uri: pending.redirect_uri.clone(),
                    scopes: pending.scopes.clone(),
                    code_challenge: pending.code_challenge.clone(),
                    code_challenge_method: pending.code_challenge_method,
                    subject,
                    assurance,
                    auth_time: Utc::now(),
                    nonce: pending.nonce.clone(),
                };
                self.codes
                    .put(&code, record, AUTHORIZATION_CODE_TTL)
                    .await?;

                let mut url = url::Url::parse(&pending.redirect_uri)
                    .map_err(|_| OAuth2Error::InvalidRequest("malformed redirect_uri".to_string()))?;
                {
                    let mut qs = url.query_pairs_mut();
                    qs.append_pair("code", &code);
                    if let Some(state) = &pending.state {
                        qs.append_pair("state", state);
                    }
                }
                Ok(AuthorizeOutcome::Redirect { url: url.to_string() })
            }
            FlowStepStatus::Error => {
                self.pending.remove(&step.flow_id).await.ok();
                let mut url = url::Url::parse(&pending.redirect_uri)
                    .map_err(|_| OAuth2Error::InvalidRequest("malformed redirect_uri".to_string()))?;
                {
                    let mut qs = url.query_pairs_mut();
                    qs.append_pair("error", "access_denied");
                    qs.append_pair(
                        "error_description",
                        step.failure_reason.as_deref().unwrap_or("authentication failed"),
                    );
                    if let Some(state) = &pending.state {
                        qs.append_pair("state", state);
                    }
                }
                Ok(AuthorizeOutcome::Redirect { url: url.to_string() })
            }
        }
    }
}

fn generate_code() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// The serializable wire shape of [`PendingAuthorization`], public only so
/// it can name a concrete `Store<V>` type parameter at the call site.
pub type PendingAuthorizationWire = PendingAuthorization;

impl From<PendingAuthorization> for PendingAuthorizationWire {
    fn from(value: PendingAuthorization) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TokenEndpointAuthMethod;
    use crate::repository::StoreClientRepository;
    use async_trait::async_trait;
    use castellan_assurance::AuthenticatorRegistry;
    use castellan_core::error::AuthError;
    use castellan_core::{AuthenticationFactor, AuthenticatedUser, AuthenticatorMeta};
    use castellan_executors::{Executor, ExecutorKind, ExecutorRegistry, ExecutorResponse, NodeContext};
    use castellan_graph::{loader::build_graph, model::GraphDef, GraphRegistry};
    use castellan_store::InMemoryStore;
    use std::collections::HashMap as Map;

    struct AllowAll;
    impl castellan_graph::ExecutorLookup for AllowAll {
        fn is_registered(&self, _name: &str) -> bool {
            true
        }
    }

    /// Completes on its first turn with a fixed subject, no input required.
    struct Auto;
    #[async_trait]
    impl Executor for Auto {
        fn name(&self) -> &str {
            "auto"
        }
        fn kind(&self) -> ExecutorKind {
            ExecutorKind::Authentication
        }
        async fn execute(&self, _ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
            let mut user = AuthenticatedUser::new();
            user.is_authenticated = true;
            user.user_id = Some("user-1".to_string());
            Ok(ExecutorResponse::complete().with_authenticated_user(user))
        }
    }

    fn auto_complete_graph() -> castellan_graph::FlowGraph {
        let def: GraphDef = serde_json::from_str(
            r#"{"id":"login","type":"AUTHENTICATION","nodes":[
                {"id":"login_step","type":"PROMPT","executor":{"name":"auto"},"next":["auth_success"]},
                {"id":"auth_success","type":"AUTH_SUCCESS","next":[]}
            ]}"#,
        )
        .unwrap();
        build_graph(def, &AllowAll).unwrap()
    }

    fn service() -> AuthorizationService<InMemoryStore<EngineContext>, InMemoryStore<PendingAuthorizationWire>> {
        let mut graphs = Map::new();
        let graph = auto_complete_graph();
        graphs.insert(graph.id.clone(), graph);
        let graphs = Arc::new(GraphRegistry::from_graphs(graphs));
        let mut executors = ExecutorRegistry::new();
        executors.register(Arc::new(Auto));
        let executors = Arc::new(executors);
        let authenticators = AuthenticatorRegistry::new();
        authenticators.register(AuthenticatorMeta {
            name: "auto".into(),
            factors: vec![AuthenticationFactor::Knowledge],
            idp_type: None,
        });
        let authenticators = Arc::new(authenticators);
        let engine = Arc::new(FlowEngine::new(
            graphs,
            executors,
            authenticators,
            Arc::new(InMemoryStore::new()),
            Duration::from_secs(900),
        ));

        let client_store: InMemoryStore<OAuth2Client> = InMemoryStore::new();
        let repo = Arc::new(StoreClientRepository::new(client_store));

        AuthorizationService::new(
            engine,
            repo,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryStore::new()),
            "login",
            Duration::from_secs(900),
        )
    }

    fn test_client() -> OAuth2Client {
        OAuth2Client {
            client_id: "client-1".into(),
            hashed_client_secret: None,
            grant_types: vec![GrantType::AuthorizationCode],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec!["https://app.example/callback".into()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            require_pkce: true,
            flow_graph_id: None,
            scopes: vec!["openid".into()],
        }
    }

    #[tokio::test]
    async fn unknown_redirect_uri_is_rejected() {
        let svc = service();
        svc.clients.insert(test_client()).await.unwrap();

        let req = AuthorizeRequest {
            response_type: "code".into(),
            client_id: "client-1".into(),
            redirect_uri: "https://evil.example/callback".into(),
            scope: "openid".into(),
            state: None,
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into()),
            code_challenge_method: Some("S256".into()),
            nonce: None,
        };

        assert!(matches!(
            svc.authorize(req).await,
            Err(OAuth2Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn completed_flow_redirects_with_a_single_use_code() {
        let svc = service();
        svc.clients.insert(test_client()).await.unwrap();

        let req = AuthorizeRequest {
            response_type: "code".into(),
            client_id: "client-1".into(),
            redirect_uri: "https://app.example/callback".into(),
            scope: "openid".into(),
            state: Some("xyz".into()),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into()),
            code_challenge_method: Some("S256".into()),
            nonce: None,
        };

        match svc.authorize(req).await.unwrap() {
            AuthorizeOutcome::Redirect { url } => {
                assert!(url.contains("code="));
                assert!(url.contains("state=xyz"));
            }
            AuthorizeOutcome::Pending(_) => panic!("expected an immediate redirect"),
        }
    }
}
