//! Top-level umbrella crate: feature-gated re-exports of every Castellan
//! crate, plus [`CastellanBuilder`], which assembles the framework-agnostic
//! services (`castellan-oauth2`, `castellan-oidc`, the `castellan-engine`
//! flow engine) into a single [`CastellanServices`] bundle. An HTTP layer
//! (`castellan-axum`, `castellan-actix`) then adapts that bundle into its
//! own application state — neither HTTP crate duplicates this wiring.
//!
//! The builder does not construct graphs, executors, or federated-identity
//! providers itself: those require concrete types (which `OAuthProvider`,
//! which `FederatedUserMapper`, which graph directory) that only the
//! deployment — `castellan-server` or an example binary — knows about.

use std::sync::Arc;
use std::time::Duration;

use castellan_assurance::AuthenticatorRegistry;
use castellan_crypto::{EncryptionService, PkiProvider};
use castellan_engine::{EngineContext, FlowEngine};
use castellan_executors::ExecutorRegistry;
use castellan_graph::GraphRegistry;
use castellan_guard::Authenticator;
use castellan_oauth2::authorize::PendingAuthorizationWire;
use castellan_oauth2::{
    AuthorizationCode, AuthorizationService, ClientRepository, RegistrationService, RevocationService, TokenService,
};
use castellan_oidc::{DiscoveryConfig, IntrospectionService, UserInfoService};
use castellan_store::{LeaseStore, Store};
use castellan_token::{JwksCache, TokenIssuer};

#[cfg(feature = "engine")]
pub use castellan_assurance as assurance;
pub use castellan_core as core;
#[cfg(feature = "crypto")]
pub use castellan_crypto as crypto;
#[cfg(feature = "engine")]
pub use castellan_engine as engine;
#[cfg(feature = "engine")]
pub use castellan_executors as executors;
#[cfg(feature = "engine")]
pub use castellan_graph as graph;
#[cfg(feature = "guard")]
pub use castellan_guard as guard;
#[cfg(feature = "oauth2")]
pub use castellan_oauth2 as oauth2;
#[cfg(feature = "oidc")]
pub use castellan_oidc as oidc;
#[cfg(feature = "store")]
pub use castellan_store as store;
#[cfg(feature = "token")]
pub use castellan_token as token;

#[cfg(feature = "axum")]
pub use castellan_axum;
#[cfg(feature = "actix")]
pub use castellan_actix;

#[cfg(feature = "github")]
pub use castellan_providers_github;
#[cfg(feature = "google")]
pub use castellan_providers_google;
#[cfg(feature = "discord")]
pub use castellan_providers_discord;

/// Everything an HTTP crate needs to serve the protocol surface, with no
/// framework dependency of its own. `castellan-axum::CastellanState` and
/// `castellan-actix::CastellanState` both construct from this.
pub struct CastellanServices<S, P, I> {
    pub authorize: Arc<AuthorizationService<S, P>>,
    pub token: Arc<TokenService>,
    pub revoke: Arc<RevocationService>,
    pub registration: Arc<RegistrationService>,
    pub introspection: Arc<IntrospectionService>,
    pub userinfo: Arc<UserInfoService>,
    pub discovery: Arc<DiscoveryConfig>,
    pub pki: Arc<dyn PkiProvider>,
    pub guard: Arc<Authenticator<I>>,
}

impl<S, P, I> Clone for CastellanServices<S, P, I>
where
    S: Store<EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    fn clone(&self) -> Self {
        Self {
            authorize: self.authorize.clone(),
            token: self.token.clone(),
            revoke: self.revoke.clone(),
            registration: self.registration.clone(),
            introspection: self.introspection.clone(),
            userinfo: self.userinfo.clone(),
            discovery: self.discovery.clone(),
            pki: self.pki.clone(),
            guard: self.guard.clone(),
        }
    }
}

#[cfg(feature = "axum")]
impl<S, P, I> From<CastellanServices<S, P, I>> for castellan_axum::CastellanState<S, P, I>
where
    S: Store<EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    fn from(services: CastellanServices<S, P, I>) -> Self {
        Self {
            authorize: services.authorize,
            token: services.token,
            revoke: services.revoke,
            registration: services.registration,
            introspection: services.introspection,
            userinfo: services.userinfo,
            discovery: services.discovery,
            pki: services.pki,
            guard: services.guard,
        }
    }
}

#[cfg(feature = "actix")]
impl<S, P, I> From<CastellanServices<S, P, I>> for castellan_actix::CastellanState<S, P, I>
where
    S: Store<EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    fn from(services: CastellanServices<S, P, I>) -> Self {
        Self {
            authorize: services.authorize,
            token: services.token,
            revoke: services.revoke,
            registration: services.registration,
            introspection: services.introspection,
            userinfo: services.userinfo,
            discovery: services.discovery,
            pki: services.pki,
            guard: services.guard,
        }
    }
}

/// Error produced when [`CastellanBuilder::build`] is missing a required
/// component.
#[derive(Debug, thiserror::Error)]
pub enum CastellanBuildError {
    #[error("CastellanBuilder is missing required component: {0}")]
    MissingComponent(&'static str),
}

/// Assembles a [`CastellanServices`] bundle from its constituent services.
/// Every field is supplied by the deployment (`castellan-server`, an
/// example, a test) since each depends on concrete choices — the storage
/// backend, the PKI source, which graphs are loaded — that this crate
/// cannot make on its own.
pub struct CastellanBuilder<S, P, I> {
    graphs: Option<Arc<GraphRegistry>>,
    executors: Option<Arc<ExecutorRegistry>>,
    authenticators: Option<Arc<AuthenticatorRegistry>>,
    engine_store: Option<Arc<S>>,
    flow_ttl: Option<Duration>,
    clients: Option<Arc<dyn ClientRepository>>,
    codes: Option<Arc<dyn Store<AuthorizationCode>>>,
    pending: Option<Arc<P>>,
    denylist: Option<Arc<dyn Store<()>>>,
    pki: Option<Arc<dyn PkiProvider>>,
    secrets: Option<Arc<EncryptionService>>,
    jwks: Option<Arc<JwksCache>>,
    guard: Option<Arc<Authenticator<I>>>,
    issuer: Option<String>,
    default_graph_id: Option<String>,
    default_audience: Option<String>,
    scopes_supported: Vec<&'static str>,
}

impl<S, P, I> CastellanBuilder<S, P, I>
where
    S: Store<EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    pub fn new() -> Self {
        Self {
            graphs: None,
            executors: None,
            authenticators: None,
            engine_store: None,
            flow_ttl: None,
            clients: None,
            codes: None,
            pending: None,
            denylist: None,
            pki: None,
            secrets: None,
            jwks: None,
            guard: None,
            issuer: None,
            default_graph_id: None,
            default_audience: None,
            scopes_supported: vec!["openid", "profile", "email"],
        }
    }

    #[must_use]
    pub fn graphs(mut self, graphs: Arc<GraphRegistry>) -> Self {
        self.graphs = Some(graphs);
        self
    }

    #[must_use]
    pub fn executors(mut self, executors: Arc<ExecutorRegistry>) -> Self {
        self.executors = Some(executors);
        self
    }

    #[must_use]
    pub fn authenticators(mut self, authenticators: Arc<AuthenticatorRegistry>) -> Self {
        self.authenticators = Some(authenticators);
        self
    }

    #[must_use]
    pub fn engine_store(mut self, store: Arc<S>, flow_ttl: Duration) -> Self {
        self.engine_store = Some(store);
        self.flow_ttl = Some(flow_ttl);
        self
    }

    #[must_use]
    pub fn clients(mut self, clients: Arc<dyn ClientRepository>) -> Self {
        self.clients = Some(clients);
        self
    }

    #[must_use]
    pub fn codes(mut self, codes: Arc<dyn Store<AuthorizationCode>>) -> Self {
        self.codes = Some(codes);
        self
    }

    #[must_use]
    pub fn pending(mut self, pending: Arc<P>) -> Self {
        self.pending = Some(pending);
        self
    }

    #[must_use]
    pub fn denylist(mut self, denylist: Arc<dyn Store<()>>) -> Self {
        self.denylist = Some(denylist);
        self
    }

    #[must_use]
    pub fn pki(mut self, pki: Arc<dyn PkiProvider>) -> Self {
        self.pki = Some(pki);
        self
    }

    #[must_use]
    pub fn secrets(mut self, secrets: Arc<EncryptionService>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    #[must_use]
    pub fn jwks(mut self, jwks: Arc<JwksCache>) -> Self {
        self.jwks = Some(jwks);
        self
    }

    #[must_use]
    pub fn guard(mut self, guard: Arc<Authenticator<I>>) -> Self {
        self.guard = Some(guard);
        self
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn default_graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.default_graph_id = Some(graph_id.into());
        self
    }

    #[must_use]
    pub fn default_audience(mut self, audience: impl Into<String>) -> Self {
        self.default_audience = Some(audience.into());
        self
    }

    #[must_use]
    pub fn scopes_supported(mut self, scopes: Vec<&'static str>) -> Self {
        self.scopes_supported = scopes;
        self
    }

    fn required<T>(value: Option<T>, name: &'static str) -> Result<T, CastellanBuildError> {
        value.ok_or(CastellanBuildError::MissingComponent(name))
    }

    pub fn build(self) -> Result<CastellanServices<S, P, I>, CastellanBuildError> {
        let graphs = Self::required(self.graphs, "graphs")?;
        let executors = Self::required(self.executors, "executors")?;
        let authenticators = Self::required(self.authenticators, "authenticators")?;
        let engine_store = Self::required(self.engine_store, "engine_store")?;
        let flow_ttl = Self::required(self.flow_ttl, "flow_ttl (set via engine_store)")?;
        let clients = Self::required(self.clients, "clients")?;
        let codes = Self::required(self.codes, "codes")?;
        let pending = Self::required(self.pending, "pending")?;
        let denylist = Self::required(self.denylist, "denylist")?;
        let pki = Self::required(self.pki, "pki")?;
        let secrets = Self::required(self.secrets, "secrets")?;
        let jwks = Self::required(self.jwks, "jwks")?;
        let guard = Self::required(self.guard, "guard")?;
        let issuer = Self::required(self.issuer, "issuer")?;
        let default_graph_id = Self::required(self.default_graph_id, "default_graph_id")?;
        let default_audience = self.default_audience.unwrap_or_else(|| issuer.clone());

        let engine = Arc::new(FlowEngine::new(graphs, executors, authenticators, engine_store, flow_ttl));
        let token_issuer = Arc::new(TokenIssuer::new(pki.clone(), issuer.clone()));

        let authorize = Arc::new(AuthorizationService::new(
            engine,
            clients.clone(),
            codes.clone(),
            pending,
            default_graph_id,
            flow_ttl,
        ));
        let token = Arc::new(TokenService::new(
            clients.clone(),
            codes,
            token_issuer,
            pki.clone(),
            secrets.clone(),
            issuer.clone(),
            default_audience.clone(),
        ));
        let revoke = Arc::new(RevocationService::new(clients.clone(), denylist, pki.clone()));
        let registration = Arc::new(RegistrationService::new(
            clients,
            secrets,
            self.scopes_supported.iter().map(|s| s.to_string()).collect(),
        ));
        let introspection = Arc::new(IntrospectionService::new(jwks.clone(), issuer.clone(), default_audience.clone()));
        let userinfo = Arc::new(UserInfoService::new(jwks, issuer.clone(), default_audience));
        let discovery = Arc::new(DiscoveryConfig {
            issuer,
            scopes_supported: self.scopes_supported,
        });

        Ok(CastellanServices {
            authorize,
            token,
            revoke,
            registration,
            introspection,
            userinfo,
            discovery,
            pki,
            guard,
        })
    }
}

#[cfg(all(test, feature = "full"))]
mod tests {
    use super::*;
    use castellan_crypto::FilePkiProvider;
    use castellan_executors::ExecutorRegistry;
    use castellan_guard::{Authenticator, BearerIdentity};
    use castellan_oauth2::client::OAuth2Client;
    use castellan_oauth2::repository::StoreClientRepository;
    use castellan_store::memory::InMemoryStore;
    use std::collections::HashMap;

    type TestBuilder = CastellanBuilder<InMemoryStore<EngineContext>, InMemoryStore<PendingAuthorizationWire>, BearerIdentity>;

    #[test]
    fn build_without_any_component_fails_on_the_first_missing_one() {
        let result = TestBuilder::new().build();
        assert!(matches!(
            result,
            Err(CastellanBuildError::MissingComponent("graphs"))
        ));
    }

    #[test]
    fn build_reports_the_first_unset_field_after_some_are_set() {
        let result = TestBuilder::new()
            .graphs(Arc::new(GraphRegistry::from_graphs(HashMap::new())))
            .executors(Arc::new(ExecutorRegistry::new()))
            .build();
        assert!(matches!(
            result,
            Err(CastellanBuildError::MissingComponent("authenticators"))
        ));
    }

    #[test]
    fn build_assembles_every_service_once_all_components_are_supplied() {
        let clients: Arc<dyn ClientRepository> = Arc::new(StoreClientRepository::new(
            InMemoryStore::<OAuth2Client>::new(),
        ));
        let codes: Arc<dyn Store<AuthorizationCode>> = Arc::new(InMemoryStore::<AuthorizationCode>::new());
        let denylist: Arc<dyn Store<()>> = Arc::new(InMemoryStore::<()>::new());
        let pki: Arc<dyn PkiProvider> = Arc::new(FilePkiProvider::load(&[]).unwrap());
        let secrets = Arc::new(EncryptionService::new("default", &[7u8; 32]).unwrap());
        let jwks = Arc::new(JwksCache::new(
            "https://issuer.test/oauth2/jwks".to_string(),
            reqwest::Client::new(),
        ));
        let guard = Arc::new(Authenticator::<BearerIdentity>::builder().build());

        let services = TestBuilder::new()
            .graphs(Arc::new(GraphRegistry::from_graphs(HashMap::new())))
            .executors(Arc::new(ExecutorRegistry::new()))
            .authenticators(Arc::new(AuthenticatorRegistry::new()))
            .engine_store(Arc::new(InMemoryStore::<EngineContext>::new()), Duration::from_secs(600))
            .clients(clients)
            .codes(codes)
            .pending(Arc::new(InMemoryStore::<PendingAuthorizationWire>::new()))
            .denylist(denylist)
            .pki(pki)
            .secrets(secrets)
            .jwks(jwks)
            .guard(guard)
            .issuer("https://issuer.test")
            .default_graph_id("login")
            .build()
            .unwrap();

        assert_eq!(services.discovery.issuer, "https://issuer.test");
        assert_eq!(services.discovery.scopes_supported, vec!["openid", "profile", "email"]);
    }
}
