//! The Axum application state bundling every service the HTTP surface
//! dispatches to. Deliberately generic over the flow-engine and
//! pending-authorization store backends so a deployment can choose
//! in-memory, Redis, or SQL storage without this crate caring.

use std::sync::Arc;

use castellan_crypto::PkiProvider;
use castellan_guard::Authenticator;
use castellan_oauth2::authorize::PendingAuthorizationWire;
use castellan_oauth2::{AuthorizationService, RegistrationService, RevocationService, TokenService};
use castellan_oidc::{DiscoveryConfig, IntrospectionService, UserInfoService};
use castellan_store::{LeaseStore, Store};

pub struct CastellanState<S, P, I> {
    pub authorize: Arc<AuthorizationService<S, P>>,
    pub token: Arc<TokenService>,
    pub revoke: Arc<RevocationService>,
    pub registration: Arc<RegistrationService>,
    pub introspection: Arc<IntrospectionService>,
    pub userinfo: Arc<UserInfoService>,
    pub discovery: Arc<DiscoveryConfig>,
    pub pki: Arc<dyn PkiProvider>,
    /// Guards the management-plane endpoints this crate adds beyond the
    /// standards surface (currently `/admin/health`).
    pub guard: Arc<Authenticator<I>>,
}

impl<S, P, I> Clone for CastellanState<S, P, I>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
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

impl<S, P, I> axum::extract::FromRef<CastellanState<S, P, I>> for Arc<Authenticator<I>>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    fn from_ref(state: &CastellanState<S, P, I>) -> Self {
        state.guard.clone()
    }
}
