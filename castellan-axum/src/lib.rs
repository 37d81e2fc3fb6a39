//! Axum HTTP surface for the Castellan identity provider: the 8 endpoints
//! plus a guarded management-plane health check, all thin
//! translations onto the framework-agnostic `castellan-oauth2` /
//! `castellan-oidc` services bundled in [`state::CastellanState`].

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use castellan_guard::Authenticator;
use castellan_oauth2::authorize::PendingAuthorizationWire;
use castellan_store::{LeaseStore, Store};
use serde::Serialize;

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::CastellanState;

/// An extractor requiring a valid bearer token against this server's own
/// JWKS, used to guard the management-plane endpoints this crate adds
/// beyond the standards surface (health, client-registration inspection).
/// Deliberately distinct from the OAuth2/OIDC endpoints above, which are
/// either unauthenticated (discovery, JWKS) or authenticate via their own
/// grant-specific mechanism (PKCE, client secret).
pub struct Guard<I>(pub I);

impl<S, I> FromRequestParts<S> for Guard<I>
where
    S: Send + Sync,
    Arc<Authenticator<I>>: FromRef<S>,
    I: Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator<I>>::from_ref(state);
        match authenticator.authenticate(parts).await {
            Ok(Some(identity)) => Ok(Guard(identity)),
            Ok(None) => Err(ApiError::Unauthorized),
            Err(e) => Err(ApiError::Internal(e.to_string())),
        }
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health<I>(Guard(_identity): Guard<I>) -> Json<HealthBody>
where
    I: Send + Sync + 'static,
{
    Json(HealthBody { status: "ok" })
}

/// Assembles the HTTP surface onto `CastellanState`. `/admin/health`
/// is the one addition beyond the standards surface: guarded by
/// `castellan-guard`'s `Authenticator` so a deployment can point a liveness
/// probe at it without exposing it to the public internet.
pub fn router<S, P, I>() -> Router<CastellanState<S, P, I>>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore + Send + Sync + 'static,
    P: Store<PendingAuthorizationWire> + Send + Sync + 'static,
    I: Send + Sync + 'static,
    Arc<Authenticator<I>>: FromRef<CastellanState<S, P, I>>,
{
    Router::new()
        .route(
            "/oauth2/authorize",
            get(routes::authorize::<S, P, I>).post(routes::authorize::<S, P, I>),
        )
        .route("/oauth2/authorize/{flow_id}", post(routes::authorize_resume::<S, P, I>))
        .route("/oauth2/token", post(routes::token::<S, P, I>))
        .route("/oauth2/revoke", post(routes::revoke::<S, P, I>))
        .route("/oauth2/introspect", post(routes::introspect::<S, P, I>))
        .route(
            "/oauth2/userinfo",
            get(routes::userinfo::<S, P, I>).post(routes::userinfo::<S, P, I>),
        )
        .route("/oauth2/jwks", get(routes::jwks::<S, P, I>))
        .route("/oauth2/dcr/register", post(routes::register_client::<S, P, I>))
        .route(
            "/.well-known/oauth-authorization-server",
            get(routes::oauth_authorization_server::<S, P, I>),
        )
        .route(
            "/.well-known/openid-configuration",
            get(routes::openid_configuration_handler::<S, P, I>),
        )
        .route("/admin/health", get(health::<I>))
        .fallback(not_found)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}
