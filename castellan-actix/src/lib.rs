//! Actix-web HTTP surface for the Castellan identity provider: the same 8
//! endpoints as `castellan-axum`, plus a guarded
//! management-plane health check, as a thin translation onto the
//! framework-agnostic `castellan-oauth2` / `castellan-oidc` services bundled
//! in [`state::CastellanState`]. No business logic is duplicated here or in
//! `castellan-axum` — both crates only adapt the same services to their
//! respective frameworks.

use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
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
pub struct Guard<I>(pub I);

impl<S, P, I> FromRequest for Guard<I>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore + 'static,
    P: Store<PendingAuthorizationWire> + 'static,
    I: Send + Sync + 'static,
{
    type Error = ApiError;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<CastellanState<S, P, I>>>().cloned();
        let parts = to_request_parts(req);
        Box::pin(async move {
            let state = state.ok_or_else(|| ApiError::Internal("missing CastellanState app_data".to_string()))?;
            match state.guard.authenticate(&parts).await {
                Ok(Some(identity)) => Ok(Guard(identity)),
                Ok(None) => Err(ApiError::Unauthorized),
                Err(e) => Err(ApiError::Internal(e.to_string())),
            }
        })
    }
}

/// Builds the `http::request::Parts` that `castellan-guard`'s framework-agnostic
/// `Authenticator` expects out of an Actix-web request, which carries its own
/// header/method/uri types.
fn to_request_parts(req: &HttpRequest) -> http::request::Parts {
    let mut builder = http::Request::builder().method(req.method().as_str()).uri(req.uri().to_string());
    for (name, value) in req.headers().iter() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    builder
        .body(())
        .expect("method/uri/headers copied from a valid actix_web::HttpRequest")
        .into_parts()
        .0
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health<S, P, I>(_guard: Guard<I>) -> HttpResponse
where
    S: Store<castellan_engine::EngineContext> + LeaseStore + 'static,
    P: Store<PendingAuthorizationWire> + 'static,
    I: Send + Sync + 'static,
{
    HttpResponse::Ok().json(HealthBody { status: "ok" })
}

/// Registers the HTTP surface onto an Actix-web `ServiceConfig`.
/// `/admin/health` is the one addition beyond the standards surface: guarded
/// by `castellan-guard`'s `Authenticator` so a deployment can point a
/// liveness probe at it without exposing it to the public internet.
///
/// Expects `CastellanState<S, P, I>` to already be registered as
/// `web::Data` on the `App` (via `.app_data(web::Data::new(state))`).
pub fn configure<S, P, I>(cfg: &mut web::ServiceConfig)
where
    S: Store<castellan_engine::EngineContext> + LeaseStore + Send + Sync + 'static,
    P: Store<PendingAuthorizationWire> + Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    cfg.route("/oauth2/authorize", web::get().to(routes::authorize::<S, P, I>))
        .route("/oauth2/authorize", web::post().to(routes::authorize::<S, P, I>))
        .route(
            "/oauth2/authorize/{flow_id}",
            web::post().to(routes::authorize_resume::<S, P, I>),
        )
        .route("/oauth2/token", web::post().to(routes::token::<S, P, I>))
        .route("/oauth2/revoke", web::post().to(routes::revoke::<S, P, I>))
        .route("/oauth2/introspect", web::post().to(routes::introspect::<S, P, I>))
        .route("/oauth2/userinfo", web::get().to(routes::userinfo::<S, P, I>))
        .route("/oauth2/userinfo", web::post().to(routes::userinfo::<S, P, I>))
        .route("/oauth2/jwks", web::get().to(routes::jwks::<S, P, I>))
        .route(
            "/oauth2/dcr/register",
            web::post().to(routes::register_client::<S, P, I>),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            web::get().to(routes::oauth_authorization_server::<S, P, I>),
        )
        .route(
            "/.well-known/openid-configuration",
            web::get().to(routes::openid_configuration_handler::<S, P, I>),
        )
        .route("/admin/health", web::get().to(health::<S, P, I>));
}
