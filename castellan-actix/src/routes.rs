//! HTTP handlers, each a thin translation layer
//! between Actix-web's extractors and the framework-agnostic services in
//! `castellan-oauth2` / `castellan-oidc`. Mirrors `castellan-axum::routes`
//! endpoint for endpoint.

use std::collections::HashMap;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use castellan_oauth2::authorize::{AuthorizeOutcome, PendingAuthorizationWire};
use castellan_oauth2::dcr::RegistrationRequest;
use castellan_oauth2::revoke::RevokeRequest;
use castellan_oauth2::token::TokenRequest;
use castellan_oauth2::{AuthorizeRequest, OAuth2Error};
use castellan_oidc::{authorization_server_metadata, jwks_document, openid_configuration};
use castellan_store::{LeaseStore, Store};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::CastellanState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
}

impl From<AuthorizeQuery> for AuthorizeRequest {
    fn from(query: AuthorizeQuery) -> Self {
        Self {
            response_type: query.response_type,
            client_id: query.client_id,
            redirect_uri: query.redirect_uri,
            scope: query.scope,
            state: query.state,
            code_challenge: query.code_challenge,
            code_challenge_method: query.code_challenge_method,
            nonce: query.nonce,
        }
    }
}

pub async fn authorize<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    query: web::Query<AuthorizeQuery>,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let outcome = state.authorize.authorize(query.into_inner().into()).await?;
    Ok(outcome_to_response(outcome))
}

/// Continues a suspended flow. Not part of the standards surface, see
/// `castellan-axum::routes::authorize_resume` for the rationale.
pub async fn authorize_resume<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    flow_id: web::Path<String>,
    user_input: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let outcome = state
        .authorize
        .resume(&flow_id.into_inner(), user_input.into_inner())
        .await?;
    Ok(outcome_to_response(outcome))
}

fn outcome_to_response(outcome: AuthorizeOutcome) -> HttpResponse {
    match outcome {
        AuthorizeOutcome::Redirect { url } => HttpResponse::Found()
            .insert_header((header::LOCATION, url))
            .finish(),
        AuthorizeOutcome::Pending(step) => HttpResponse::Ok().json(step),
    }
}

pub async fn token<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    req: HttpRequest,
    form: web::Form<TokenRequest>,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let mut request = form.into_inner();
    apply_basic_auth(&req, &mut request.client_id, &mut request.client_secret);
    let response = state.token.token(request).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn revoke<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    req: HttpRequest,
    form: web::Form<RevokeRequest>,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let mut request = form.into_inner();
    apply_basic_auth(&req, &mut request.client_id, &mut request.client_secret);
    state.revoke.revoke(request).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn introspect<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    form: web::Form<HashMap<String, String>>,
) -> HttpResponse
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let token = form.get("token").cloned().unwrap_or_default();
    HttpResponse::Ok().json(state.introspection.introspect(&token).await)
}

pub async fn userinfo<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let token = bearer_token(&req).ok_or(OAuth2Error::InvalidRequest(
        "missing Authorization header".to_string(),
    ))?;
    let claims = state.userinfo.userinfo(token).await?;
    Ok(HttpResponse::Ok().json(claims))
}

pub async fn jwks<S, P, I>(state: web::Data<CastellanState<S, P, I>>) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let document = jwks_document(&state.pki)?;
    Ok(HttpResponse::Ok().json(document))
}

pub async fn oauth_authorization_server<S, P, I>(state: web::Data<CastellanState<S, P, I>>) -> HttpResponse
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    HttpResponse::Ok().json(authorization_server_metadata(&state.discovery))
}

pub async fn openid_configuration_handler<S, P, I>(state: web::Data<CastellanState<S, P, I>>) -> HttpResponse
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    HttpResponse::Ok().json(openid_configuration(&state.discovery))
}

pub async fn register_client<S, P, I>(
    state: web::Data<CastellanState<S, P, I>>,
    body: web::Json<RegistrationRequest>,
) -> Result<HttpResponse, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let response = state.registration.register(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// RFC 6749 §2.3.1: a confidential client may authenticate with HTTP Basic
/// instead of posting `client_id`/`client_secret` in the body. Basic, when
/// present, takes precedence over body fields.
fn apply_basic_auth(req: &HttpRequest, client_id: &mut Option<String>, client_secret: &mut Option<String>) {
    let Some((id, secret)) = basic_credentials(req) else {
        return;
    };
    *client_id = Some(id);
    *client_secret = Some(secret);
}

fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut parts = decoded.splitn(2, ':');
    let id = parts.next()?.to_string();
    let secret = parts.next()?.to_string();
    Some((id, secret))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
