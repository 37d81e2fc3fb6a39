//! HTTP handlers, each a thin translation layer
//! between Axum's extractors and the framework-agnostic services in
//! `castellan-oauth2` / `castellan-oidc`.

use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use castellan_oauth2::authorize::{AuthorizeOutcome, PendingAuthorizationWire};
use castellan_oauth2::dcr::{RegistrationRequest, RegistrationResponse};
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
    State(state): State<CastellanState<S, P, I>>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let outcome = state.authorize.authorize(query.into()).await?;
    Ok(outcome_to_response(outcome))
}

/// Continues a suspended flow. Not part of the standards surface — a flow
/// graph that needs a second turn (an MFA prompt, a federated-IdP
/// callback) has to land somewhere, and a path keyed by the engine's own
/// `flow_id` is the natural place given the engine already serialises
/// per-flow turns by that key.
pub async fn authorize_resume<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    Path(flow_id): Path<String>,
    Form(user_input): Form<HashMap<String, String>>,
) -> Result<Response, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let outcome = state.authorize.resume(&flow_id, user_input).await?;
    Ok(outcome_to_response(outcome))
}

fn outcome_to_response(outcome: AuthorizeOutcome) -> Response {
    match outcome {
        AuthorizeOutcome::Redirect { url } => Redirect::to(&url).into_response(),
        AuthorizeOutcome::Pending(step) => Json(step).into_response(),
    }
}

pub async fn token<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    headers: HeaderMap,
    Form(mut request): Form<TokenRequest>,
) -> Result<Json<castellan_oauth2::token::TokenResponse>, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    apply_basic_auth(&headers, &mut request.client_id, &mut request.client_secret);
    let response = state.token.token(request).await?;
    Ok(Json(response))
}

pub async fn revoke<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    headers: HeaderMap,
    Form(mut request): Form<RevokeRequest>,
) -> Result<StatusCode, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    apply_basic_auth(&headers, &mut request.client_id, &mut request.client_secret);
    state.revoke.revoke(request).await?;
    Ok(StatusCode::OK)
}

pub async fn introspect<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    Form(body): Form<HashMap<String, String>>,
) -> Json<castellan_oidc::IntrospectionResponse>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let token = body.get("token").cloned().unwrap_or_default();
    Json(state.introspection.introspect(&token).await)
}

pub async fn userinfo<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, serde_json::Value>>, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let token = bearer_token(&headers).ok_or(OAuth2Error::InvalidRequest(
        "missing Authorization header".to_string(),
    ))?;
    let claims = state.userinfo.userinfo(token).await?;
    Ok(Json(claims))
}

pub async fn jwks<S, P, I>(State(state): State<CastellanState<S, P, I>>) -> Result<Response, ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let document = jwks_document(&state.pki)?;
    Ok(Json(document).into_response())
}

pub async fn oauth_authorization_server<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
) -> Json<castellan_oidc::ServerMetadata>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    Json(authorization_server_metadata(&state.discovery))
}

pub async fn openid_configuration_handler<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
) -> Json<castellan_oidc::ServerMetadata>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    Json(openid_configuration(&state.discovery))
}

pub async fn register_client<S, P, I>(
    State(state): State<CastellanState<S, P, I>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError>
where
    S: Store<castellan_engine::EngineContext> + LeaseStore,
    P: Store<PendingAuthorizationWire>,
{
    let response = state.registration.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// RFC 6749 §2.3.1: a confidential client may authenticate with HTTP Basic
/// instead of posting `client_id`/`client_secret` in the body. Basic, when
/// present, takes precedence over body fields.
fn apply_basic_auth(headers: &HeaderMap, client_id: &mut Option<String>, client_secret: &mut Option<String>) {
    let Some((id, secret)) = basic_credentials(headers) else {
        return;
    };
    *client_id = Some(id);
    *client_secret = Some(secret);
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut parts = decoded.splitn(2, ':');
    let id = parts.next()?.to_string();
    let secret = parts.next()?.to_string();
    Some((id, secret))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
