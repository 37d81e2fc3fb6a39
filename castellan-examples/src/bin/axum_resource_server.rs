//! A resource server that protects its endpoints with a bearer token
//! validated offline against an external OIDC provider's JWKS, using
//! `castellan_guard::JwtValidator` through the same `Authenticator` chain
//! and `castellan_axum::Guard` extractor the provider's own admin plane
//! uses against itself.

use axum::extract::FromRef;
use axum::{response::IntoResponse, routing::get, Router};
use castellan_axum::Guard;
use castellan_core::strategy::{AuthPolicy, Authenticator, TokenStrategy};
use castellan_guard::{BearerIdentity, JwtValidator};
use castellan_token::validator::JwksCache;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    authenticator: Arc<Authenticator<BearerIdentity>>,
}

impl FromRef<AppState> for Arc<Authenticator<BearerIdentity>> {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

struct Config {
    issuer: String,
    audience: String,
    jwks_uri: String,
    port: u16,
}

impl Config {
    fn from_env() -> Self {
        let issuer = std::env::var("OIDC_ISSUER").unwrap_or_else(|_| "https://accounts.google.com".to_string());
        Self {
            jwks_uri: std::env::var("OIDC_JWKS_URI").unwrap_or_else(|_| format!("{issuer}/.well-known/jwks.json")),
            issuer,
            audience: std::env::var("OIDC_AUDIENCE").unwrap_or_else(|_| "resource-server".to_string()),
            port: std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    println!("validating bearer tokens issued by {} against {}", config.issuer, config.jwks_uri);

    let jwks = Arc::new(JwksCache::new(config.jwks_uri, reqwest::Client::new()));
    let validator = JwtValidator::new(jwks, config.issuer, config.audience);
    let authenticator = Arc::new(
        Authenticator::builder()
            .with_strategy(TokenStrategy::new(validator))
            .policy(AuthPolicy::FirstSuccess)
            .build(),
    );

    let app = Router::new()
        .route("/", get(index))
        .route("/api/protected", get(protected))
        .with_state(AppState { authenticator });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> impl IntoResponse {
    "resource server - send a Bearer token to /api/protected"
}

async fn protected(Guard(identity): Guard<BearerIdentity>) -> impl IntoResponse {
    let scope_msg = if identity.scopes.is_empty() {
        String::new()
    } else {
        format!(" scopes: {}", identity.scopes.join(" "))
    };
    format!(
        "hello, {}! client_id={:?}.{} you have access to this protected resource.",
        identity.subject, identity.client_id, scope_msg
    )
}
