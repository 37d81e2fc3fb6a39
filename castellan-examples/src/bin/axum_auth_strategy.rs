//! Demonstrates chaining a custom header strategy in front of Basic auth
//! using `castellan_core::strategy` and exposing the result through
//! `castellan_axum::Guard`.

use async_trait::async_trait;
use axum::extract::FromRef;
use axum::http::request::Parts;
use axum::{routing::get, Router};
use castellan_axum::Guard;
use castellan_core::error::AuthError;
use castellan_core::strategy::{AuthPolicy, AuthenticationStrategy, Authenticator, BasicAuthenticator, BasicStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// Looks for an `X-API-Key` header and validates it against a fixed value.
pub struct ApiKeyStrategy {
    api_key: String,
}

impl ApiKeyStrategy {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into() }
    }
}

#[async_trait]
impl AuthenticationStrategy<User> for ApiKeyStrategy {
    async fn authenticate(&self, parts: &Parts) -> Result<Option<User>, AuthError> {
        let Some(value) = parts.headers.get("X-API-Key") else {
            return Ok(None);
        };
        let Ok(value_str) = value.to_str() else {
            return Ok(None);
        };
        if value_str == self.api_key {
            Ok(Some(User {
                id: "1".to_string(),
                username: "api_user".to_string(),
            }))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

pub struct FixedBasicAuthenticator;

#[async_trait]
impl BasicAuthenticator for FixedBasicAuthenticator {
    type Identity = User;

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Self::Identity>, AuthError> {
        if username == "admin" && password == "password" {
            Ok(Some(User {
                id: "2".to_string(),
                username: "admin".to_string(),
            }))
        } else {
            Ok(None)
        }
    }
}

#[derive(Clone)]
struct AppState {
    authenticator: Arc<Authenticator<User>>,
}

impl FromRef<AppState> for Arc<Authenticator<User>> {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

async fn protected_route(Guard(user): Guard<User>) -> String {
    format!("Hello, {}! Your ID is {}.", user.username, user.id)
}

fn app(authenticator: Arc<Authenticator<User>>) -> Router {
    Router::new()
        .route("/protected", get(protected_route))
        .with_state(AppState { authenticator })
}

fn build_authenticator() -> Arc<Authenticator<User>> {
    Arc::new(
        Authenticator::builder()
            .with_strategy(ApiKeyStrategy::new("secret-api-key"))
            .with_strategy(BasicStrategy::new(FixedBasicAuthenticator))
            .policy(AuthPolicy::FirstSuccess)
            .build(),
    )
}

#[tokio::main]
async fn main() {
    let app = app(build_authenticator());
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    println!("Listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use tower::ServiceExt;

    #[tokio::test]
    async fn accepts_a_valid_api_key() {
        let response = app(build_authenticator())
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("X-API-Key", "secret-api-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn falls_back_to_basic_auth_when_no_api_key_is_sent() {
        let auth = base64::engine::general_purpose::STANDARD.encode("admin:password");
        let response = app(build_authenticator())
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Authorization", format!("Basic {auth}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_a_wrong_api_key_without_trying_basic_auth() {
        let response = app(build_authenticator())
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("X-API-Key", "wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn rejects_missing_credentials() {
        let response = app(build_authenticator())
            .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
