//! `/oauth2/introspect` (RFC 7662). Never leaks the reason a token failed
//! validation — any failure collapses to `{"active": false}`.

use std::sync::Arc;

use castellan_token::validator::{validate_jwt, JwksCache};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "token_type")]
    pub token_type: Option<&'static str>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            sub: None,
            aud: None,
            exp: None,
            iat: None,
            scope: None,
            client_id: None,
            token_type: None,
        }
    }
}

pub struct IntrospectionService {
    jwks: Arc<JwksCache>,
    issuer: String,
    audience: String,
}

impl IntrospectionService {
    pub fn new(jwks: Arc<JwksCache>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Always `Ok`: an introspection endpoint is not allowed to surface
    /// validation failures as errors, only as `{"active": false}`.
    pub async fn introspect(&self, token: &str) -> IntrospectionResponse {
        match validate_jwt(token, &self.jwks, &self.issuer, &self.audience).await {
            Ok(claims) => IntrospectionResponse {
                active: true,
                sub: claims.sub,
                aud: claims.aud,
                exp: claims.exp,
                iat: claims.iat,
                scope: claims.scope,
                client_id: claims.client_id,
                token_type: Some("Bearer"),
            },
            Err(_) => IntrospectionResponse::inactive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    fn service() -> IntrospectionService {
        let jwks = Arc::new(
            JwksCache::new("https://idp.example/oauth2/jwks".to_string(), Client::new())
                .with_ttl(Duration::from_secs(60)),
        );
        IntrospectionService::new(jwks, "https://idp.example", "api")
    }

    #[tokio::test]
    async fn garbage_input_is_inactive_not_an_error() {
        let svc = service();
        let response = svc.introspect("not-a-jwt").await;
        assert!(!response.active);
        assert!(response.sub.is_none());
    }
}
