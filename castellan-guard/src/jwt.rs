//! Bearer-token validation for the management plane, built directly on
//! `castellan_token::validator`'s offline JWKS-based JWT check rather than
//! duplicating JWKS fetch/cache/decode logic a second time in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::strategy::TokenValidator;
use castellan_token::validator::{validate_jwt, JwksCache};
use serde::{Deserialize, Serialize};

/// The identity recovered from a validated bearer token: just enough to
/// authorize a management-plane request, not a full user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerIdentity {
    pub subject: String,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
}

impl BearerIdentity {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// A [`TokenValidator`] backed by this server's own JWKS. Used to guard
/// endpoints (client registration management, revocation admin APIs) that
/// require a previously issued Castellan access token rather than a fresh
/// login.
pub struct JwtValidator {
    jwks: Arc<JwksCache>,
    issuer: String,
    audience: String,
}

impl JwtValidator {
    #[must_use]
    pub fn new(jwks: Arc<JwksCache>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    type Identity = BearerIdentity;

    async fn validate(&self, token: &str) -> Result<Option<BearerIdentity>, AuthError> {
        match validate_jwt(token, &self.jwks, &self.issuer, &self.audience).await {
            Ok(claims) => {
                let Some(subject) = claims.sub else {
                    return Ok(None);
                };
                let scopes = claims
                    .scope
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                Ok(Some(BearerIdentity {
                    subject,
                    client_id: claims.client_id,
                    scopes,
                }))
            }
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    #[tokio::test]
    async fn malformed_token_validates_to_none_not_an_error() {
        let jwks = Arc::new(
            JwksCache::new("https://idp.example/oauth2/jwks".to_string(), Client::new())
                .with_ttl(Duration::from_secs(60)),
        );
        let validator = JwtValidator::new(jwks, "https://idp.example", "api");
        assert!(validator.validate("not-a-jwt").await.unwrap().is_none());
    }
}
