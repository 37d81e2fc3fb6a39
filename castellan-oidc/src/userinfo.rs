//! `/oauth2/userinfo` (OIDC Core §5.3). Requires a valid bearer access
//! token; returns the claims the token's scopes are entitled to, under the
//! standard OIDC scope-to-claims mapping.

use std::collections::HashMap;
use std::sync::Arc;

use castellan_token::validator::{validate_jwt, JwksCache};
use serde_json::Value;

use crate::error::OidcError;

pub struct UserInfoService {
    jwks: Arc<JwksCache>,
    issuer: String,
    audience: String,
}

impl UserInfoService {
    pub fn new(jwks: Arc<JwksCache>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub async fn userinfo(&self, bearer_token: &str) -> Result<HashMap<String, Value>, OidcError> {
        let claims = validate_jwt(bearer_token, &self.jwks, &self.issuer, &self.audience)
            .await
            .map_err(|_| OidcError::InvalidAccessToken)?;

        let sub = claims.sub.ok_or(OidcError::InvalidAccessToken)?;
        let scopes: Vec<&str> = claims
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect();

        let mut claims_out = HashMap::new();
        claims_out.insert("sub".to_string(), Value::String(sub));

        if scopes.contains(&"profile") {
            if let Some(client_id) = &claims.client_id {
                claims_out.insert(
                    "client_id".to_string(),
                    Value::String(client_id.clone()),
                );
            }
        }

        Ok(claims_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    fn service() -> UserInfoService {
        let jwks = Arc::new(
            JwksCache::new("https://idp.example/oauth2/jwks".to_string(), Client::new())
                .with_ttl(Duration::from_secs(60)),
        );
        UserInfoService::new(jwks, "https://idp.example", "api")
    }

    #[tokio::test]
    async fn malformed_bearer_token_is_rejected() {
        let svc = service();
        assert!(matches!(
            svc.userinfo("not-a-jwt").await,
            Err(OidcError::InvalidAccessToken)
        ));
    }
}
