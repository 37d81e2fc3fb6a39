//! OIDC discovery-document fetching for federated providers.
//!
//! This is the *client*-side counterpart of `castellan-oidc`'s discovery
//! document (which this server publishes about itself). Federated
//! authenticators use this to resolve an upstream IdP's `jwks_uri` and
//! `token_endpoint` from its issuer URL.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};

/// The subset of RFC 8414 / OIDC Discovery metadata the federated
/// authenticator needs from an upstream IdP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub userinfo_endpoint: Option<String>,
}

impl ProviderMetadata {
    /// Fetch `{issuer}/.well-known/openid-configuration` and parse it.
    pub async fn discover(
        issuer_url: &str,
        client: &reqwest::Client,
    ) -> Result<Self, AuthError> {
        let issuer_url = issuer_url.trim_end_matches('/');
        let url = format!("{issuer_url}/.well-known/openid-configuration");
        let metadata = client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Network(e.to_string()))?
            .json::<Self>()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid discovery document: {e}")))?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn discover_parses_the_configuration_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "jwks_uri": format!("{}/jwks", server.uri()),
                "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let metadata = ProviderMetadata::discover(&server.uri(), &client).await.unwrap();
        assert_eq!(metadata.issuer, server.uri());
        assert_eq!(metadata.jwks_uri, format!("{}/jwks", server.uri()));
        assert_eq!(metadata.userinfo_endpoint.as_deref(), Some(format!("{}/userinfo", server.uri())).as_deref());
    }

    #[tokio::test]
    async fn discover_strips_a_trailing_slash_from_the_issuer_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "jwks_uri": format!("{}/jwks", server.uri()),
                "userinfo_endpoint": serde_json::Value::Null,
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let issuer_with_slash = format!("{}/", server.uri());
        let metadata = ProviderMetadata::discover(&issuer_with_slash, &client).await.unwrap();
        assert_eq!(metadata.issuer, server.uri());
        assert!(metadata.userinfo_endpoint.is_none());
    }

    #[tokio::test]
    async fn discover_surfaces_a_network_error_on_a_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = ProviderMetadata::discover(&server.uri(), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
    }

    #[tokio::test]
    async fn discover_surfaces_a_provider_error_on_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = ProviderMetadata::discover(&server.uri(), &client).await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }
}
