//! Discord federated-identity provider consumed by the federated
//! authenticator (`castellan-executors::federated::FederatedExecutor`).
//!
//! Discord's OAuth2 is plain (non-OIDC): the subject and email come from
//! `/users/@me` after the code exchange.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::state::{Identity, OAuthToken};
use castellan_core::OAuthProvider;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const USER_URL: &str = "https://discord.com/api/users/@me";

/// Discord OAuth2 provider.
pub struct DiscordProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    user_url: String,
}

#[derive(Debug, Deserialize)]
struct DiscordTokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    discriminator: Option<String>,
    email: Option<String>,
    #[serde(default)]
    verified: bool,
}

impl DiscordProvider {
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http: reqwest::Client::new(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            user_url: USER_URL.to_string(),
        }
    }

    /// Override the upstream endpoints (used in tests against `wiremock`).
    #[must_use]
    pub fn with_endpoints(mut self, authorize: &str, token: &str, user: &str) -> Self {
        self.authorize_url = authorize.to_string();
        self.token_url = token.to_string();
        self.user_url = user.to_string();
        self
    }
}

#[async_trait]
impl OAuthProvider for DiscordProvider {
    fn provider_id(&self) -> &str {
        "discord"
    }

    fn get_authorization_url(&self, state: &str, scopes: &[&str], _code_challenge: Option<&str>) -> String {
        let scope = if scopes.is_empty() {
            "identify email".to_string()
        } else {
            scopes.join(" ")
        };
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}&scope={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(&scope),
        )
    }

    async fn exchange_code_for_identity(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<(Identity, OAuthToken), AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "discord token endpoint returned {}",
                resp.status()
            )));
        }

        let token: DiscordTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))?;

        let user_resp = self
            .http
            .get(&self.user_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !user_resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "discord user endpoint returned {}",
                user_resp.status()
            )));
        }

        let user: DiscordUser = user_resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed user response: {e}")))?;

        let mut attributes = HashMap::new();
        if let Some(discriminator) = user.discriminator {
            attributes.insert("discriminator".to_string(), discriminator);
        }

        let identity = Identity {
            provider_id: "discord".to_string(),
            external_id: user.id,
            email: user.verified.then_some(user.email).flatten(),
            username: Some(user.username),
            attributes,
        };

        let oauth_token = OAuthToken {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
            id_token: None,
        };

        Ok((identity, oauth_token))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthToken, AuthError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "discord token endpoint returned {}",
                resp.status()
            )));
        }
        let token: DiscordTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))?;
        Ok(OAuthToken {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.or_else(|| Some(refresh_token.to_string())),
            id_token: None,
        })
    }
}
