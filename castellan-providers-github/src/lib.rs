//! GitHub federated-identity provider consumed by the federated authenticator
//! (`castellan-executors::federated::FederatedExecutor`).
//!
//! GitHub's OAuth apps flow is plain OAuth2 (no `id_token`): the subject and
//! email are fetched from the REST API after exchanging the code.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::state::{Identity, OAuthToken};
use castellan_core::OAuthProvider;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";

/// GitHub OAuth2 provider.
pub struct GithubProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    user_url: String,
    emails_url: String,
}

#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GithubProvider {
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
            emails_url: EMAILS_URL.to_string(),
        }
    }

    /// Override the upstream endpoints (used in tests against `wiremock`).
    #[must_use]
    pub fn with_endpoints(mut self, authorize: &str, token: &str, user: &str, emails: &str) -> Self {
        self.authorize_url = authorize.to_string();
        self.token_url = token.to_string();
        self.user_url = user.to_string();
        self.emails_url = emails.to_string();
        self
    }

    async fn primary_verified_email(&self, access_token: &str) -> Option<String> {
        let resp = self
            .http
            .get(&self.emails_url)
            .bearer_auth(access_token)
            .header("User-Agent", "castellan")
            .send()
            .await
            .ok()?;
        let emails: Vec<GithubEmail> = resp.json().await.ok()?;
        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn provider_id(&self) -> &str {
        "github"
    }

    fn get_authorization_url(&self, state: &str, scopes: &[&str], _code_challenge: Option<&str>) -> String {
        let scope = scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&state={}&scope={}",
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
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "github token endpoint returned {}",
                resp.status()
            )));
        }

        let token: GithubTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))?;

        let user_resp = self
            .http
            .get(&self.user_url)
            .bearer_auth(&token.access_token)
            .header("User-Agent", "castellan")
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !user_resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "github user endpoint returned {}",
                user_resp.status()
            )));
        }

        let user: GithubUser = user_resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed user response: {e}")))?;

        let email = match user.email {
            Some(email) => Some(email),
            None => self.primary_verified_email(&token.access_token).await,
        };

        let identity = Identity {
            provider_id: "github".to_string(),
            external_id: user.id.to_string(),
            email,
            username: Some(user.login),
            attributes: HashMap::new(),
        };

        let oauth_token = OAuthToken {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: None,
            refresh_token: None,
            id_token: None,
        };
        let _ = token.scope;

        Ok((identity, oauth_token))
    }
}
