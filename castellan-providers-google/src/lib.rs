//! Google federated-identity provider consumed by the federated
//! authenticator (`castellan-executors::federated::FederatedExecutor`).
//!
//! Google speaks full OIDC: the token response carries an `id_token` whose
//! signature and standard claims (`iss`, `aud`, `exp`) are validated
//! against Google's published JWKS before the subject is trusted; the
//! `userinfo` endpoint is only consulted when the id_token is absent.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::state::{Identity, OAuthToken};
use castellan_core::OAuthProvider;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Google OIDC provider.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    jwks_url: String,
    userinfo_url: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserinfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDoc {
    keys: Vec<JwksKey>,
}

#[derive(Debug, Deserialize)]
struct JwksKey {
    kid: String,
    n: String,
    e: String,
}

impl GoogleProvider {
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            http: reqwest::Client::new(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            jwks_url: JWKS_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Override the upstream endpoints (used in tests against `wiremock`).
    #[must_use]
    pub fn with_endpoints(mut self, authorize: &str, token: &str, jwks: &str, userinfo: &str) -> Self {
        self.authorize_url = authorize.to_string();
        self.token_url = token.to_string();
        self.jwks_url = jwks.to_string();
        self.userinfo_url = userinfo.to_string();
        self
    }

    async fn fetch_decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let doc: JwksDoc = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed google jwks: {e}")))?;
        let key = doc
            .keys
            .into_iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| AuthError::Provider(format!("no google jwk for kid {kid}")))?;
        DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| AuthError::Provider(format!("invalid google jwk: {e}")))
    }

    fn validate_claims(&self, claims: &GoogleIdClaims) -> Result<(), AuthError> {
        if !ISSUERS.contains(&claims.iss.as_str()) {
            return Err(AuthError::Provider(format!(
                "unexpected id_token issuer {}",
                claims.iss
            )));
        }
        if claims.aud != self.client_id {
            return Err(AuthError::Provider("id_token audience mismatch".to_string()));
        }
        Ok(())
    }

    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdClaims, AuthError> {
        let header = decode_header(id_token)
            .map_err(|e| AuthError::Provider(format!("malformed id_token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Provider("id_token missing kid".to_string()))?;
        let key = self.fetch_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&ISSUERS);

        let data = decode::<GoogleIdClaims>(id_token, &key, &validation)
            .map_err(|e| AuthError::Provider(format!("id_token validation failed: {e}")))?;
        self.validate_claims(&data.claims)?;
        Ok(data.claims)
    }

    async fn userinfo(&self, access_token: &str) -> Result<GoogleUserinfo, AuthError> {
        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "google userinfo endpoint returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed userinfo response: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn get_authorization_url(&self, state: &str, scopes: &[&str], code_challenge: Option<&str>) -> String {
        let scope = if scopes.is_empty() {
            "openid email profile".to_string()
        } else {
            scopes.join(" ")
        };
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}&scope={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(&scope),
        );
        if let Some(challenge) = code_challenge {
            url.push_str("&code_challenge=");
            url.push_str(&urlencoding::encode(challenge));
            url.push_str("&code_challenge_method=S256");
        }
        url
    }

    async fn exchange_code_for_identity(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<(Identity, OAuthToken), AuthError> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AuthError::Provider(format!(
                "google token endpoint returned {}",
                resp.status()
            )));
        }

        let token: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))?;

        let (external_id, email, name) = if let Some(id_token) = &token.id_token {
            let claims = self.verify_id_token(id_token).await?;
            (
                claims.sub,
                claims.email_verified.then_some(claims.email).flatten(),
                claims.name,
            )
        } else {
            let info = self.userinfo(&token.access_token).await?;
            (info.sub, info.email, info.name)
        };

        let mut attributes = HashMap::new();
        if let Some(name) = name {
            attributes.insert("name".to_string(), name);
        }

        let identity = Identity {
            provider_id: "google".to_string(),
            external_id,
            email,
            username: None,
            attributes,
        };

        let oauth_token = OAuthToken {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
            id_token: token.id_token,
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
                "google token endpoint returned {}",
                resp.status()
            )));
        }
        let token: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("malformed token response: {e}")))?;
        Ok(OAuthToken {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.or_else(|| Some(refresh_token.to_string())),
            id_token: token.id_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoogleProvider {
        GoogleProvider::new(
            "client-id".into(),
            "client-secret".into(),
            "https://rp.example/callback".into(),
        )
        .with_endpoints(
            AUTHORIZE_URL,
            &format!("{}/token", server.uri()),
            &format!("{}/certs", server.uri()),
            &format!("{}/userinfo", server.uri()),
        )
    }

    #[test]
    fn authorize_url_defaults_scopes_and_carries_pkce() {
        let p = GoogleProvider::new("cid".into(), "secret".into(), "https://rp/cb".into());
        let url = p.get_authorization_url("xyz", &[], Some("challenge123"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("code_challenge=challenge123"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn validate_claims_accepts_either_google_issuer_form() {
        let p = GoogleProvider::new("client-id".into(), "secret".into(), "https://rp/cb".into());
        for iss in ISSUERS {
            let claims = GoogleIdClaims {
                iss: iss.to_string(),
                aud: "client-id".to_string(),
                sub: "123".to_string(),
                email: None,
                email_verified: false,
                name: None,
            };
            assert!(p.validate_claims(&claims).is_ok());
        }
    }

    #[test]
    fn validate_claims_rejects_audience_mismatch() {
        let p = GoogleProvider::new("client-id".into(), "secret".into(), "https://rp/cb".into());
        let claims = GoogleIdClaims {
            iss: "https://accounts.google.com".to_string(),
            aud: "someone-else".to_string(),
            sub: "123".to_string(),
            email: None,
            email_verified: false,
            name: None,
        };
        let err = p.validate_claims(&claims).unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[test]
    fn validate_claims_rejects_unexpected_issuer() {
        let p = GoogleProvider::new("client-id".into(), "secret".into(), "https://rp/cb".into());
        let claims = GoogleIdClaims {
            iss: "https://evil.example".to_string(),
            aud: "client-id".to_string(),
            sub: "123".to_string(),
            email: None,
            email_verified: false,
            name: None,
        };
        let err = p.validate_claims(&claims).unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }

    #[tokio::test]
    async fn exchange_falls_back_to_userinfo_when_no_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gg-token",
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "10769150350006150715113082367",
                "email": "user@example.com",
                "name": "Example User",
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let (identity, token) = p.exchange_code_for_identity("abc", Some("verifier")).await.unwrap();
        assert_eq!(identity.external_id, "10769150350006150715113082367");
        assert_eq!(identity.email.as_deref(), Some("user@example.com"));
        assert_eq!(token.access_token, "gg-token");
    }

    #[tokio::test]
    async fn exchange_surfaces_provider_error_on_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let p = provider(&server);
        let err = p.exchange_code_for_identity("bad", None).await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }
}
