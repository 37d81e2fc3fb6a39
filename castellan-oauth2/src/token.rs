//! `/oauth2/token` (RFC 6749 §4): grant dispatch for `authorization_code`,
//! `client_credentials`, `refresh_token`, and RFC 8693 token exchange.

use std::sync::Arc;

use castellan_core::pkce;
use castellan_crypto::{EncryptionService, PkiProvider};
use castellan_store::Store;
use castellan_token::validator::Claims;
use castellan_token::TokenIssuer;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};

use crate::client::{GrantType, OAuth2Client, TokenEndpointAuthMethod};
use crate::code::AuthorizationCode;
use crate::error::OAuth2Error;
use crate::repository::ClientRepository;

/// RFC 8693's fixed subject-token-type URN; the only one this server
/// accepts, since the only tokens it can introspect offline are its own.
const ACCESS_TOKEN_TYPE_URN: &str = "urn:ietf:params:oauth:token-type:access_token";

/// A parsed `/oauth2/token` request body, independent of `grant_type`
/// (unused fields for a given grant are simply ignored by its handler).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub subject_token: Option<String>,
    pub subject_token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub scope: String,
    #[serde(rename = "issued_token_type", skip_serializing_if = "Option::is_none")]
    pub issued_token_type: Option<&'static str>,
}

pub struct TokenService {
    clients: Arc<dyn ClientRepository>,
    codes: Arc<dyn Store<AuthorizationCode>>,
    issuer: Arc<TokenIssuer>,
    pki: Arc<dyn PkiProvider>,
    secrets: Arc<EncryptionService>,
    token_issuer_url: String,
    default_audience: String,
}

impl TokenService {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        codes: Arc<dyn Store<AuthorizationCode>>,
        issuer: Arc<TokenIssuer>,
        pki: Arc<dyn PkiProvider>,
        secrets: Arc<EncryptionService>,
        token_issuer_url: impl Into<String>,
        default_audience: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            codes,
            issuer,
            pki,
            secrets,
            token_issuer_url: token_issuer_url.into(),
            default_audience: default_audience.into(),
        }
    }

    pub async fn token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let grant = GrantType::parse(&request.grant_type)
            .ok_or_else(|| OAuth2Error::UnsupportedGrantType(request.grant_type.clone()))?;

        match grant {
            GrantType::AuthorizationCode => self.authorization_code_grant(request).await,
            GrantType::ClientCredentials => self.client_credentials_grant(request).await,
            GrantType::RefreshToken => self.refresh_token_grant(request).await,
            GrantType::TokenExchange => self.token_exchange_grant(request).await,
        }
    }

    async fn authenticated_client(&self, request: &TokenRequest) -> Result<OAuth2Client, OAuth2Error> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or_else(|| OAuth2Error::InvalidClient("client_id is required".to_string()))?;
        let client = self
            .clients
            .find(client_id)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidClient("unknown client_id".to_string()))?;

        match client.token_endpoint_auth_method {
            TokenEndpointAuthMethod::None => Ok(client),
            TokenEndpointAuthMethod::ClientSecretBasic | TokenEndpointAuthMethod::ClientSecretPost => {
                let presented = request
                    .client_secret
                    .as_deref()
                    .ok_or_else(|| OAuth2Error::InvalidClient("client_secret is required".to_string()))?;
                let envelope_json = client
                    .hashed_client_secret
                    .as_deref()
                    .ok_or_else(|| OAuth2Error::InvalidClient("client has no registered secret".to_string()))?;
                let envelope = serde_json::from_str(envelope_json).map_err(|_| {
                    OAuth2Error::ServerError("stored client secret envelope is malformed".to_string())
                })?;
                let expected = self
                    .secrets
                    .decrypt(&envelope)
                    .map_err(|_| OAuth2Error::InvalidClient("client secret verification failed".to_string()))?;
                if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
                    return Err(OAuth2Error::InvalidClient(
                        "client secret verification failed".to_string(),
                    ));
                }
                Ok(client)
            }
        }
    }

    async fn authorization_code_grant(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticated_client(&request).await?;
        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed the authorization_code grant".to_string(),
            ));
        }

        let code_value = request
            .code
            .ok_or_else(|| OAuth2Error::InvalidRequest("code is required".to_string()))?;
        let code = self
            .codes
            .take(&code_value)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidGrant("unknown or already-redeemed code".to_string()))?;

        if code.client_id != client.client_id {
            return Err(OAuth2Error::InvalidGrant(
                "authorization code was not issued to this client".to_string(),
            ));
        }
        match &request.redirect_uri {
            Some(uri) if *uri == code.redirect_uri => {}
            _ => {
                return Err(OAuth2Error::InvalidGrant(
                    "redirect_uri does not match the one used at /oauth2/authorize".to_string(),
                ))
            }
        }

        match code.code_challenge_method {
            Some(method) => {
                let verifier = request.code_verifier.ok_or_else(|| {
                    OAuth2Error::InvalidRequest("code_verifier is required".to_string())
                })?;
                let challenge = code.code_challenge.as_deref().unwrap_or_default();
                pkce::verify(method, &verifier, challenge)?;
            }
            None if client.require_pkce => {
                return Err(OAuth2Error::InvalidGrant(
                    "this client must present PKCE at redemption".to_string(),
                ));
            }
            None => {}
        }

        let scope = code.scopes.join(" ");
        let (access_token, _claims) = self.issuer.issue_access_token(
            &code.subject,
            &self.default_audience,
            &client.client_id,
            &scope,
            None,
        )?;
        let (refresh_token, _) = self
            .issuer
            .issue_refresh_token(&code.subject, &self.default_audience, &client.client_id, &scope)?;

        let id_token = if code.scopes.iter().any(|s| s == "openid") {
            Some(self.issuer.issue_id_token(
                &code.subject,
                &client.client_id,
                code.auth_time,
                code.nonce.clone(),
                code.assurance.aal.wire(),
                None,
            )?)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: Some(refresh_token),
            id_token,
            scope,
            issued_token_type: None,
        })
    }

    async fn client_credentials_grant(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticated_client(&request).await?;
        if client.is_public() {
            return Err(OAuth2Error::UnauthorizedClient(
                "public clients may not use client_credentials".to_string(),
            ));
        }
        if !client.allows_grant(GrantType::ClientCredentials) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed the client_credentials grant".to_string(),
            ));
        }

        let scope = requested_scope(&request.scope, &client.scopes)?;
        let (access_token, _claims) = self.issuer.issue_access_token(
            &client.client_id,
            &self.default_audience,
            &client.client_id,
            &scope,
            None,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: None,
            id_token: None,
            scope,
            issued_token_type: None,
        })
    }

    async fn refresh_token_grant(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticated_client(&request).await?;
        if !client.allows_grant(GrantType::RefreshToken) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed the refresh_token grant".to_string(),
            ));
        }

        let refresh_token = request
            .refresh_token
            .ok_or_else(|| OAuth2Error::InvalidRequest("refresh_token is required".to_string()))?;
        let claims = self.decode_own_token(&refresh_token)?;

        if claims.client_id.as_deref() != Some(client.client_id.as_str()) {
            return Err(OAuth2Error::InvalidGrant(
                "refresh_token was not issued to this client".to_string(),
            ));
        }
        let subject = claims
            .sub
            .ok_or_else(|| OAuth2Error::InvalidGrant("refresh_token has no subject".to_string()))?;
        let scope = claims.scope.unwrap_or_default();

        let (access_token, _claims) =
            self.issuer
                .issue_access_token(&subject, &self.default_audience, &client.client_id, &scope, None)?;
        let (new_refresh_token, _) = self
            .issuer
            .issue_refresh_token(&subject, &self.default_audience, &client.client_id, &scope)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: Some(new_refresh_token),
            id_token: None,
            scope,
            issued_token_type: None,
        })
    }

    /// RFC 8693 token exchange, restricted to the one subject-token type
    /// this server can validate offline: its own previously issued access
    /// tokens. `actor_token` delegation is not implemented.
    async fn token_exchange_grant(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self.authenticated_client(&request).await?;
        if !client.allows_grant(GrantType::TokenExchange) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client is not allowed the token-exchange grant".to_string(),
            ));
        }

        if request.subject_token_type.as_deref() != Some(ACCESS_TOKEN_TYPE_URN) {
            return Err(OAuth2Error::InvalidRequest(
                "subject_token_type must be an access_token URN".to_string(),
            ));
        }
        let subject_token = request
            .subject_token
            .ok_or_else(|| OAuth2Error::InvalidRequest("subject_token is required".to_string()))?;
        let claims = self.decode_own_token(&subject_token)?;
        let subject = claims
            .sub
            .ok_or_else(|| OAuth2Error::InvalidGrant("subject_token has no subject".to_string()))?;

        let original_scope: Vec<String> = claims
            .scope
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let scope = requested_scope(&request.scope, &original_scope)?;

        let (access_token, _claims) = self.issuer.issue_access_token(
            &subject,
            &self.default_audience,
            &client.client_id,
            &scope,
            None,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: None,
            id_token: None,
            scope,
            issued_token_type: Some(ACCESS_TOKEN_TYPE_URN),
        })
    }

    /// Decode a token this server itself issued, against its own PKI
    /// provider directly — no JWKS round trip is needed since the signer
    /// and the verifier are the same process.
    fn decode_own_token(&self, token: &str) -> Result<Claims, OAuth2Error> {
        let header = decode_header(token).map_err(|_| {
            OAuth2Error::InvalidGrant("malformed token".to_string())
        })?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| OAuth2Error::InvalidGrant("token is missing a key id".to_string()))?;
        let key = self
            .pki
            .key(kid)
            .ok_or_else(|| OAuth2Error::InvalidGrant("token key id is not recognised".to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(std::slice::from_ref(&self.token_issuer_url));
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &key.decoding_key, &validation)
            .map_err(|_| OAuth2Error::InvalidGrant("token failed validation".to_string()))?;
        Ok(data.claims)
    }
}

/// Scope narrowing: an absent `scope` parameter keeps the full original set;
/// a present one must be a subset (RFC 6749 §3.3 forbids scope escalation).
fn requested_scope(requested: &Option<String>, allowed: &[String]) -> Result<String, OAuth2Error> {
    match requested {
        None => Ok(allowed.join(" ")),
        Some(raw) => {
            let requested: Vec<&str> = raw.split_whitespace().collect();
            if requested.iter().any(|s| !allowed.iter().any(|a| a == s)) {
                return Err(OAuth2Error::InvalidScope(
                    "requested scope exceeds what is allowed".to_string(),
                ));
            }
            Ok(requested.join(" "))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResponseType;
    use crate::repository::StoreClientRepository;
    use castellan_core::pkce::ChallengeMethod;
    use castellan_core::AssuranceContext;
    use castellan_crypto::FilePkiProvider;
    use castellan_store::InMemoryStore;
    use chrono::Utc;
    use std::time::Duration;

    struct NoKeyProvider;
    impl PkiProvider for NoKeyProvider {
        fn keys(&self) -> &[Arc<castellan_crypto::PkiKey>] {
            &[]
        }
        fn key(&self, _kid: &str) -> Option<Arc<castellan_crypto::PkiKey>> {
            None
        }
        fn active_key(&self) -> Option<Arc<castellan_crypto::PkiKey>> {
            None
        }
    }

    fn service() -> TokenService {
        let client_store: InMemoryStore<OAuth2Client> = InMemoryStore::new();
        let clients = Arc::new(StoreClientRepository::new(client_store));
        let codes: Arc<dyn Store<AuthorizationCode>> = Arc::new(InMemoryStore::new());
        let pki: Arc<dyn PkiProvider> = match FilePkiProvider::load(&[]) {
            Ok(p) => Arc::new(p),
            Err(_) => Arc::new(NoKeyProvider),
        };
        let issuer = Arc::new(TokenIssuer::new(pki.clone(), "https://issuer.test"));
        let secrets = Arc::new(EncryptionService::new("k1", &[7u8; 32]).unwrap());
        TokenService::new(clients, codes, issuer, pki, secrets, "https://issuer.test", "api")
    }

    fn public_client() -> OAuth2Client {
        OAuth2Client {
            client_id: "spa-client".into(),
            hashed_client_secret: None,
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec!["https://app.example/callback".into()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            require_pkce: true,
            flow_graph_id: None,
            scopes: vec!["openid".into(), "profile".into()],
        }
    }

    #[tokio::test]
    async fn unregistered_code_is_an_invalid_grant() {
        let svc = service();
        svc.clients.insert(public_client()).await.unwrap();

        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("does-not-exist".to_string()),
            redirect_uri: Some("https://app.example/callback".to_string()),
            code_verifier: Some("a".repeat(43)),
            client_id: Some("spa-client".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            svc.token(request).await,
            Err(OAuth2Error::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn mismatched_pkce_verifier_is_rejected() {
        let svc = service();
        svc.clients.insert(public_client()).await.unwrap();

        let code = AuthorizationCode {
            code: "code-1".to_string(),
            client_id: "spa-client".to_string(),
            redirect_uri: "https://app.example/callback".to_string(),
            scopes: vec!["openid".to_string()],
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
            code_challenge_method: Some(ChallengeMethod::S256),
            subject: "user-1".to_string(),
            assurance: AssuranceContext::default(),
            auth_time: Utc::now(),
            nonce: None,
        };
        svc.codes.put("code-1", code, Duration::from_secs(600)).await.unwrap();

        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("code-1".to_string()),
            redirect_uri: Some("https://app.example/callback".to_string()),
            code_verifier: Some("wrong-verifier-wrong-verifier-wrong-verifi".to_string()),
            client_id: Some("spa-client".to_string()),
            ..Default::default()
        };

        assert!(matches!(svc.token(request).await, Err(OAuth2Error::Pkce(_))));
    }

    #[tokio::test]
    async fn scope_escalation_is_rejected() {
        assert!(matches!(
            requested_scope(&Some("openid admin".to_string()), &["openid".to_string()]),
            Err(OAuth2Error::InvalidScope(_))
        ));
    }
}
