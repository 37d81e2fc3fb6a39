//! `/oauth2/revoke` (RFC 7009). Not part of the original distilled protocol
//! surface; added because a production token endpoint without a revocation
//! path leaves compromised refresh tokens valid until natural expiry.
//!
//! Castellan issues stateless JWTs and keeps no table of outstanding tokens,
//! so "revocation" here means denylisting the token's `jti` until its own
//! expiry — the same trick used for single-use authorization codes, just
//! keyed by a claim pulled out of an already-signed token rather than a
//! server-minted one.

use std::sync::Arc;
use std::time::Duration;

use castellan_crypto::PkiProvider;
use castellan_store::Store;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Validation};

use crate::client::OAuth2Client;
use crate::error::OAuth2Error;
use crate::repository::ClientRepository;
use castellan_token::validator::Claims;

#[derive(Debug, Clone, Default)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

pub struct RevocationService {
    clients: Arc<dyn ClientRepository>,
    denylist: Arc<dyn Store<()>>,
    pki: Arc<dyn PkiProvider>,
}

impl RevocationService {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        denylist: Arc<dyn Store<()>>,
        pki: Arc<dyn PkiProvider>,
    ) -> Self {
        Self {
            clients,
            denylist,
            pki,
        }
    }

    /// Per RFC 7009 §2.2: the endpoint returns 200 even for a token it does
    /// not recognise or cannot parse, to avoid acting as a token-validity
    /// oracle for callers that don't hold the client's own secret.
    pub async fn revoke(&self, request: RevokeRequest) -> Result<(), OAuth2Error> {
        let client = self.authenticate(&request).await;

        let claims = match self.decode(&request.token) {
            Ok(claims) => claims,
            Err(_) => return Ok(()),
        };

        if let (Ok(client), Some(owner)) = (&client, claims.client_id.as_deref()) {
            if client.client_id != owner {
                return Ok(());
            }
        }

        let Some(jti) = claims.jti else {
            return Ok(());
        };
        let ttl = claims
            .exp
            .map(|exp| (exp - Utc::now().timestamp()).max(0))
            .unwrap_or(0);
        self.denylist
            .put(&jti, (), Duration::from_secs(ttl as u64))
            .await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, OAuth2Error> {
        Ok(self.denylist.get(jti).await?.is_some())
    }

    async fn authenticate(&self, request: &RevokeRequest) -> Result<OAuth2Client, OAuth2Error> {
        let client_id = request
            .client_id
            .as_deref()
            .ok_or_else(|| OAuth2Error::InvalidClient("client_id is required".to_string()))?;
        self.clients
            .find(client_id)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidClient("unknown client_id".to_string()))
    }

    fn decode(&self, token: &str) -> Result<Claims, OAuth2Error> {
        let header = decode_header(token).map_err(|_| OAuth2Error::InvalidRequest("malformed token".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OAuth2Error::InvalidRequest("token has no key id".to_string()))?;
        let key = self
            .pki
            .key(&kid)
            .ok_or_else(|| OAuth2Error::InvalidRequest("unrecognised key id".to_string()))?;
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &key.decoding_key, &validation)
            .map_err(|_| OAuth2Error::InvalidRequest("token failed validation".to_string()))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GrantType, ResponseType, TokenEndpointAuthMethod};
    use crate::repository::StoreClientRepository;
    use castellan_crypto::{FilePkiProvider, PkiKeyFile};
    use castellan_store::InMemoryStore;
    use castellan_token::TokenIssuer;
    use std::path::Path;

    fn client() -> OAuth2Client {
        OAuth2Client {
            client_id: "client-1".into(),
            hashed_client_secret: None,
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec!["https://app.example/callback".into()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            require_pkce: true,
            flow_graph_id: None,
            scopes: vec!["openid".into()],
        }
    }

    fn test_pki() -> Arc<dyn PkiProvider> {
        let entries = [PkiKeyFile {
            id: "test-key",
            cert_file: Path::new("testdata/rsa_cert.pem"),
            key_file: Path::new("testdata/rsa_key.pem"),
        }];
        Arc::new(FilePkiProvider::load(&entries).expect("test fixtures load"))
    }

    fn service() -> (RevocationService, Arc<dyn ClientRepository>, Arc<TokenIssuer>) {
        let client_store: InMemoryStore<OAuth2Client> = InMemoryStore::new();
        let clients: Arc<dyn ClientRepository> = Arc::new(StoreClientRepository::new(client_store));
        let denylist: Arc<dyn Store<()>> = Arc::new(InMemoryStore::new());
        let pki = test_pki();
        let issuer = Arc::new(TokenIssuer::new(pki.clone(), "https://issuer.test"));
        let svc = RevocationService::new(clients.clone(), denylist, pki);
        (svc, clients, issuer)
    }

    #[tokio::test]
    async fn revoking_a_malformed_token_still_returns_ok() {
        let (svc, _clients, _issuer) = service();
        let result = svc
            .revoke(RevokeRequest {
                token: "not-a-jwt".to_string(),
                ..Default::default()
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn revoking_a_valid_token_denylists_its_jti() {
        let (svc, clients, issuer) = service();
        clients.insert(client()).await.unwrap();
        let (token, claims) = issuer
            .issue_access_token("user-1", "api", "client-1", "openid", None)
            .unwrap();

        assert!(!svc.is_revoked(&claims.jti).await.unwrap());
        svc.revoke(RevokeRequest {
            token,
            client_id: Some("client-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(svc.is_revoked(&claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn revoking_another_clients_token_is_silently_ignored() {
        let (svc, clients, issuer) = service();
        clients.insert(client()).await.unwrap();
        let mut other = client();
        other.client_id = "other-client".to_string();
        clients.insert(other).await.unwrap();
        let (token, claims) = issuer
            .issue_access_token("user-1", "api", "client-1", "openid", None)
            .unwrap();

        svc.revoke(RevokeRequest {
            token,
            client_id: Some("other-client".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(!svc.is_revoked(&claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn is_revoked_is_false_for_an_unknown_jti() {
        let (svc, _clients, _issuer) = service();
        assert!(!svc.is_revoked("never-seen").await.unwrap());
    }

    #[tokio::test]
    async fn authenticate_without_client_id_is_invalid_client() {
        let (svc, _clients, _issuer) = service();
        let err = svc
            .authenticate(&RevokeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));
    }

    #[tokio::test]
    async fn authenticate_with_unknown_client_id_is_invalid_client() {
        let (svc, _clients, _issuer) = service();
        let err = svc
            .authenticate(&RevokeRequest {
                client_id: Some("ghost".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));
    }
}
