//! `/oauth2/dcr/register` — RFC 7591 dynamic client registration.
//!
//! Not part of the original distilled protocol surface: a provisioning
//! story that always requires an operator to hand-edit a client table
//! doesn't hold up once relying parties are expected to self-service, so
//! this is added as a first-class endpoint rather than left to tooling
//! outside the server.

use std::sync::Arc;

use castellan_crypto::EncryptionService;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{GrantType, OAuth2Client, ResponseType, TokenEndpointAuthMethod};
use crate::error::OAuth2Error;
use crate::repository::ClientRepository;

/// RFC 7591 §2 registration request. Unlisted metadata fields supported by
/// other implementations (`client_name`, `logo_uri`, ...) are intentionally
/// not modelled; this server only persists what it enforces.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// RFC 7591 §3.2.1 registration response. `client_secret` is returned here
/// in the clear exactly once; Castellan never stores or displays it again.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub scope: String,
}

pub struct RegistrationService {
    clients: Arc<dyn ClientRepository>,
    secrets: Arc<EncryptionService>,
    default_scopes: Vec<String>,
}

impl RegistrationService {
    pub fn new(
        clients: Arc<dyn ClientRepository>,
        secrets: Arc<EncryptionService>,
        default_scopes: Vec<String>,
    ) -> Self {
        Self {
            clients,
            secrets,
            default_scopes,
        }
    }

    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationResponse, OAuth2Error> {
        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::InvalidRequest(
                "redirect_uris must contain at least one URI".to_string(),
            ));
        }
        for uri in &request.redirect_uris {
            let parsed = url::Url::parse(uri)
                .map_err(|_| OAuth2Error::InvalidRequest(format!("invalid redirect_uri: {uri}")))?;
            if parsed.scheme() != "https" && parsed.host_str() != Some("localhost") {
                return Err(OAuth2Error::InvalidRequest(
                    "redirect_uris must use https, except for localhost".to_string(),
                ));
            }
        }

        let grant_types = if request.grant_types.is_empty() {
            vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
        } else {
            request
                .grant_types
                .iter()
                .map(|g| {
                    GrantType::parse(g)
                        .ok_or_else(|| OAuth2Error::InvalidRequest(format!("unsupported grant_type: {g}")))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let response_types = if request.response_types.is_empty() {
            vec![ResponseType::Code]
        } else {
            request
                .response_types
                .iter()
                .map(|r| {
                    ResponseType::parse(r)
                        .ok_or_else(|| OAuth2Error::InvalidRequest(format!("unsupported response_type: {r}")))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let auth_method = match request.token_endpoint_auth_method.as_deref() {
            Some(raw) => TokenEndpointAuthMethod::parse(raw)
                .ok_or_else(|| OAuth2Error::InvalidRequest(format!("unsupported token_endpoint_auth_method: {raw}")))?,
            None => TokenEndpointAuthMethod::ClientSecretBasic,
        };

        let scopes: Vec<String> = match &request.scope {
            Some(raw) => raw.split_whitespace().map(str::to_string).collect(),
            None => self.default_scopes.clone(),
        };

        let client_id = format!("dcr-{}", Uuid::new_v4());
        let is_public = auth_method == TokenEndpointAuthMethod::None;

        let (hashed_client_secret, plaintext_secret) = if is_public {
            (None, None)
        } else {
            let secret = generate_client_secret();
            let envelope = self.secrets.encrypt(&secret)?;
            let stored = serde_json::to_string(&envelope)
                .map_err(|e| OAuth2Error::ServerError(format!("could not serialise client secret envelope: {e}")))?;
            (Some(stored), Some(secret))
        };

        let client = OAuth2Client {
            client_id: client_id.clone(),
            hashed_client_secret,
            grant_types,
            response_types,
            redirect_uris: request.redirect_uris.clone(),
            token_endpoint_auth_method: auth_method,
            require_pkce: is_public,
            flow_graph_id: None,
            scopes: scopes.clone(),
        };
        self.clients.insert(client).await?;

        Ok(RegistrationResponse {
            client_id,
            client_secret: plaintext_secret,
            redirect_uris: request.redirect_uris,
            grant_types: grant_types_wire(&request.grant_types),
            response_types: response_types_wire(&request.response_types),
            token_endpoint_auth_method: auth_method.wire().to_string(),
            scope: scopes.join(" "),
        })
    }
}

fn grant_types_wire(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec![
            GrantType::AuthorizationCode.wire().to_string(),
            GrantType::RefreshToken.wire().to_string(),
        ]
    } else {
        requested.to_vec()
    }
}

fn response_types_wire(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        vec![ResponseType::Code.wire().to_string()]
    } else {
        requested.to_vec()
    }
}

fn generate_client_secret() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
