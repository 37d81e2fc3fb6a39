//! `/.well-known/oauth-authorization-server` (RFC 8414) and
//! `/.well-known/openid-configuration` (OIDC Discovery 1.0).
//!
//! Every advertised capability is derived from the same enums the
//! authorize/token handlers match on, never duplicated as a second list of
//! string literals — so discovery can't silently drift from what the server
//! actually implements.

use castellan_oauth2::{GrantType, ResponseType, TokenEndpointAuthMethod};
use serde::Serialize;

/// RFC 8414 §2 authorization server metadata. Superset fields specific to
/// OIDC Discovery 1.0 are folded into the same struct and simply omitted
/// from the bare OAuth2 document via `skip_serializing_if`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    pub registration_endpoint: String,
    pub introspection_endpoint: String,
    pub revocation_endpoint: String,
    pub scopes_supported: Vec<&'static str>,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_types_supported: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims_supported: Option<Vec<&'static str>>,
}

const GRANT_TYPES: [GrantType; 4] = [
    GrantType::AuthorizationCode,
    GrantType::ClientCredentials,
    GrantType::RefreshToken,
    GrantType::TokenExchange,
];
const RESPONSE_TYPES: [ResponseType; 1] = [ResponseType::Code];
const AUTH_METHODS: [TokenEndpointAuthMethod; 3] = [
    TokenEndpointAuthMethod::ClientSecretBasic,
    TokenEndpointAuthMethod::ClientSecretPost,
    TokenEndpointAuthMethod::None,
];
const CODE_CHALLENGE_METHODS: [&str; 2] = ["plain", "S256"];
const ID_TOKEN_SIGNING_ALGS: [&str; 4] = ["RS256", "ES256", "ES384", "EdDSA"];
const STANDARD_CLAIMS: [&str; 3] = ["sub", "iss", "aud"];

/// Scopes this deployment advertises. `openid`/`profile` are OIDC Core's own;
/// the rest mirror `OAuth2Client::scopes`' vocabulary and must stay in sync
/// with whatever scopes client registrations are actually allowed to request.
pub struct DiscoveryConfig {
    pub issuer: String,
    pub scopes_supported: Vec<&'static str>,
}

pub fn authorization_server_metadata(config: &DiscoveryConfig) -> ServerMetadata {
    ServerMetadata {
        authorization_endpoint: format!("{}/oauth2/authorize", config.issuer),
        token_endpoint: format!("{}/oauth2/token", config.issuer),
        jwks_uri: format!("{}/oauth2/jwks", config.issuer),
        registration_endpoint: format!("{}/oauth2/dcr/register", config.issuer),
        introspection_endpoint: format!("{}/oauth2/introspect", config.issuer),
        revocation_endpoint: format!("{}/oauth2/revoke", config.issuer),
        scopes_supported: config.scopes_supported.clone(),
        response_types_supported: RESPONSE_TYPES.iter().map(|r| r.wire()).collect(),
        grant_types_supported: GRANT_TYPES.iter().map(|g| g.wire()).collect(),
        token_endpoint_auth_methods_supported: AUTH_METHODS.iter().map(|m| m.wire()).collect(),
        code_challenge_methods_supported: CODE_CHALLENGE_METHODS.to_vec(),
        userinfo_endpoint: None,
        subject_types_supported: None,
        id_token_signing_alg_values_supported: None,
        claims_supported: None,
        issuer: config.issuer.clone(),
    }
}

pub fn openid_configuration(config: &DiscoveryConfig) -> ServerMetadata {
    let mut metadata = authorization_server_metadata(config);
    metadata.userinfo_endpoint = Some(format!("{}/oauth2/userinfo", config.issuer));
    metadata.subject_types_supported = Some(vec!["public"]);
    metadata.id_token_signing_alg_values_supported = Some(ID_TOKEN_SIGNING_ALGS.to_vec());
    metadata.claims_supported = Some(STANDARD_CLAIMS.to_vec());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            issuer: "https://idp.example".to_string(),
            scopes_supported: vec!["openid", "profile"],
        }
    }

    #[test]
    fn oauth_metadata_omits_oidc_only_fields() {
        let metadata = authorization_server_metadata(&config());
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("userinfo_endpoint").is_none());
        assert!(json.get("subject_types_supported").is_none());
        assert_eq!(metadata.grant_types_supported.len(), 4);
    }

    #[test]
    fn openid_metadata_includes_oidc_fields() {
        let metadata = openid_configuration(&config());
        assert_eq!(
            metadata.userinfo_endpoint.as_deref(),
            Some("https://idp.example/oauth2/userinfo")
        );
        assert!(metadata.id_token_signing_alg_values_supported.is_some());
    }
}
