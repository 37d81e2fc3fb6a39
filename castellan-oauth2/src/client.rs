//! The `OAuth2Client` application-registration record.

use serde::{Deserialize, Serialize};

/// Grant types a client may be allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
    #[serde(rename = "urn:ietf:params:oauth:grant-type:token-exchange")]
    TokenExchange,
}

impl GrantType {
    #[must_use]
    pub fn wire(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::TokenExchange => "urn:ietf:params:oauth:grant-type:token-exchange",
        }
    }

    #[must_use]
    pub fn parse(wire: &str) -> Option<Self> {
        match wire {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            "urn:ietf:params:oauth:grant-type:token-exchange" => Some(Self::TokenExchange),
            _ => None,
        }
    }
}

/// `response_type` values the authorize endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
}

impl ResponseType {
    #[must_use]
    pub fn wire(self) -> &'static str {
        match self {
            Self::Code => "code",
        }
    }

    #[must_use]
    pub fn parse(wire: &str) -> Option<Self> {
        match wire {
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

/// How a client authenticates itself at the token endpoint (RFC 6749 §2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

impl TokenEndpointAuthMethod {
    #[must_use]
    pub fn wire(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }

    #[must_use]
    pub fn parse(wire: &str) -> Option<Self> {
        match wire {
            "client_secret_basic" => Some(Self::ClientSecretBasic),
            "client_secret_post" => Some(Self::ClientSecretPost),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// A registered relying-party application. The client secret, when present,
/// is stored as a `castellan_crypto::EncryptionEnvelope`-wrapped ciphertext,
/// never in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Client {
    pub client_id: String,
    /// `None` for public clients (`token_endpoint_auth_method == none`).
    pub hashed_client_secret: Option<String>,
    pub grant_types: Vec<GrantType>,
    pub response_types: Vec<ResponseType>,
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    /// Required for public clients; optional (but recommended) for
    /// confidential ones.
    pub require_pkce: bool,
    /// The flow graph id used when this client starts an authorization
    /// flow. `None` selects the server's configured default.
    pub flow_graph_id: Option<String>,
    pub scopes: Vec<String>,
}

impl OAuth2Client {
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grant_types.contains(&grant)
    }

    #[must_use]
    pub fn allows_response_type(&self, response_type: ResponseType) -> bool {
        self.response_types.contains(&response_type)
    }

    #[must_use]
    pub fn allows_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_type_wire_round_trips() {
        for g in [
            GrantType::AuthorizationCode,
            GrantType::ClientCredentials,
            GrantType::RefreshToken,
            GrantType::TokenExchange,
        ] {
            assert_eq!(GrantType::parse(g.wire()), Some(g));
        }
        assert_eq!(GrantType::parse("bogus"), None);
    }

    fn client(grant: GrantType, redirect_uris: &[&str]) -> OAuth2Client {
        OAuth2Client {
            client_id: "c1".into(),
            hashed_client_secret: Some("hash".into()),
            grant_types: vec![grant],
            response_types: vec![ResponseType::Code],
            redirect_uris: redirect_uris.iter().map(|s| s.to_string()).collect(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            require_pkce: false,
            flow_graph_id: None,
            scopes: vec!["openid".into()],
        }
    }

    #[test]
    fn allows_grant_checks_allowlist() {
        let c = client(GrantType::AuthorizationCode, &["https://app/cb"]);
        assert!(c.allows_grant(GrantType::AuthorizationCode));
        assert!(!c.allows_grant(GrantType::ClientCredentials));
    }

    #[test]
    fn allows_redirect_uri_requires_exact_match() {
        let c = client(GrantType::AuthorizationCode, &["https://app/cb"]);
        assert!(c.allows_redirect_uri("https://app/cb"));
        assert!(!c.allows_redirect_uri("https://app/cb/"));
        assert!(!c.allows_redirect_uri("https://evil/cb"));
    }

    #[test]
    fn is_public_reflects_none_auth_method() {
        let mut c = client(GrantType::AuthorizationCode, &[]);
        assert!(!c.is_public());
        c.token_endpoint_auth_method = TokenEndpointAuthMethod::None;
        assert!(c.is_public());
    }
}
