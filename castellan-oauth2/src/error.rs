use thiserror::Error;

/// RFC 6749 §5.2 error codes, returned verbatim as the `error` field of the
/// token/authorize error response. `error_description` carries the
/// human-readable detail; the wire code never does.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_client: {0}")]
    InvalidClient(String),

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    #[error("server_error: {0}")]
    ServerError(String),

    #[error(transparent)]
    Token(#[from] castellan_token::TokenError),

    #[error(transparent)]
    Store(#[from] castellan_store::StoreError),

    #[error(transparent)]
    Pkce(#[from] castellan_core::pkce::PkceError),

    #[error(transparent)]
    Encryption(#[from] castellan_crypto::EncryptionError),
}

impl OAuth2Error {
    /// The RFC 6749 wire error code, without the description.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::Pkce(_) => "invalid_request",
            Self::Token(_) | Self::Store(_) | Self::ServerError(_) | Self::Encryption(_) => "server_error",
        }
    }
}
