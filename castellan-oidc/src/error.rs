use thiserror::Error;

/// Errors from the JWKS/discovery/introspection/userinfo side endpoints.
/// Token and introspection endpoints never leak the underlying
/// validation failure reason; callers should prefer the boolean/empty-body
/// response a variant maps to over its `Display` text where that matters.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error(transparent)]
    Pki(#[from] castellan_crypto::PkiError),

    #[error(transparent)]
    Token(#[from] castellan_token::TokenError),

    #[error("missing or malformed Authorization header")]
    MissingBearerToken,

    #[error("access token failed validation")]
    InvalidAccessToken,
}
