use thiserror::Error;

/// Errors raised while issuing or validating a JWT.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No signing key was available (PKI provider has no active key, or the
    /// named `kid` does not resolve).
    #[error("no signing key available: {0}")]
    NoSigningKey(String),

    /// `jsonwebtoken` failed to encode or decode.
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The decoded token's `kid` header did not resolve against the JWKS.
    #[error("signing key {0} not found")]
    KeyNotFound(String),

    /// The token validated but carried an unexpected claim shape.
    #[error("malformed claims: {0}")]
    MalformedClaims(String),
}
