//! # Castellan Token
//!
//! JWT issuance (access/refresh/ID tokens), built on `castellan-crypto`'s
//! algorithm-agile signer, plus offline JWKS-based validation for resource
//! servers that only hold Castellan's public keys.

#![allow(missing_docs)]

pub mod claims;
pub mod error;
pub mod issuer;
pub mod validator;

pub use claims::{AccessTokenClaims, IdTokenClaims, RefreshTokenClaims};
pub use error::TokenError;
pub use issuer::TokenIssuer;
pub use validator::{validate_jwt, Claims, Jwk, Jwks, JwksCache};
