//! # Castellan Guard
//!
//! Protects Castellan's own management plane (client registration admin,
//! revocation introspection) with the chained `AuthenticationStrategy`
//! machinery from `castellan-core::strategy`. This crate contributes one
//! concrete strategy collaborator — [`jwt::JwtValidator`], a
//! [`castellan_core::strategy::TokenValidator`] that checks a bearer token
//! against this server's own JWKS — rather than re-implementing the chain
//! itself, which already lives in `castellan-core` for every HTTP framework
//! to share.

pub mod jwt;

pub use castellan_core::strategy::{AuthPolicy, Authenticator, AuthenticatorBuilder, TokenStrategy};
pub use jwt::{BearerIdentity, JwtValidator};
