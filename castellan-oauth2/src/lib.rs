//! # Castellan OAuth2
//!
//! The OAuth2/OIDC protocol surface: `/oauth2/authorize`'s bridge into the
//! flow engine, `/oauth2/token`'s grant dispatch, RFC 7009 revocation, and
//! RFC 7591 dynamic client registration. PKCE verification lives in
//! `castellan-core`; this crate only consumes it at the points RFC 6749 and
//! RFC 7636 require.

#![allow(missing_docs)]

pub mod authorize;
pub mod client;
pub mod code;
pub mod dcr;
pub mod error;
pub mod repository;
pub mod revoke;
pub mod token;

pub use authorize::{AuthorizationService, AuthorizeOutcome, AuthorizeRequest};
pub use client::{GrantType, OAuth2Client, ResponseType, TokenEndpointAuthMethod};
pub use code::{AuthorizationCode, AUTHORIZATION_CODE_TTL};
pub use dcr::{RegistrationRequest, RegistrationResponse, RegistrationService};
pub use error::OAuth2Error;
pub use repository::{ClientRepository, StoreClientRepository};
pub use revoke::{RevocationService, RevokeRequest};
pub use token::{TokenRequest, TokenResponse, TokenService};
