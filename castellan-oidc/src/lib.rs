//! # Castellan OIDC
//!
//! The framework-agnostic side endpoints of the identity provider: JWKS
//! materialisation, RFC 8414 / OIDC Discovery metadata, RFC 7662
//! introspection, and OIDC UserInfo claim mapping. Every one of these
//! validates tokens this server itself issued against its own JWKS — never
//! against a third party.

#![allow(missing_docs)]

pub mod discovery;
pub mod error;
pub mod introspection;
pub mod jwks;
pub mod userinfo;

pub use discovery::{authorization_server_metadata, openid_configuration, DiscoveryConfig, ServerMetadata};
pub use error::OidcError;
pub use introspection::{IntrospectionResponse, IntrospectionService};
pub use jwks::jwks_document;
pub use userinfo::UserInfoService;
