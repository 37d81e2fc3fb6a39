//! # Castellan Core
//!
//! Shared domain types and traits for the Castellan identity provider:
//! the assurance data model (AAL/IAL), the authenticated-user record, the
//! error taxonomy, PKCE, federated-provider discovery, and the injected
//! observability port. Every other crate in the workspace depends on this
//! one and nothing else in the reverse direction.

#![warn(missing_docs)]
#![allow(missing_docs)]

use async_trait::async_trait;

/// Authenticator Assurance Level / Identity Assurance Level data model.
pub mod assurance;

/// PKCE (Proof Key for Code Exchange) utilities.
pub mod pkce;

/// Errors that can occur during the authentication process.
pub mod error;
use crate::error::AuthError;

/// A unified identity structure returned by all providers, plus the
/// engine-facing authenticated-user record.
pub mod state;
use crate::state::{Identity, OAuthToken};

/// Discovery utilities for federated OAuth2/OIDC providers.
pub mod discovery;

/// The authentication/registration flow-kind tag, shared by the graph,
/// executor, and engine crates.
pub mod flow;
pub use flow::FlowKind;

/// Injected observability port (flow-started/node-started/flow-completed/flow-failed).
pub mod observability;

/// Chained request-authentication strategies (Basic/Bearer/Header/Session),
/// used to guard the management plane.
pub mod strategy;

pub use assurance::{Aal, AssuranceContext, AuthenticationFactor, AuthenticatorMeta, Ial, Level};
pub use error::{AssuranceError, EngineError, GuardError};
pub use state::{extract_group_ids, AttributeValue, AuthenticatedUser, UserType};

/// Trait for an OAuth2-compatible provider (federated authenticator backend).
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Get the provider identifier.
    fn provider_id(&self) -> &str;

    /// Helper to get the authorization URL.
    fn get_authorization_url(
        &self,
        state: &str,
        scopes: &[&str],
        code_challenge: Option<&str>,
    ) -> String;

    /// Exchange an authorization code for an Identity.
    async fn exchange_code_for_identity(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<(Identity, OAuthToken), AuthError>;

    /// Refresh an access token using a refresh token.
    async fn refresh_token(&self, _refresh_token: &str) -> Result<OAuthToken, AuthError> {
        Err(AuthError::Provider(
            "Token refresh not supported by this provider".into(),
        ))
    }

    /// Revoke an access token.
    async fn revoke_token(&self, _token: &str) -> Result<(), AuthError> {
        Err(AuthError::Provider(
            "Token revocation not supported by this provider".into(),
        ))
    }
}

/// Trait for a Credentials-based provider (e.g., username/password).
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// The type of credentials accepted by this provider.
    type Credentials;

    /// Validate credentials and return an Identity.
    async fn authenticate(&self, creds: Self::Credentials) -> Result<Identity, AuthError>;
}

/// Trait for mapping a federated identity, or a local credentials result, to
/// a local user record.
#[async_trait]
pub trait UserMapper: Send + Sync {
    /// The type of the local user object.
    type LocalUser: Send + Sync;

    /// Map an identity to a local user. This could involve creating a new
    /// user or finding an existing one.
    async fn map_user(&self, identity: &Identity) -> Result<Self::LocalUser, AuthError>;
}

#[async_trait]
impl UserMapper for () {
    type LocalUser = ();
    async fn map_user(&self, _identity: &Identity) -> Result<Self::LocalUser, AuthError> {
        Ok(())
    }
}
