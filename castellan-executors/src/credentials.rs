//! The credentials (username/password) authenticator.
//!
//! User storage is out of scope; `UserLookup` and
//! `CredentialsAuth` are the external collaborators this executor is built
//! against. Registration semantics: a "user not found" is not an error in
//! a REGISTRATION flow — it yields an unauthenticated provisional user
//! carrying the submitted username, so a later `ProvisioningExecutor` can
//! create the account. In an AUTHENTICATION flow the same result is a
//! FAILURE.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::{AttributeValue, AuthenticatedUser, FlowKind, UserType};

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorKind, ExecutorResponse, RequiredInput};

/// Resolves a user record by username, independent of the credential check
/// itself. An external identification collaborator.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<ResolvedUser>, AuthError>;
}

/// The minimal shape the credentials executor needs back from user lookup.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user_id: String,
    pub org_unit_id: Option<String>,
}

/// Validates a (username, password) pair for an already-resolved user.
#[async_trait]
pub trait CredentialsAuth: Send + Sync {
    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError>;
}

pub struct CredentialsExecutor<L, A> {
    lookup: L,
    auth: A,
}

impl<L, A> CredentialsExecutor<L, A>
where
    L: UserLookup,
    A: CredentialsAuth,
{
    pub fn new(lookup: L, auth: A) -> Self {
        Self { lookup, auth }
    }
}

#[async_trait]
impl<L, A> Executor for CredentialsExecutor<L, A>
where
    L: UserLookup,
    A: CredentialsAuth,
{
    fn name(&self) -> &str {
        "credentials"
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Authentication
    }

    fn default_inputs(&self) -> Vec<RequiredInput> {
        vec![
            RequiredInput::required("username", "string"),
            RequiredInput::required("password", "string"),
        ]
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        let mut resp = ExecutorResponse::complete();
        if self.check_input_data(ctx, &mut resp) {
            resp.status = crate::executor::ExecStatus::Incomplete;
            resp.response_type = Some(crate::executor::ResponseType::View);
            return Ok(resp);
        }

        let username = ctx.input("username").unwrap_or_default();
        let password = ctx.input("password").unwrap_or_default();

        let resolved = self.lookup.find_by_username(username).await?;

        let resolved = match resolved {
            Some(resolved) => resolved,
            None if ctx.flow_type == FlowKind::Registration => {
                let mut attributes = HashMap::new();
                attributes.insert(
                    "username".to_string(),
                    AttributeValue::String(username.to_string()),
                );
                return Ok(ExecutorResponse::complete().with_authenticated_user(AuthenticatedUser {
                    is_authenticated: false,
                    user_id: None,
                    org_unit_id: None,
                    user_type: Some(UserType::Provisional),
                    attributes,
                }));
            }
            None => return Ok(ExecutorResponse::failure("user not found")),
        };

        if !self.auth.verify_password(&resolved.user_id, password).await? {
            return Ok(ExecutorResponse::failure("invalid credentials"));
        }

        Ok(ExecutorResponse::complete().with_authenticated_user(AuthenticatedUser {
            is_authenticated: true,
            user_id: Some(resolved.user_id),
            org_unit_id: resolved.org_unit_id,
            user_type: Some(UserType::Standard),
            attributes: HashMap::new(),
        }))
    }
}
