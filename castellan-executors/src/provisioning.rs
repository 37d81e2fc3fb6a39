//! `ProvisioningExecutor`: the node synthesised immediately before every
//! terminal node in a registration graph. It materialises the
//! authenticated-but-new user into the user store before the flow reaches
//! `AUTH_SUCCESS`. The merge rules name this executor by exact string, so
//! its registered name is fixed.

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::AuthenticatedUser;

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorKind, ExecutorResponse};

/// The name `castellan-graph`'s synthesiser writes onto the inserted node,
/// and the merge-rule condition checks for exactly.
pub const PROVISIONING_EXECUTOR_NAME: &str = "ProvisioningExecutor";

/// Creates (or finds) the durable user record for a provisional identity
/// produced by an upstream authenticator (e.g. credentials-on-registration).
/// User storage is an external collaborator.
#[async_trait]
pub trait UserProvisioner: Send + Sync {
    async fn provision(&self, provisional: &AuthenticatedUser) -> Result<String, AuthError>;
}

pub struct ProvisioningExecutor<P> {
    provisioner: P,
}

impl<P: UserProvisioner> ProvisioningExecutor<P> {
    pub fn new(provisioner: P) -> Self {
        Self { provisioner }
    }
}

#[async_trait]
impl<P: UserProvisioner> Executor for ProvisioningExecutor<P> {
    fn name(&self) -> &str {
        PROVISIONING_EXECUTOR_NAME
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Utility
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        if ctx.authenticated_user.user_id.is_some() {
            // Already provisioned by an earlier turn revisiting this node
            // (e.g. re-entry after an OU-creation failure); nothing to do.
            let mut user = ctx.authenticated_user.clone();
            user.is_authenticated = true;
            return Ok(ExecutorResponse::complete().with_authenticated_user(user));
        }

        let user_id = self.provisioner.provision(&ctx.authenticated_user).await?;

        let mut user = ctx.authenticated_user.clone();
        user.is_authenticated = true;
        user.user_id = Some(user_id);

        Ok(ExecutorResponse::complete().with_authenticated_user(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecStatus;
    use castellan_core::AssuranceContext;
    use std::collections::HashMap;

    struct FakeProvisioner;
    #[async_trait]
    impl UserProvisioner for FakeProvisioner {
        async fn provision(&self, _provisional: &AuthenticatedUser) -> Result<String, AuthError> {
            Ok("new-user-1".to_string())
        }
    }

    fn ctx_for(user: AuthenticatedUser) -> NodeContext {
        NodeContext {
            flow_id: "f1".into(),
            flow_type: castellan_core::FlowKind::Registration,
            app_id: "app".into(),
            attempt: 1,
            user_input_data: HashMap::new(),
            runtime_data: HashMap::new(),
            additional_data: HashMap::new(),
            authenticated_user: user,
            assurance: AssuranceContext::default(),
            user_eligible_for_provisioning: true,
        }
    }

    #[tokio::test]
    async fn provisions_a_userless_provisional_user() {
        let exec = ProvisioningExecutor::new(FakeProvisioner);
        let provisional = AuthenticatedUser {
            is_authenticated: false,
            user_id: None,
            ..Default::default()
        };
        let resp = exec.execute(&ctx_for(provisional)).await.unwrap();
        assert_eq!(resp.status, ExecStatus::Complete);
        let user = resp.authenticated_user.unwrap();
        assert!(user.is_authenticated);
        assert_eq!(user.user_id.as_deref(), Some("new-user-1"));
    }

    #[tokio::test]
    async fn already_provisioned_user_is_a_no_op() {
        let exec = ProvisioningExecutor::new(FakeProvisioner);
        let already = AuthenticatedUser {
            is_authenticated: false,
            user_id: Some("existing-id".into()),
            ..Default::default()
        };
        let resp = exec.execute(&ctx_for(already)).await.unwrap();
        let user = resp.authenticated_user.unwrap();
        assert!(user.is_authenticated);
        assert_eq!(user.user_id.as_deref(), Some("existing-id"));
    }
}
