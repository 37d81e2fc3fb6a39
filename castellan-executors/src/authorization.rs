//! The authorization (permission-check) utility executor.
//! Extracts requested permissions and the user's group ids from several
//! accepted shapes, calls out to the authorization collaborator, and
//! writes the authorized set back into runtime data for downstream nodes.

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::{extract_group_ids, AttributeValue};

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorResponse};

/// The authorization-decision collaborator (out of scope — this
/// executor only defines the boundary it calls through).
#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    async fn authorize(
        &self,
        user_id: &str,
        group_ids: &[String],
        requested: &[String],
    ) -> Result<Vec<String>, AuthError>;
}

pub struct AuthorizationExecutor<P> {
    port: P,
}

impl<P: AuthorizationPort> AuthorizationExecutor<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

fn requested_permissions(ctx: &NodeContext) -> Vec<String> {
    if let Some(raw) = ctx.runtime_data.get("requested_permissions").and_then(|v| v.as_str()) {
        return raw.split(' ').filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    if let Some(raw) = ctx.user_input_data.get("requested_permissions") {
        return raw.split(' ').filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    Vec::new()
}

fn group_ids(ctx: &NodeContext) -> Vec<String> {
    if let Some(AttributeValue::StringList(ids)) = ctx.authenticated_user.attributes.get("groups") {
        return ids.clone();
    }
    if let Some(value) = ctx.authenticated_user.attributes.get("groups") {
        let ids = extract_group_ids(value);
        if !ids.is_empty() {
            return ids;
        }
    }
    if let Some(raw) = ctx.runtime_data.get("groups").and_then(|v| v.as_str()) {
        if let Ok(parsed) = serde_json::from_str::<Vec<String>>(raw) {
            return parsed;
        }
    }
    Vec::new()
}

#[async_trait]
impl<P: AuthorizationPort> Executor for AuthorizationExecutor<P> {
    fn name(&self) -> &str {
        "authorization"
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        if !ctx.authenticated_user.is_authenticated {
            return Ok(ExecutorResponse::failure("user is not authenticated"));
        }
        let Some(user_id) = ctx.authenticated_user.user_id.as_deref() else {
            return Ok(ExecutorResponse::failure("user is not authenticated"));
        };

        let requested = requested_permissions(ctx);
        let groups = group_ids(ctx);

        let authorized = self.port.authorize(user_id, &groups, &requested).await?;

        Ok(ExecutorResponse::complete().with_runtime_data(
            "authorized_permissions",
            serde_json::Value::String(authorized.join(" ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_core::{AssuranceContext, AuthenticatedUser};
    use std::collections::HashMap;

    struct FakePort;
    #[async_trait]
    impl AuthorizationPort for FakePort {
        async fn authorize(
            &self,
            _user_id: &str,
            group_ids: &[String],
            requested: &[String],
        ) -> Result<Vec<String>, AuthError> {
            Ok(requested
                .iter()
                .filter(|p| group_ids.contains(&"admins".to_string()) || *p == "read")
                .cloned()
                .collect())
        }
    }

    fn authenticated_ctx(groups: AttributeValue, requested: &str) -> NodeContext {
        let mut attributes = HashMap::new();
        attributes.insert("groups".to_string(), groups);
        let mut runtime_data = HashMap::new();
        runtime_data.insert(
            "requested_permissions".to_string(),
            serde_json::Value::String(requested.to_string()),
        );
        NodeContext {
            flow_id: "f1".into(),
            flow_type: castellan_core::FlowKind::Authentication,
            app_id: "app".into(),
            attempt: 1,
            user_input_data: HashMap::new(),
            runtime_data,
            additional_data: HashMap::new(),
            authenticated_user: AuthenticatedUser {
                is_authenticated: true,
                user_id: Some("u1".into()),
                attributes,
                ..Default::default()
            },
            assurance: AssuranceContext::default(),
            user_eligible_for_provisioning: false,
        }
    }

    #[tokio::test]
    async fn string_list_groups_authorize_admin_permissions() {
        let ctx = authenticated_ctx(
            AttributeValue::StringList(vec!["admins".to_string()]),
            "read write",
        );
        let exec = AuthorizationExecutor::new(FakePort);
        let resp = exec.execute(&ctx).await.unwrap();
        let authorized = resp.runtime_data.get("authorized_permissions").unwrap().as_str().unwrap();
        assert_eq!(authorized, "read write");
    }

    #[tokio::test]
    async fn single_string_group_shape_is_accepted() {
        let ctx = authenticated_ctx(AttributeValue::String("members".to_string()), "read write");
        let exec = AuthorizationExecutor::new(FakePort);
        let resp = exec.execute(&ctx).await.unwrap();
        let authorized = resp.runtime_data.get("authorized_permissions").unwrap().as_str().unwrap();
        assert_eq!(authorized, "read");
    }

    #[tokio::test]
    async fn unauthenticated_user_fails() {
        let mut ctx = authenticated_ctx(AttributeValue::String("members".into()), "read");
        ctx.authenticated_user.is_authenticated = false;
        let exec = AuthorizationExecutor::new(FakePort);
        let resp = exec.execute(&ctx).await.unwrap();
        assert_eq!(resp.status, crate::executor::ExecStatus::Failure);
    }
}
