//! The full engine-owned state for one flow, persisted between turns via
//! `castellan-store`. `castellan_executors::NodeContext` is derived from this
//! on each node invocation; this struct carries the superset an executor
//! never needs to see directly (attempt counters, the current node,
//! per-flow bookkeeping).

use std::collections::HashMap;

use castellan_core::{AssuranceContext, AuthenticatedUser, FlowKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted, per-flow engine state. One record per flow-id in the flow
/// store; mutated in place by [`crate::engine::FlowEngine::drive`] and
/// written back at the end of every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineContext {
    pub flow_id: String,
    pub graph_id: String,
    pub flow_type: FlowKind,
    pub app_id: String,
    /// `None` before the first turn; set to the suspension node's id while
    /// a flow is awaiting input, cleared again on COMPLETE.
    pub current_node_id: Option<String>,
    /// 1-based entry count per node id, used as the executor's `attempt`.
    pub attempts: HashMap<String, u32>,
    pub runtime_data: HashMap<String, serde_json::Value>,
    pub authenticated_user: AuthenticatedUser,
    pub assurance: AssuranceContext,
    /// `userEligibleForProvisioning` — an AUTHENTICATION-flow context's
    /// permission for `ProvisioningExecutor` to still merge its output (the
    /// "new user allowed to self-register mid-login" case).
    pub user_eligible_for_provisioning: bool,
    /// The node id the caller is currently expected to act on; cleared on
    /// COMPLETE/FORWARD, preserved on INCOMPLETE.
    pub current_action: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EngineContext {
    #[must_use]
    pub fn new(flow_id: String, graph_id: String, flow_type: FlowKind, app_id: String) -> Self {
        Self {
            flow_id,
            graph_id,
            flow_type,
            app_id,
            current_node_id: None,
            attempts: HashMap::new(),
            runtime_data: HashMap::new(),
            authenticated_user: AuthenticatedUser::default(),
            assurance: AssuranceContext::default(),
            user_eligible_for_provisioning: false,
            current_action: None,
            created_at: Utc::now(),
        }
    }

    /// Increment and return this node's attempt counter.
    pub fn next_attempt(&mut self, node_id: &str) -> u32 {
        let counter = self.attempts.entry(node_id.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EngineContext {
        EngineContext::new("flow-1".into(), "login".into(), FlowKind::Authentication, "app-1".into())
    }

    #[test]
    fn first_attempt_at_a_node_is_one() {
        let mut ctx = ctx();
        assert_eq!(ctx.next_attempt("credentials_prompt"), 1);
    }

    #[test]
    fn repeated_attempts_at_the_same_node_increment() {
        let mut ctx = ctx();
        ctx.next_attempt("credentials_prompt");
        ctx.next_attempt("credentials_prompt");
        assert_eq!(ctx.next_attempt("credentials_prompt"), 3);
    }

    #[test]
    fn attempt_counters_are_independent_per_node() {
        let mut ctx = ctx();
        ctx.next_attempt("credentials_prompt");
        ctx.next_attempt("credentials_prompt");
        assert_eq!(ctx.next_attempt("otp_prompt"), 1);
    }
}
