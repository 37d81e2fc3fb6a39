//! The executor-facing view of a flow turn, derived from the engine's full
//! context. `castellan-engine` owns the full `EngineContext`; this crate
//! only needs the subset an executor actually reads, which keeps the
//! dependency edge pointing the other way (engine depends on executors, not
//! vice versa).

use std::collections::HashMap;

use castellan_core::{AssuranceContext, AuthenticatedUser, FlowKind};

/// Everything an executor's `execute` needs to know about the turn it is
/// running inside.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub flow_id: String,
    pub flow_type: FlowKind,
    pub app_id: String,
    /// 1-based count of how many times this node has been entered.
    pub attempt: u32,
    /// Single-turn input submitted by the caller for this turn only.
    pub user_input_data: HashMap<String, String>,
    /// Cross-turn state, merged rules.
    pub runtime_data: HashMap<String, serde_json::Value>,
    /// Opaque per-turn payload carried for the client (challenge blobs, etc).
    pub additional_data: HashMap<String, serde_json::Value>,
    pub authenticated_user: AuthenticatedUser,
    pub assurance: AssuranceContext,
    /// Whether the current authenticated (but not-yet-provisioned) user is
    /// eligible for provisioning — its `userEligibleForProvisioning`
    /// merge-rule condition.
    pub user_eligible_for_provisioning: bool,
}

impl NodeContext {
    /// A required input is already satisfied if it appears in either the
    /// current turn's user input or the accumulated runtime data.
    #[must_use]
    pub fn has_input(&self, name: &str) -> bool {
        self.user_input_data.contains_key(name) || self.runtime_data.contains_key(name)
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<&str> {
        self.user_input_data.get(name).map(String::as_str)
    }
}
