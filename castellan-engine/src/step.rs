//! The per-turn outcome the flow engine hands back to its caller (the
//! OAuth2 authorization endpoint, or any other flow-driving surface).

use std::collections::HashMap;

use castellan_core::{AssuranceContext, AuthenticatedUser};
use castellan_executors::RequiredInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStepStatus {
    Complete,
    Incomplete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStepType {
    View,
    Redirection,
}

/// What a flow turn produced. Exactly one of `required_inputs` /
/// `redirect_url` is meaningful, selected by `step_type`.
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub flow_id: String,
    pub status: FlowStepStatus,
    pub step_type: Option<FlowStepType>,
    pub required_inputs: Vec<RequiredInput>,
    pub available_actions: Vec<String>,
    pub redirect_url: Option<String>,
    pub additional_data: HashMap<String, serde_json::Value>,
    pub failure_reason: Option<String>,
    pub authenticated_user: Option<AuthenticatedUser>,
    pub assurance: Option<AssuranceContext>,
}

impl FlowStep {
    #[must_use]
    pub fn complete(flow_id: impl Into<String>, user: AuthenticatedUser, assurance: AssuranceContext) -> Self {
        Self {
            flow_id: flow_id.into(),
            status: FlowStepStatus::Complete,
            step_type: None,
            required_inputs: Vec::new(),
            available_actions: Vec::new(),
            redirect_url: None,
            additional_data: HashMap::new(),
            failure_reason: None,
            authenticated_user: Some(user),
            assurance: Some(assurance),
        }
    }

    #[must_use]
    pub fn error(flow_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            status: FlowStepStatus::Error,
            step_type: None,
            required_inputs: Vec::new(),
            available_actions: Vec::new(),
            redirect_url: None,
            additional_data: HashMap::new(),
            failure_reason: Some(reason.into()),
            authenticated_user: None,
            assurance: None,
        }
    }
}
