//! The uniform executor contract: prerequisites, required-input
//! resolution, and the `execute`/response shape shared by every concrete
//! authenticator and utility executor. Defaults live as trait default
//! methods rather than a base class, "compose with a shared
//! base struct/record for lifecycle defaults; do not use deep virtual
//! inheritance".

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::{AssuranceContext, AuthenticatedUser};
use serde::{Deserialize, Serialize};

use crate::context::NodeContext;

/// An input an executor may declare as part of `default_inputs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredInput {
    pub name: String,
    pub input_type: String,
    pub required: bool,
}

impl RequiredInput {
    #[must_use]
    pub fn required(name: impl Into<String>, input_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            required: true,
        }
    }
}

/// Terminal-per-turn outcome of `Executor::execute`, restricted to what an
/// executor itself can produce (the engine layers flow-level statuses like
/// `FORWARD` on top).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Complete,
    Incomplete,
    Forward,
    Failure,
}

/// How an INCOMPLETE response should be presented to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    View,
    Redirection,
}

/// Whether an executor participates in the `authenticatedUser` merge
/// (its merge rule: only AUTHENTICATION executors, or
/// `ProvisioningExecutor` under the registration-eligibility condition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Authentication,
    Utility,
}

/// The response produced by one call to `Executor::execute`. The flow
/// engine merges this into the `EngineContext` following its context-merge
/// rules.
#[derive(Debug, Clone)]
pub struct ExecutorResponse {
    pub status: ExecStatus,
    pub response_type: Option<ResponseType>,
    pub required_inputs: Vec<RequiredInput>,
    pub available_actions: Vec<String>,
    pub redirect_url: Option<String>,
    pub additional_data: HashMap<String, serde_json::Value>,
    /// Keys this executor wants written into (or overwriting) runtime data.
    pub runtime_data: HashMap<String, serde_json::Value>,
    pub failure_reason: Option<String>,
    pub authenticated_user: Option<AuthenticatedUser>,
    pub assertion: Option<AssuranceContext>,
}

impl ExecutorResponse {
    #[must_use]
    pub fn complete() -> Self {
        Self {
            status: ExecStatus::Complete,
            response_type: None,
            required_inputs: Vec::new(),
            available_actions: Vec::new(),
            redirect_url: None,
            additional_data: HashMap::new(),
            runtime_data: HashMap::new(),
            failure_reason: None,
            authenticated_user: None,
            assertion: None,
        }
    }

    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: ExecStatus::Failure,
            failure_reason: Some(reason.into()),
            ..Self::complete()
        }
    }

    #[must_use]
    pub fn needs_input(required_inputs: Vec<RequiredInput>) -> Self {
        Self {
            status: ExecStatus::Incomplete,
            response_type: Some(ResponseType::View),
            required_inputs,
            ..Self::complete()
        }
    }

    #[must_use]
    pub fn redirect(url: impl Into<String>, additional_data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            status: ExecStatus::Incomplete,
            response_type: Some(ResponseType::Redirection),
            redirect_url: Some(url.into()),
            additional_data,
            ..Self::complete()
        }
    }

    #[must_use]
    pub fn with_authenticated_user(mut self, user: AuthenticatedUser) -> Self {
        self.authenticated_user = Some(user);
        self
    }

    #[must_use]
    pub fn with_runtime_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.runtime_data.insert(key.into(), value);
        self
    }
}

/// The uniform executor contract.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The name nodes reference this executor by in a graph definition.
    fn name(&self) -> &str;

    /// Whether this executor is an authenticator (participates in the
    /// assurance/AuthenticatedUser merge) or a utility executor.
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Utility
    }

    /// Inputs this executor declares up front, independent of any
    /// particular turn.
    fn default_inputs(&self) -> Vec<RequiredInput> {
        Vec::new()
    }

    /// Inputs that must already exist in runtime/user data before this
    /// executor may run at all. Checked before `execute` by
    /// `check_prerequisites`.
    fn prerequisites(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// `default_inputs` minus whatever is already satisfied for this turn.
    fn required_data(&self, ctx: &NodeContext) -> Vec<RequiredInput> {
        self.default_inputs()
            .into_iter()
            .filter(|input| !ctx.has_input(&input.name))
            .collect()
    }

    /// Populate `resp.required_inputs` with whatever is still missing;
    /// returns `true` when anything is missing.
    fn check_input_data(&self, ctx: &NodeContext, resp: &mut ExecutorResponse) -> bool {
        let missing = self.required_data(ctx);
        let any_missing = !missing.is_empty();
        resp.required_inputs = missing;
        any_missing
    }

    /// Fail with `Prerequisites validation failed` if any declared
    /// prerequisite is absent from both runtime and user input data.
    fn check_prerequisites(&self, ctx: &NodeContext) -> Option<ExecutorResponse> {
        let missing: Vec<&str> = self
            .prerequisites()
            .into_iter()
            .filter(|name| !ctx.has_input(name))
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(ExecutorResponse::failure(format!(
                "Prerequisites validation failed: missing {}",
                missing.join(", ")
            )))
        }
    }

    /// Run the executor's logic for the current turn.
    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError>;
}
