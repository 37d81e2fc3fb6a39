//! The organizational-unit-creation utility executor. Only
//! runs in REGISTRATION flows. Organizational-unit management itself is an
//! external collaborator; this executor only maps its
//! error shapes onto user-visible failure reasons.

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::FlowKind;

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorResponse, RequiredInput};

/// Outcome shapes the OU service can report (its translation table).
#[derive(Debug, Clone)]
pub enum OuServiceError {
    NameConflict,
    HandleConflict,
    Client(String),
    Server(String),
}

#[async_trait]
pub trait OuService: Send + Sync {
    async fn create(
        &self,
        name: &str,
        handle: &str,
        description: Option<&str>,
    ) -> Result<String, OuServiceError>;
}

pub struct OuCreationExecutor<S> {
    service: S,
}

impl<S: OuService> OuCreationExecutor<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: OuService> Executor for OuCreationExecutor<S> {
    fn name(&self) -> &str {
        "ou-creation"
    }

    fn default_inputs(&self) -> Vec<RequiredInput> {
        vec![
            RequiredInput::required("ouName", "string"),
            RequiredInput::required("ouHandle", "string"),
            RequiredInput {
                name: "ouDescription".to_string(),
                input_type: "string".to_string(),
                required: false,
            },
        ]
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        if ctx.flow_type != FlowKind::Registration {
            return Ok(ExecutorResponse::failure(
                "ou-creation executor only runs in REGISTRATION flows",
            ));
        }

        let mut resp = ExecutorResponse::complete();
        if self.check_input_data(ctx, &mut resp) {
            resp.status = crate::executor::ExecStatus::Incomplete;
            resp.response_type = Some(crate::executor::ResponseType::View);
            return Ok(resp);
        }

        let name = ctx.input("ouName").unwrap_or_default();
        let handle = ctx.input("ouHandle").unwrap_or_default();
        let description = ctx.input("ouDescription");

        match self.service.create(name, handle, description).await {
            Ok(ou_id) => Ok(ExecutorResponse::complete()
                .with_runtime_data("ou_id", serde_json::Value::String(ou_id))),
            Err(OuServiceError::NameConflict) => {
                Ok(ExecutorResponse::failure("same name exists"))
            }
            Err(OuServiceError::HandleConflict) => {
                Ok(ExecutorResponse::failure("same handle exists"))
            }
            Err(OuServiceError::Client(desc)) => Ok(ExecutorResponse::failure(format!(
                "Failed to create organization unit: {desc}"
            ))),
            Err(OuServiceError::Server(desc)) => {
                Err(AuthError::Provider(format!("ou service error: {desc}")))
            }
        }
    }
}
