//! The flow-driving loop: advances one flow by exactly one turn, suspending
//! on INCOMPLETE and returning a definite [`FlowStep`] otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use castellan_assurance::{AssuranceEngine, AuthenticatorRegistry};
use castellan_core::error::EngineError;
use castellan_core::observability::{FlowEvent, NoopObservability, ObservabilityPort};
use castellan_core::FlowKind;
use castellan_executors::{
    ExecStatus, Executor, ExecutorKind, ExecutorRegistry, NodeContext, ResponseType,
    PROVISIONING_EXECUTOR_NAME,
};
use castellan_graph::{FlowNode, GraphRegistry, NodeType};
use castellan_store::{LeaseGuard, LeaseStore, Store, StoreError};
use chrono::Utc;
use uuid::Uuid;

use crate::context::EngineContext;
use crate::step::{FlowStep, FlowStepStatus, FlowStepType};

const NEXT_NODE_ID_KEY: &str = "next_node_id";

fn store_err(e: StoreError) -> EngineError {
    match e {
        StoreError::NotFound(key) => EngineError::FlowNotFound(key),
        StoreError::LeaseHeld(key) => EngineError::FlowLeaseHeld(key),
        other => EngineError::Store(other.to_string()),
    }
}

/// Drives flows over a loaded graph set and executor registry, persisting
/// per-flow state in `S` and serialising turns per flow-id via `S`'s
/// [`LeaseStore`] half.
pub struct FlowEngine<S> {
    graphs: Arc<GraphRegistry>,
    executors: Arc<ExecutorRegistry>,
    authenticators: Arc<AuthenticatorRegistry>,
    store: Arc<S>,
    observability: Arc<dyn ObservabilityPort>,
    flow_ttl: Duration,
}

impl<S> FlowEngine<S>
where
    S: Store<EngineContext> + LeaseStore,
{
    pub fn new(
        graphs: Arc<GraphRegistry>,
        executors: Arc<ExecutorRegistry>,
        authenticators: Arc<AuthenticatorRegistry>,
        store: Arc<S>,
        flow_ttl: Duration,
    ) -> Self {
        Self {
            graphs,
            executors,
            authenticators,
            store,
            observability: Arc::new(NoopObservability),
            flow_ttl,
        }
    }

    #[must_use]
    pub fn with_observability(mut self, observability: Arc<dyn ObservabilityPort>) -> Self {
        self.observability = observability;
        self
    }

    /// Start a new flow against `graph_id` and drive its first turn.
    pub async fn start(
        &self,
        graph_id: &str,
        app_id: &str,
        user_input: HashMap<String, String>,
    ) -> Result<FlowStep, EngineError> {
        let graph = self
            .graphs
            .resolve(graph_id)
            .ok_or_else(|| EngineError::GraphNotFound(graph_id.to_string()))?;

        let flow_id = Uuid::new_v4().to_string();
        let mut ctx = EngineContext::new(
            flow_id.clone(),
            graph_id.to_string(),
            graph.flow_type,
            app_id.to_string(),
        );
        ctx.current_node_id = Some(graph.start_node_id.clone());

        self.observability.emit(FlowEvent::FlowStarted {
            flow_id: flow_id.clone(),
            flow_type: format!("{:?}", graph.flow_type),
            app_id: app_id.to_string(),
            at: Utc::now(),
        });

        self.drive_leased(&mut ctx, user_input).await
    }

    /// Resume a previously suspended flow with this turn's user input.
    pub async fn resume(
        &self,
        flow_id: &str,
        user_input: HashMap<String, String>,
    ) -> Result<FlowStep, EngineError> {
        let mut ctx = self
            .store
            .get(flow_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::FlowNotFound(flow_id.to_string()))?;

        if ctx.current_node_id.is_none() {
            return Err(EngineError::FlowNotFound(flow_id.to_string()));
        }

        self.drive_leased(&mut ctx, user_input).await
    }

    async fn drive_leased(
        &self,
        ctx: &mut EngineContext,
        user_input: HashMap<String, String>,
    ) -> Result<FlowStep, EngineError> {
        let lease = LeaseGuard::acquire(&*self.store, ctx.flow_id.clone())
            .await
            .map_err(store_err)?;

        let result = self.drive(ctx, user_input).await;

        match &result {
            Ok(step) if step.status == FlowStepStatus::Error => {
                self.observability.emit(FlowEvent::FlowFailed {
                    flow_id: ctx.flow_id.clone(),
                    error_code: step.failure_reason.clone().unwrap_or_default(),
                    at: Utc::now(),
                });
            }
            Ok(step) if step.status == FlowStepStatus::Complete => {
                self.observability.emit(FlowEvent::FlowCompleted {
                    flow_id: ctx.flow_id.clone(),
                    at: Utc::now(),
                });
            }
            _ => {}
        }

        // Persist regardless of outcome so a suspended or failed-but-
        // retryable flow can be resumed; a hard error still leaves the
        // last-good context recoverable until TTL.
        self.store
            .put(&ctx.flow_id, ctx.clone(), self.flow_ttl)
            .await
            .map_err(store_err)?;

        lease.release().await;
        result
    }

    /// Drive the flow from `ctx.current_node_id` until it suspends,
    /// completes, or fails. Does not itself persist or lease — callers use
    /// [`Self::drive_leased`].
    async fn drive(
        &self,
        ctx: &mut EngineContext,
        user_input: HashMap<String, String>,
    ) -> Result<FlowStep, EngineError> {
        let graph = self
            .graphs
            .resolve(&ctx.graph_id)
            .ok_or_else(|| EngineError::GraphNotFound(ctx.graph_id.clone()))?;

        let mut current_node_id = ctx
            .current_node_id
            .clone()
            .unwrap_or_else(|| graph.start_node_id.clone());
        let mut turn_input = Some(user_input);
        // Unioned across every node visited this turn (a FORWARD chain may
        // cross several nodes before the turn actually suspends); new keys
        // win on conflict per the additionalData merge rule.
        let mut turn_additional_data: HashMap<String, serde_json::Value> = HashMap::new();

        loop {
            let node = graph
                .node(&current_node_id)
                .ok_or_else(|| EngineError::InvalidGraph(format!("unknown node {current_node_id}")))?;

            if let Some(condition) = &node.condition {
                let matches = ctx.runtime_data.get(&condition.key) == Some(&condition.value);
                if !matches {
                    current_node_id = condition.on_skip.clone();
                    continue;
                }
            }

            self.observability.emit(FlowEvent::NodeStarted {
                flow_id: ctx.flow_id.clone(),
                node_id: node.id.clone(),
                node_type: format!("{:?}", node.node_type),
                attempt: *ctx.attempts.get(&node.id).unwrap_or(&0),
                at: Utc::now(),
            });

            let Some(executor_name) = node.executor_name.clone() else {
                // No-executor structural nodes (RegistrationStart, or a
                // terminal AUTH_SUCCESS) advance or complete directly.
                if node.is_terminal {
                    ctx.current_node_id = None;
                    ctx.current_action = None;
                    return Ok(FlowStep::complete(
                        ctx.flow_id.clone(),
                        ctx.authenticated_user.clone(),
                        ctx.assurance.clone(),
                    ));
                }
                current_node_id = single_outgoing_edge(node)?;
                continue;
            };

            let executor = self
                .executors
                .lookup(&executor_name)
                .ok_or_else(|| EngineError::ExecutorNotRegistered(executor_name.clone()))?;

            let attempt = ctx.next_attempt(&node.id);
            let node_ctx = NodeContext {
                flow_id: ctx.flow_id.clone(),
                flow_type: ctx.flow_type,
                app_id: ctx.app_id.clone(),
                attempt,
                user_input_data: turn_input.take().unwrap_or_default(),
                runtime_data: ctx.runtime_data.clone(),
                additional_data: HashMap::new(),
                authenticated_user: ctx.authenticated_user.clone(),
                assurance: ctx.assurance.clone(),
                user_eligible_for_provisioning: ctx.user_eligible_for_provisioning,
            };

            if let Some(failure) = executor.check_prerequisites(&node_ctx) {
                ctx.current_node_id = Some(node.id.clone());
                ctx.current_action = Some(node.id.clone());
                return Ok(failure_step(ctx, failure.failure_reason));
            }

            let response = executor
                .execute(&node_ctx)
                .await
                .map_err(EngineError::Executor)?;

            self.merge_response(ctx, node, &*executor, &response);
            turn_additional_data.extend(response.additional_data.clone());

            match response.status {
                ExecStatus::Complete => {
                    if node.is_terminal {
                        ctx.current_node_id = None;
                        ctx.current_action = None;
                        return Ok(FlowStep::complete(
                            ctx.flow_id.clone(),
                            ctx.authenticated_user.clone(),
                            ctx.assurance.clone(),
                        ));
                    }
                    current_node_id = self.next_node(node, &response)?;
                    continue;
                }
                ExecStatus::Forward => {
                    current_node_id = self.next_node(node, &response)?;
                    continue;
                }
                ExecStatus::Incomplete => {
                    ctx.current_node_id = Some(node.id.clone());
                    ctx.current_action = Some(node.id.clone());
                    let step_type = match response.response_type {
                        Some(ResponseType::Redirection) => FlowStepType::Redirection,
                        _ => FlowStepType::View,
                    };
                    return Ok(FlowStep {
                        flow_id: ctx.flow_id.clone(),
                        status: FlowStepStatus::Incomplete,
                        step_type: Some(step_type),
                        required_inputs: response.required_inputs,
                        available_actions: response.available_actions,
                        redirect_url: response.redirect_url,
                        additional_data: turn_additional_data,
                        failure_reason: None,
                        authenticated_user: None,
                        assurance: None,
                    });
                }
                ExecStatus::Failure => {
                    ctx.current_node_id = Some(node.id.clone());
                    ctx.current_action = Some(node.id.clone());
                    return Ok(failure_step(ctx, response.failure_reason));
                }
            }
        }
    }

    /// Apply the context-merge rules for one executor response.
    fn merge_response(
        &self,
        ctx: &mut EngineContext,
        node: &FlowNode,
        executor: &dyn Executor,
        response: &castellan_executors::ExecutorResponse,
    ) {
        for (key, value) in &response.runtime_data {
            if key == "userID" && ctx.runtime_data.contains_key("userID") {
                continue;
            }
            ctx.runtime_data.insert(key.clone(), value.clone());
        }

        let provisioning_allowed = executor.name() == PROVISIONING_EXECUTOR_NAME
            && (ctx.flow_type == FlowKind::Registration
                || (ctx.flow_type == FlowKind::Authentication && ctx.user_eligible_for_provisioning));

        if executor.kind() == ExecutorKind::Authentication || provisioning_allowed {
            if let Some(user) = &response.authenticated_user {
                ctx.authenticated_user.merge(user.clone());

                if executor.kind() == ExecutorKind::Authentication {
                    let engine = AssuranceEngine::new(&self.authenticators);
                    ctx.assurance = engine.update(
                        ctx.assurance.clone(),
                        executor.name(),
                        *ctx.attempts.get(&node.id).unwrap_or(&1),
                    );
                }
            }
        }

        if let Some(assertion) = &response.assertion {
            ctx.assurance = assertion.clone();
        }
    }

    fn next_node(
        &self,
        node: &FlowNode,
        response: &castellan_executors::ExecutorResponse,
    ) -> Result<String, EngineError> {
        if node.node_type == NodeType::Decision {
            let next = response
                .additional_data
                .get(NEXT_NODE_ID_KEY)
                .and_then(|value| value.as_str())
                .ok_or_else(|| {
                    EngineError::InvalidGraph(format!(
                        "decision node {} did not supply {NEXT_NODE_ID_KEY}",
                        node.id
                    ))
                })?;
            if !node.next.iter().any(|candidate| candidate == next) {
                return Err(EngineError::InvalidTransition {
                    from: node.id.clone(),
                    to: next.to_string(),
                });
            }
            return Ok(next.to_string());
        }

        single_outgoing_edge(node)
    }
}

fn single_outgoing_edge(node: &FlowNode) -> Result<String, EngineError> {
    match node.next.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(EngineError::InvalidGraph(format!(
            "node {} has no outgoing edge but is not terminal",
            node.id
        ))),
        _ => Err(EngineError::InvalidGraph(format!(
            "node {} has more than one outgoing edge but is not a DECISION node",
            node.id
        ))),
    }
}

fn failure_step(ctx: &EngineContext, reason: Option<String>) -> FlowStep {
    FlowStep::error(
        ctx.flow_id.clone(),
        reason.unwrap_or_else(|| "executor failure".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use castellan_core::error::AuthError;
    use castellan_core::{AuthenticationFactor, AuthenticatorMeta};
    use castellan_executors::{ExecutorResponse, RequiredInput};
    use castellan_graph::loader::build_graph;
    use castellan_graph::model::GraphDef;
    use std::time::Duration;

    struct AllowAll;
    impl castellan_graph::ExecutorLookup for AllowAll {
        fn is_registered(&self, _name: &str) -> bool {
            true
        }
    }

    /// Two-turn credentials stand-in: INCOMPLETE until `username`+`password`
    /// are both present, then COMPLETE with an authenticated user.
    struct Credentials;
    #[async_trait]
    impl Executor for Credentials {
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
                return Ok(ExecutorResponse::needs_input(resp.required_inputs));
            }
            let mut user = castellan_core::AuthenticatedUser::new();
            user.is_authenticated = true;
            user.user_id = Some(ctx.input("username").unwrap().to_string());
            Ok(ExecutorResponse::complete().with_authenticated_user(user))
        }
    }

    fn login_graph() -> castellan_graph::FlowGraph {
        let def: GraphDef = serde_json::from_str(
            r#"{
                "id": "login",
                "type": "AUTHENTICATION",
                "nodes": [
                    { "id": "credentials_prompt", "type": "PROMPT",
                      "executor": {"name": "credentials"}, "next": ["auth_success"] },
                    { "id": "auth_success", "type": "AUTH_SUCCESS", "next": [] }
                ]
            }"#,
        )
        .unwrap();
        build_graph(def, &AllowAll).unwrap()
    }

    fn engine_for(graph: castellan_graph::FlowGraph) -> FlowEngine<castellan_store::InMemoryStore<EngineContext>> {
        let mut graphs = HashMap::new();
        graphs.insert(graph.id.clone(), graph);
        let graphs = Arc::new(castellan_graph::GraphRegistry::from_graphs(graphs));

        let mut executors = ExecutorRegistry::new();
        executors.register(Arc::new(Credentials));

        let authenticators = AuthenticatorRegistry::new();
        authenticators.register(AuthenticatorMeta {
            name: "credentials".into(),
            factors: vec![AuthenticationFactor::Knowledge],
            idp_type: None,
        });

        FlowEngine::new(
            graphs,
            Arc::new(executors),
            Arc::new(authenticators),
            Arc::new(castellan_store::InMemoryStore::new()),
            Duration::from_secs(900),
        )
    }

    #[tokio::test]
    async fn suspends_then_completes_across_two_turns() {
        let engine = engine_for(login_graph());

        let first = engine
            .start("login", "app-1", HashMap::new())
            .await
            .unwrap();
        assert_eq!(first.status, FlowStepStatus::Incomplete);
        assert_eq!(first.required_inputs.len(), 2);

        let mut input = HashMap::new();
        input.insert("username".to_string(), "alice".to_string());
        input.insert("password".to_string(), "hunter2".to_string());
        let second = engine.resume(&first.flow_id, input).await.unwrap();

        assert_eq!(second.status, FlowStepStatus::Complete);
        assert!(second.authenticated_user.unwrap().is_authenticated);
    }

    #[tokio::test]
    async fn second_concurrent_turn_is_rejected_while_a_lease_is_held() {
        let engine = engine_for(login_graph());
        let first = engine
            .start("login", "app-1", HashMap::new())
            .await
            .unwrap();

        let lease = LeaseGuard::acquire(&*engine.store, first.flow_id.clone())
            .await
            .unwrap();

        let err = engine.resume(&first.flow_id, HashMap::new()).await;
        assert!(matches!(err, Err(EngineError::FlowLeaseHeld(_))));

        lease.release().await;
    }
}
