//! Injected observability port: flow-started, node-started, flow-completed,
//! and flow-failed events. A no-op implementation must be accepted;
//! `TracingObservability` is the idiomatic non-no-op default.

use chrono::{DateTime, Utc};

/// One of the four lifecycle events the flow engine emits.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    FlowStarted {
        flow_id: String,
        flow_type: String,
        app_id: String,
        at: DateTime<Utc>,
    },
    NodeStarted {
        flow_id: String,
        node_id: String,
        node_type: String,
        attempt: u32,
        at: DateTime<Utc>,
    },
    FlowCompleted {
        flow_id: String,
        at: DateTime<Utc>,
    },
    FlowFailed {
        flow_id: String,
        error_code: String,
        at: DateTime<Utc>,
    },
}

/// The injected observability collaborator. Flow execution never branches
/// on whether observability succeeded; `emit` does not return a `Result`.
pub trait ObservabilityPort: Send + Sync {
    fn emit(&self, event: FlowEvent);
}

/// The default "nothing is wired up" implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObservability;

impl ObservabilityPort for NoopObservability {
    fn emit(&self, _event: FlowEvent) {}
}

/// Emits each event as a `tracing` event at `info` (completed) or `warn`
/// (failed) level, structured the way the rest of the workspace logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservability;

impl ObservabilityPort for TracingObservability {
    fn emit(&self, event: FlowEvent) {
        match event {
            FlowEvent::FlowStarted {
                flow_id,
                flow_type,
                app_id,
                at,
            } => {
                tracing::info!(flow_id, flow_type, app_id, started_at = %at, "flow started");
            }
            FlowEvent::NodeStarted {
                flow_id,
                node_id,
                node_type,
                attempt,
                at,
            } => {
                tracing::debug!(flow_id, node_id, node_type, attempt, started_at = %at, "node started");
            }
            FlowEvent::FlowCompleted { flow_id, at } => {
                tracing::info!(flow_id, completed_at = %at, "flow completed");
            }
            FlowEvent::FlowFailed {
                flow_id,
                error_code,
                at,
            } => {
                tracing::warn!(flow_id, error_code, failed_at = %at, "flow failed");
            }
        }
    }
}
