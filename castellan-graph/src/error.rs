use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid graph definition JSON: {0}")]
    InvalidDefinition(String),

    #[error("graph {graph} violates invariant: {reason}")]
    InvariantViolated { graph: String, reason: String },

    #[error("graph {graph} references unregistered executor {executor} on node {node}")]
    ExecutorNotRegistered {
        graph: String,
        node: String,
        executor: String,
    },

    #[error("graph {0} not found")]
    NotFound(String),
}
