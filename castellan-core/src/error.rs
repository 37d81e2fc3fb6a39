use thiserror::Error;

/// Errors that can occur while authenticating a user or exchanging a federated
/// identity.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The upstream identity provider (or executor-internal collaborator)
    /// reported a problem.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Credentials were well-formed but did not authenticate.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A one-time code, authorization code, or assertion did not validate.
    #[error("Invalid code")]
    InvalidCode,

    /// The state returned by an upstream redirect did not match the one we issued.
    #[error("CSRF state mismatch")]
    CsrfMismatch,

    /// Transport-level failure talking to a collaborator.
    #[error("Network error: {0}")]
    Network(String),

    /// A flow-scoped session or flow-store operation failed.
    #[error("Session error: {0}")]
    Session(String),

    /// Token issuance or validation failed.
    #[error("Token error: {0}")]
    Token(String),

    /// Prerequisites for an executor were not satisfied.
    #[error("Prerequisites validation failed: {0}")]
    PrerequisitesNotMet(String),
}

/// Errors raised while computing or verifying an [`crate::assurance::AssuranceContext`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssuranceError {
    /// `verify` was called with a null/absent assurance context.
    #[error("no assurance context is attached to the current user")]
    NilAssuranceContext,

    /// `verify` was called without any AAL or IAL requirement.
    #[error("no assurance requirements were supplied")]
    NoAssuranceRequirements,

    /// The attached context does not meet the requested level.
    #[error("assurance context does not meet the requested level")]
    InsufficientAssurance,
}

/// Hard errors that abort a flow turn and mark the flow as terminated with
/// `ERROR`, as opposed to the soft `FAILURE` status an executor can return
/// from inside a turn.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The flow-id named in the request has no corresponding stored context,
    /// or its TTL has expired.
    #[error("flow not found: {0}")]
    FlowNotFound(String),

    /// The named graph id does not resolve in the loaded graph set.
    #[error("flow graph not found: {0}")]
    GraphNotFound(String),

    /// A node referenced an executor name that isn't registered.
    #[error("executor not registered: {0}")]
    ExecutorNotRegistered(String),

    /// A DECISION node returned a `next_node_id` that isn't one of its
    /// declared outgoing edges, or a non-decision node had more than one
    /// outgoing edge (a flow-configuration error).
    #[error("invalid flow transition from node {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The graph failed a structural invariant (single start, terminal with
    /// no outgoing edges, every non-terminal node has >=1 outgoing edge, ...).
    #[error("flow graph invariant violated: {0}")]
    InvalidGraph(String),

    /// A concurrent turn was already in flight for this flow-id (per-flow
    /// lease contention).
    #[error("flow {0} is already being driven by another turn")]
    FlowLeaseHeld(String),

    /// An executor produced a hard (non-recoverable) error.
    #[error("executor error: {0}")]
    Executor(#[from] AuthError),

    /// The inbound request was cancelled mid-turn.
    #[error("flow turn cancelled")]
    Cancelled,

    /// The flow or authorization-code store backend failed (serialization,
    /// connection, or otherwise) in a way unrelated to the key itself.
    #[error("flow store error: {0}")]
    Store(String),
}

/// Errors returned by `AuthenticationStrategy` / `Authenticator` chains used
/// to guard the management plane.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_messages_include_the_provider_detail() {
        let err = AuthError::Provider("upstream timed out".to_string());
        assert_eq!(err.to_string(), "Provider error: upstream timed out");
    }

    #[test]
    fn engine_error_wraps_an_executor_auth_error_via_from() {
        let err: EngineError = AuthError::InvalidCredentials.into();
        assert!(matches!(err, EngineError::Executor(AuthError::InvalidCredentials)));
        assert_eq!(err.to_string(), "executor error: Invalid credentials");
    }

    #[test]
    fn guard_error_transparently_wraps_an_auth_error() {
        let err: GuardError = AuthError::CsrfMismatch.into();
        assert_eq!(err.to_string(), "CSRF state mismatch");
    }

    #[test]
    fn invalid_transition_formats_both_node_ids() {
        let err = EngineError::InvalidTransition {
            from: "credentials_prompt".to_string(),
            to: "nowhere".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid flow transition from node credentials_prompt to nowhere"
        );
    }
}
