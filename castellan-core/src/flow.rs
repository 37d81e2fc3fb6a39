//! The two flow kinds a graph, an engine context, and an executor all agree
//! on. Lives in `castellan-core` rather than `castellan-graph` so
//! `castellan-executors` can reason about "is this a registration flow"
//! (the credentials and OU-creation executors both branch on it) without
//! depending on the graph crate.

use serde::{Deserialize, Serialize};

/// Whether the current flow is authenticating an existing user or
/// registering a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowKind {
    Authentication,
    Registration,
}

impl FlowKind {
    #[must_use]
    pub const fn is_registration(self) -> bool {
        matches!(self, Self::Registration)
    }
}
