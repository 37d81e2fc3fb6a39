//! # Castellan Graph
//!
//! The declarative flow graph model: the JSON definition format, the loader
//! that validates structural invariants (single start node, no dangling
//! edges, every executor reference resolves), and registration-graph
//! synthesis (insert a `ProvisioningExecutor` node before every terminal,
//! prepend a `RegistrationStart` root).

#![allow(missing_docs)]

pub mod error;
pub mod loader;
pub mod model;
pub mod registry;
pub mod synth;

pub use error::GraphError;
pub use loader::{build_graph, load_graph, ExecutorLookup};
pub use model::{
    DeclaredInput, ExecutorRef, FlowGraph, FlowNode, FlowNodeDef, FlowType, GraphDef,
    NodeCondition, NodeType,
};
pub use registry::GraphRegistry;
pub use synth::{registration_graph_id, synthesize_registration_graph};
