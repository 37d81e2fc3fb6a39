//! Bootstrap-only graph registry: loaded once at startup, read-only
//! thereafter. Loads every `*.json` definition from a directory,
//! synthesises any missing registration twin, and validates the configured
//! default authentication graph id resolves.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::GraphError;
use crate::loader::{load_graph, ExecutorLookup};
use crate::model::{FlowGraph, FlowType};
use crate::synth::{registration_graph_id, synthesize_registration_graph};

/// The read-only graph map populated once at startup.
pub struct GraphRegistry {
    graphs: HashMap<String, FlowGraph>,
}

impl GraphRegistry {
    /// Build a registry directly from an already-materialised graph map,
    /// skipping directory loading. Used by callers that source graphs from
    /// somewhere other than the filesystem (tests, or a future DB-backed
    /// graph store).
    #[must_use]
    pub fn from_graphs(graphs: HashMap<String, FlowGraph>) -> Self {
        Self { graphs }
    }

    /// Load every `*.json` file in `directory`, then synthesise a
    /// registration twin for any authentication graph that doesn't already
    /// have one named `registration_<id>`.
    pub fn load_directory(
        directory: &Path,
        executors: &dyn ExecutorLookup,
    ) -> Result<Self, GraphError> {
        let mut graphs = HashMap::new();

        let entries = fs::read_dir(directory)
            .map_err(|e| GraphError::InvalidDefinition(format!("{}: {e}", directory.display())))?;

        for entry in entries {
            let entry = entry
                .map_err(|e| GraphError::InvalidDefinition(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let json = fs::read_to_string(&path)
                .map_err(|e| GraphError::InvalidDefinition(format!("{}: {e}", path.display())))?;
            let graph = load_graph(&json, executors)?;
            graphs.insert(graph.id.clone(), graph);
        }

        let authentication_graph_ids: Vec<String> = graphs
            .values()
            .filter(|graph| graph.flow_type == FlowType::Authentication)
            .map(|graph| graph.id.clone())
            .collect();

        for auth_id in authentication_graph_ids {
            let twin_id = registration_graph_id(&auth_id);
            if !graphs.contains_key(&twin_id) {
                let auth_graph = graphs.get(&auth_id).expect("just collected this id");
                let twin = synthesize_registration_graph(auth_graph)?;
                graphs.insert(twin.id.clone(), twin);
            }
        }

        Ok(Self { graphs })
    }

    pub fn resolve(&self, id: &str) -> Option<&FlowGraph> {
        self.graphs.get(id)
    }

    /// Validate the configured default authentication graph id resolves;
    /// call during startup. Refuses to start on failure by returning an
    /// error the caller propagates.
    pub fn validate_default(&self, default_authentication_graph_id: &str) -> Result<(), GraphError> {
        self.graphs
            .get(default_authentication_graph_id)
            .map(|_| ())
            .ok_or_else(|| GraphError::NotFound(default_authentication_graph_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
