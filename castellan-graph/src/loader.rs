//! Graph loading: parse definition JSON, resolve executors, compute edges,
//! and enforce the structural invariants 1.

use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::model::{FlowGraph, FlowNode, GraphDef};

/// The executor-name resolution boundary the loader validates node
/// executor references against. `castellan-executors`'s registry
/// implements this; the graph crate itself stays free of that dependency.
pub trait ExecutorLookup {
    fn is_registered(&self, name: &str) -> bool;
}

/// Parse one definition file's JSON and materialise it into a validated
/// [`FlowGraph`].
pub fn load_graph(
    json: &str,
    executors: &dyn ExecutorLookup,
) -> Result<FlowGraph, GraphError> {
    let def: GraphDef =
        serde_json::from_str(json).map_err(|e| GraphError::InvalidDefinition(e.to_string()))?;
    build_graph(def, executors)
}

/// Build a node (a factory keyed on node type) and a whole
/// graph from an already-parsed definition, resolving executors and
/// computing the terminal flag for every node.
pub fn build_graph(def: GraphDef, executors: &dyn ExecutorLookup) -> Result<FlowGraph, GraphError> {
    let mut nodes = HashMap::with_capacity(def.nodes.len());

    for node_def in &def.nodes {
        if let Some(executor) = &node_def.executor {
            if !executors.is_registered(&executor.name) {
                return Err(GraphError::ExecutorNotRegistered {
                    graph: def.id.clone(),
                    node: node_def.id.clone(),
                    executor: executor.name.clone(),
                });
            }
        }

        let is_terminal = node_def.next.is_empty();
        nodes.insert(
            node_def.id.clone(),
            FlowNode {
                id: node_def.id.clone(),
                node_type: node_def.node_type,
                properties: node_def.properties.clone(),
                inputs: node_def.inputs.clone(),
                executor_name: node_def.executor.as_ref().map(|e| e.name.clone()),
                next: node_def.next.clone(),
                condition: node_def.condition.clone(),
                is_terminal,
            },
        );
    }

    let start_node_id = find_start_node(&def.id, &nodes)?;
    validate_invariants(&def.id, &nodes)?;

    Ok(FlowGraph {
        id: def.id,
        flow_type: def.flow_type,
        start_node_id,
        nodes,
    })
}

fn find_start_node(
    graph_id: &str,
    nodes: &HashMap<String, FlowNode>,
) -> Result<String, GraphError> {
    let mut has_predecessor: HashSet<&str> = HashSet::new();
    for node in nodes.values() {
        for next in &node.next {
            has_predecessor.insert(next.as_str());
        }
    }

    let mut starts = nodes
        .values()
        .filter(|node| !has_predecessor.contains(node.id.as_str()));

    let start = starts.next().ok_or_else(|| GraphError::InvariantViolated {
        graph: graph_id.to_string(),
        reason: "no node without predecessors (no start candidate)".to_string(),
    })?;

    if starts.next().is_some() {
        return Err(GraphError::InvariantViolated {
            graph: graph_id.to_string(),
            reason: "more than one node has no predecessors".to_string(),
        });
    }

    Ok(start.id.clone())
}

fn validate_invariants(
    graph_id: &str,
    nodes: &HashMap<String, FlowNode>,
) -> Result<(), GraphError> {
    for node in nodes.values() {
        if !node.is_terminal {
            for next in &node.next {
                if !nodes.contains_key(next) {
                    return Err(GraphError::InvariantViolated {
                        graph: graph_id.to_string(),
                        reason: format!(
                            "node {} has an outgoing edge to unknown node {}",
                            node.id, next
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowAll;
    impl ExecutorLookup for AllowAll {
        fn is_registered(&self, _name: &str) -> bool {
            true
        }
    }

    struct AllowNone;
    impl ExecutorLookup for AllowNone {
        fn is_registered(&self, _name: &str) -> bool {
            false
        }
    }

    fn credentials_graph_json() -> &'static str {
        r#"{
            "id": "login",
            "type": "AUTHENTICATION",
            "nodes": [
                { "id": "credentials_prompt", "type": "PROMPT",
                  "inputs": [{"name":"username","type":"string","required":true},
                             {"name":"password","type":"string","required":true}],
                  "executor": {"name": "credentials"},
                  "next": ["auth_success"] },
                { "id": "auth_success", "type": "AUTH_SUCCESS", "next": [] }
            ]
        }"#
    }

    #[test]
    fn loads_a_well_formed_graph() {
        let graph = load_graph(credentials_graph_json(), &AllowAll).unwrap();
        assert_eq!(graph.start_node_id, "credentials_prompt");
        assert!(graph.node("auth_success").unwrap().is_terminal);
        assert!(!graph.node("credentials_prompt").unwrap().is_terminal);
    }

    #[test]
    fn unregistered_executor_fails_the_load() {
        let err = load_graph(credentials_graph_json(), &AllowNone).unwrap_err();
        assert!(matches!(err, GraphError::ExecutorNotRegistered { .. }));
    }

    #[test]
    fn multiple_start_candidates_are_rejected() {
        let json = r#"{
            "id": "broken",
            "type": "AUTHENTICATION",
            "nodes": [
                { "id": "a", "type": "PROMPT", "next": [] },
                { "id": "b", "type": "PROMPT", "next": [] }
            ]
        }"#;
        let err = load_graph(json, &AllowAll).unwrap_err();
        assert!(matches!(err, GraphError::InvariantViolated { .. }));
    }
}
