//! Registration graph synthesis.
//!
//! For every loaded AUTHENTICATION graph with no explicit
//! `registration_<suffix>` twin, synthesise one: deep-copy nodes and edges,
//! insert a `ProvisioningExecutor` node before every terminal, and prepend a
//! `RegistrationStart` node as the new root.

use std::collections::HashMap;

use crate::error::GraphError;
use crate::model::{FlowGraph, FlowNode, FlowType, NodeType};

const PROVISIONING_EXECUTOR: &str = "ProvisioningExecutor";

/// The conventional suffix used to derive a registration graph's id from its
/// authentication twin's id (`login` -> `registration_login`).
pub fn registration_graph_id(authentication_graph_id: &str) -> String {
    format!("registration_{authentication_graph_id}")
}

/// Synthesise the registration twin of an authentication graph.
pub fn synthesize_registration_graph(auth_graph: &FlowGraph) -> Result<FlowGraph, GraphError> {
    if auth_graph.flow_type != FlowType::Authentication {
        return Err(GraphError::InvariantViolated {
            graph: auth_graph.id.clone(),
            reason: "registration graphs can only be synthesised from an AUTHENTICATION graph"
                .to_string(),
        });
    }

    let mut nodes: HashMap<String, FlowNode> = auth_graph.nodes.clone();
    let terminal_ids: Vec<String> = nodes
        .values()
        .filter(|node| node.is_terminal)
        .map(|node| node.id.clone())
        .collect();

    for terminal_id in &terminal_ids {
        let provisioning_id = format!("provisioning_{terminal_id}");

        // Rewire every edge that used to end at the terminal so it ends at
        // the new provisioning node instead.
        for node in nodes.values_mut() {
            for next in node.next.iter_mut() {
                if next == terminal_id {
                    *next = provisioning_id.clone();
                }
            }
        }

        nodes.insert(
            provisioning_id.clone(),
            FlowNode {
                id: provisioning_id.clone(),
                node_type: NodeType::TaskExecution,
                properties: None,
                inputs: Vec::new(),
                executor_name: Some(PROVISIONING_EXECUTOR.to_string()),
                next: vec![terminal_id.clone()],
                condition: None,
                is_terminal: false,
            },
        );
    }

    let registration_start_id = "registration_start".to_string();
    nodes.insert(
        registration_start_id.clone(),
        FlowNode {
            id: registration_start_id.clone(),
            node_type: NodeType::RegistrationStart,
            properties: None,
            inputs: Vec::new(),
            executor_name: None,
            next: vec![auth_graph.start_node_id.clone()],
            condition: None,
            is_terminal: false,
        },
    );

    Ok(FlowGraph {
        id: registration_graph_id(&auth_graph.id),
        flow_type: FlowType::Registration,
        start_node_id: registration_start_id,
        nodes,
    })
}
