//! Flow graph data model and its JSON definition format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Re-exported from `castellan-core` so executors can reason about flow
/// kind without depending on the graph crate; the wire shape
/// (`"AUTHENTICATION"`/`"REGISTRATION"`) is unchanged.
pub use castellan_core::FlowKind as FlowType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Prompt,
    TaskExecution,
    Decision,
    AuthSuccess,
    RegistrationStart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorRef {
    pub name: String,
}

/// `{key, value, onSkip}`: if `ctx.runtimeData[key] != value`, the engine
/// jumps straight to the node named by `on_skip` without invoking this
/// node's executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCondition {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(rename = "onSkip")]
    pub on_skip: String,
}

/// One node as it appears in a graph definition file, before materialisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNodeDef {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
    #[serde(default)]
    pub inputs: Vec<DeclaredInput>,
    #[serde(default)]
    pub executor: Option<ExecutorRef>,
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default)]
    pub condition: Option<NodeCondition>,
}

/// A full graph definition file: `{id, type, nodes[]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDef {
    pub id: String,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    pub nodes: Vec<FlowNodeDef>,
}

/// A materialised, validated node: the definition plus the `is_terminal`
/// flag computed by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub node_type: NodeType,
    pub properties: Option<serde_json::Value>,
    pub inputs: Vec<DeclaredInput>,
    pub executor_name: Option<String>,
    pub next: Vec<String>,
    pub condition: Option<NodeCondition>,
    pub is_terminal: bool,
}

/// A loaded or synthesised, structurally validated flow graph.
/// Edges are stored as id lists, never pointers, which is what makes
/// `synthesize_registration_graph`'s
/// deep-copy trivial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: String,
    pub flow_type: FlowType,
    pub start_node_id: String,
    pub nodes: HashMap<String, FlowNode>,
}

impl FlowGraph {
    pub fn start_node(&self) -> &FlowNode {
        self.nodes
            .get(&self.start_node_id)
            .expect("start_node_id always resolves after validation")
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    /// Round-trip back to the definition shape, for debugging.
    pub fn to_def(&self) -> GraphDef {
        let mut nodes: Vec<FlowNodeDef> = self
            .nodes
            .values()
            .map(|node| FlowNodeDef {
                id: node.id.clone(),
                node_type: node.node_type,
                properties: node.properties.clone(),
                inputs: node.inputs.clone(),
                executor: node.executor_name.clone().map(|name| ExecutorRef { name }),
                next: node.next.clone(),
                condition: node.condition.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        GraphDef {
            id: self.id.clone(),
            flow_type: self.flow_type,
            nodes,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_def())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> FlowGraph {
        let mut nodes = HashMap::new();
        nodes.insert(
            "start".to_string(),
            FlowNode {
                id: "start".to_string(),
                node_type: NodeType::Prompt,
                properties: None,
                inputs: vec![DeclaredInput {
                    name: "username".to_string(),
                    input_type: "string".to_string(),
                    required: true,
                }],
                executor_name: Some("credentials".to_string()),
                next: vec!["success".to_string()],
                condition: None,
                is_terminal: false,
            },
        );
        nodes.insert(
            "success".to_string(),
            FlowNode {
                id: "success".to_string(),
                node_type: NodeType::AuthSuccess,
                properties: None,
                inputs: vec![],
                executor_name: None,
                next: vec![],
                condition: None,
                is_terminal: true,
            },
        );
        FlowGraph {
            id: "login".to_string(),
            flow_type: FlowType::Authentication,
            start_node_id: "start".to_string(),
            nodes,
        }
    }

    #[test]
    fn start_node_resolves_to_the_configured_start() {
        let graph = sample_graph();
        assert_eq!(graph.start_node().id, "start");
    }

    #[test]
    fn to_def_round_trips_node_shape() {
        let graph = sample_graph();
        let def = graph.to_def();
        assert_eq!(def.id, "login");
        assert_eq!(def.nodes.len(), 2);
        let start = def.nodes.iter().find(|n| n.id == "start").unwrap();
        assert_eq!(start.executor.as_ref().unwrap().name, "credentials");
        assert_eq!(start.next, vec!["success".to_string()]);
    }

    #[test]
    fn to_json_produces_parseable_json() {
        let graph = sample_graph();
        let json = graph.to_json().unwrap();
        let parsed: GraphDef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "login");
    }
}
