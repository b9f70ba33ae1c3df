use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// The closed set of node kinds the engine can execute.
///
/// Extending the engine means adding a variant here and a matching arm in
/// the node executor; dispatch is a static `match`, never a string registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Trigger,
    Agent,
    Action,
    Condition,
    Delay,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Agent => "agent",
            Self::Action => "action",
            Self::Condition => "condition",
            Self::Delay => "delay",
        }
    }
}

/// Canvas coordinates. Presentation-only; the engine never reads these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A vertex in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Kind-specific configuration; parsed into a typed config by the
    /// matching executor.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: serde_json::Value::Null,
            position: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Parse this node's `data` into a kind-specific config.
    ///
    /// Missing or malformed data falls back to the config's defaults, the
    /// same leniency the canvas applies when a node is half-configured.
    pub fn parse_data<T: DeserializeOwned + Default>(&self) -> T {
        serde_json::from_value(self.data.clone()).unwrap_or_default()
    }
}

/// A directed arc between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Condition nodes tag their outgoing edges `"true"` / `"false"` here.
    #[serde(default, alias = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "targetHandle", skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Create an edge leaving a condition node's `"true"`/`"false"` handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// The node+edge definition submitted to `execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: vec![],
            edges: vec![],
        }
    }

    /// Check that every edge endpoint names an existing node.
    ///
    /// No other structural validation happens here: cycles are legal at
    /// this layer and bounded by the coordinator's step limit.
    pub fn validate(&self) -> Result<()> {
        for edge in &self.edges {
            if self.find_node(&edge.source).is_none() {
                return Err(WeftError::Validation(format!(
                    "Edge '{}' references unknown source node '{}'",
                    edge.id, edge.source
                )));
            }
            if self.find_node(&edge.target).is_none() {
                return Err(WeftError::Validation(format!(
                    "Edge '{}' references unknown target node '{}'",
                    edge.id, edge.target
                )));
            }
        }
        Ok(())
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges of a node, in definition order.
    pub fn edges_from<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let node_id = node_id.to_string();
        self.edges.iter().filter(move |e| e.source == node_id)
    }
}

// ── Kind-specific node configs ──────────────────────────────────

/// Config carried by a trigger node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_trigger_type", alias = "triggerType")]
    pub trigger_type: String,
}

fn default_trigger_type() -> String {
    "manual".to_string()
}

/// Config carried by an agent node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub personality: Option<String>,
}

impl AgentConfig {
    /// Stable identifier used for analytics events: id, else name, else
    /// a placeholder.
    pub fn agent_id(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Config carried by an action node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default = "default_action_type", alias = "actionType")]
    pub action_type: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

fn default_action_type() -> String {
    "noop".to_string()
}

/// Config carried by a condition node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub condition: String,
}

/// Config carried by a delay node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default, alias = "duration")]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf-1", "Linear");
        graph.nodes = vec![
            Node::new("t1", NodeKind::Trigger),
            Node::new("a1", NodeKind::Agent),
        ];
        graph.edges = vec![Edge::new("e1", "t1", "a1")];
        graph
    }

    #[test]
    fn test_validate_ok() {
        assert!(linear_graph().validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_target() {
        let mut graph = linear_graph();
        graph.edges.push(Edge::new("e2", "a1", "ghost"));
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, WeftError::Validation(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_validate_unknown_source() {
        let mut graph = linear_graph();
        graph.edges.push(Edge::new("e2", "ghost", "t1"));
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_find_node_and_edges_from() {
        let graph = linear_graph();
        assert!(graph.find_node("t1").is_some());
        assert!(graph.find_node("nope").is_none());

        let outgoing: Vec<_> = graph.edges_from("t1").collect();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target, "a1");
        assert_eq!(graph.edges_from("a1").count(), 0);
    }

    #[test]
    fn test_parse_data_lenient() {
        let node = Node::new("d1", NodeKind::Delay);
        let config: DelayConfig = node.parse_data();
        assert!(config.duration_ms.is_none());

        let node = node.with_data(serde_json::json!({ "duration_ms": 250 }));
        let config: DelayConfig = node.parse_data();
        assert_eq!(config.duration_ms, Some(250));
    }

    #[test]
    fn test_graph_wire_format() {
        let json = serde_json::json!({
            "id": "wf-2",
            "name": "Branching",
            "nodes": [
                { "id": "c1", "type": "condition", "data": { "condition": "x == \"1\"" } }
            ],
            "edges": [
                { "id": "e1", "source": "c1", "target": "c1", "source_handle": "true" }
            ]
        });
        let graph: WorkflowGraph = serde_json::from_value(json).unwrap();
        assert_eq!(graph.nodes[0].kind, NodeKind::Condition);
        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("true"));
    }

    #[test]
    fn test_camel_case_aliases() {
        // Graphs exported by the canvas use camelCase field names.
        let json = serde_json::json!({
            "id": "wf-3",
            "nodes": [
                { "id": "x1", "type": "action", "data": { "actionType": "call-webhook" } },
                { "id": "d1", "type": "delay", "data": { "duration": 750 } }
            ],
            "edges": [
                { "id": "e1", "source": "x1", "target": "d1", "sourceHandle": "true" }
            ]
        });
        let graph: WorkflowGraph = serde_json::from_value(json).unwrap();

        let action: ActionConfig = graph.nodes[0].parse_data();
        assert_eq!(action.action_type, "call-webhook");

        let delay: DelayConfig = graph.nodes[1].parse_data();
        assert_eq!(delay.duration_ms, Some(750));

        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("true"));
    }

    #[test]
    fn test_agent_id_fallback() {
        let config = AgentConfig::default();
        assert_eq!(config.agent_id(), "unknown");

        let config = AgentConfig {
            name: Some("scout".into()),
            ..Default::default()
        };
        assert_eq!(config.agent_id(), "scout");

        let config = AgentConfig {
            id: Some("agent-7".into()),
            name: Some("scout".into()),
            ..Default::default()
        };
        assert_eq!(config.agent_id(), "agent-7");
    }
}
