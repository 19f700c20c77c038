use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What kind of work a node performs. Opaque to the engine; forwarded to the
/// step executor so it can dispatch appropriately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    AgenticStep,
    ToolCall,
    Decision,
    PureTransform,
}

/// A unit of work in the graph.
///
/// `input_keys` must all be present in the context before the node runs
/// (entry-point nodes excepted); `output_keys` are what the node is expected
/// to write back. The `payload` (prompt, template, tool arguments) is opaque
/// to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub input_keys: Vec<String>,
    #[serde(default)]
    pub output_keys: Vec<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Tool names this node may use (empty = none).
    #[serde(default)]
    pub tools: Vec<String>,
    /// Additional step-executor invocations allowed after a failure.
    #[serde(default)]
    pub max_retries: u32,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            node_type,
            input_keys: vec![],
            output_keys: vec![],
            payload: None,
            tools: vec![],
            max_retries: 0,
        }
    }

    pub fn with_inputs(mut self, keys: Vec<String>) -> Self {
        self.input_keys = keys;
        self
    }

    pub fn with_outputs(mut self, keys: Vec<String>) -> Self {
        self.output_keys = keys;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Condition for traversing an edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Always traverse this edge.
    #[default]
    Always,
    /// Traverse only if the source node succeeded.
    OnSuccess,
    /// Traverse only if the source node failed.
    OnFailure,
    /// Traverse if the expression evaluates to true against the context and
    /// the source node's outcome. See `skein-engine::expr` for the grammar.
    Custom { expr: String },
}

/// A directed, conditionally-taken transition between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub condition: EdgeCondition,
    /// Lower values are evaluated first; ties break by declaration order.
    #[serde(default)]
    pub priority: i32,
}

impl EdgeSpec {
    /// Create an unconditional edge.
    pub fn always(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            condition: EdgeCondition::Always,
            priority: 0,
        }
    }

    /// Create an edge that fires on success.
    pub fn on_success(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            condition: EdgeCondition::OnSuccess,
            ..Self::always(id, source, target)
        }
    }

    /// Create an edge that fires on failure.
    pub fn on_failure(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            condition: EdgeCondition::OnFailure,
            ..Self::always(id, source, target)
        }
    }

    /// Create a custom-condition edge.
    pub fn custom(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            condition: EdgeCondition::Custom { expr: expr.into() },
            ..Self::always(id, source, target)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A static, validated description of a workflow.
///
/// Nodes and edges are stored flat and keyed by stable string ids, so cyclic
/// graphs (retry loops) need no ownership cycles; all traversal state lives
/// in `SessionState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    pub id: String,
    #[serde(default)]
    pub goal_id: String,
    pub version: String,
    pub entry_node: String,
    /// Alternate valid start nodes for resumed or branching runs.
    #[serde(default)]
    pub entry_points: Vec<String>,
    /// Execution ends on arrival here.
    #[serde(default)]
    pub terminal_nodes: Vec<String>,
    /// Execution suspends after a successful run of these nodes.
    #[serde(default)]
    pub pause_nodes: Vec<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    /// Opt-in multi-target edge resolution. Off = first matching edge wins.
    #[serde(default)]
    pub fan_out: bool,
    /// Model/token-budget metadata, opaque to the engine and forwarded to
    /// the step executor.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl GraphSpec {
    pub fn new(id: impl Into<String>, version: impl Into<String>, entry_node: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal_id: String::new(),
            version: version.into(),
            entry_node: entry_node.into(),
            entry_points: vec![],
            terminal_nodes: vec![],
            pause_nodes: vec![],
            nodes: vec![],
            edges: vec![],
            fan_out: false,
            metadata: serde_json::Value::Null,
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Build an id → node index for traversal.
    pub fn node_index(&self) -> HashMap<&str, &NodeSpec> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// Outgoing edges of `node_id` with their declaration index.
    pub fn outgoing(&self, node_id: &str) -> Vec<(usize, &EdgeSpec)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == node_id)
            .collect()
    }

    pub fn is_terminal(&self, node_id: &str) -> bool {
        self.terminal_nodes.iter().any(|n| n == node_id)
    }

    pub fn is_pause(&self, node_id: &str) -> bool {
        self.pause_nodes.iter().any(|n| n == node_id)
    }

    /// Whether `node_id` may start a run (entry node or declared entry point).
    /// Entry points are exempt from the input-key precondition.
    pub fn is_entry_point(&self, node_id: &str) -> bool {
        self.entry_node == node_id || self.entry_points.iter().any(|n| n == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_node_graph() -> GraphSpec {
        let mut graph = GraphSpec::new("g1", "1.0.0", "a");
        graph.nodes = vec![
            NodeSpec::new("a", "First", NodeType::AgenticStep),
            NodeSpec::new("b", "Second", NodeType::ToolCall),
        ];
        graph.edges = vec![EdgeSpec::always("e1", "a", "b")];
        graph.terminal_nodes = vec!["b".into()];
        graph
    }

    #[test]
    fn test_node_builder() {
        let node = NodeSpec::new("n1", "Research", NodeType::AgenticStep)
            .with_inputs(vec!["topic".into()])
            .with_outputs(vec!["findings".into()])
            .with_tools(vec!["web_search".into()])
            .with_max_retries(3);

        assert_eq!(node.id, "n1");
        assert_eq!(node.input_keys, vec!["topic"]);
        assert_eq!(node.output_keys, vec!["findings"]);
        assert_eq!(node.tools, vec!["web_search"]);
        assert_eq!(node.max_retries, 3);
    }

    #[test]
    fn test_edge_builders() {
        let e = EdgeSpec::always("e1", "a", "b");
        assert!(matches!(e.condition, EdgeCondition::Always));
        assert_eq!(e.priority, 0);

        let e = EdgeSpec::on_success("e2", "a", "c").with_priority(2);
        assert!(matches!(e.condition, EdgeCondition::OnSuccess));
        assert_eq!(e.priority, 2);

        let e = EdgeSpec::on_failure("e3", "a", "d");
        assert!(matches!(e.condition, EdgeCondition::OnFailure));

        let e = EdgeSpec::custom("e4", "a", "e", r#"score >= 0.8"#);
        assert!(matches!(e.condition, EdgeCondition::Custom { .. }));
    }

    #[test]
    fn test_graph_lookups() {
        let graph = two_node_graph();
        assert!(graph.node("a").is_some());
        assert!(graph.node("zz").is_none());
        assert_eq!(graph.outgoing("a").len(), 1);
        assert!(graph.outgoing("b").is_empty());
        assert!(graph.is_terminal("b"));
        assert!(!graph.is_pause("a"));
        assert!(graph.is_entry_point("a"));
        assert!(!graph.is_entry_point("b"));
    }

    #[test]
    fn test_graph_deserialization_defaults() {
        let json = r#"{
            "id": "g1",
            "version": "1.0.0",
            "entry_node": "a",
            "nodes": [
                {"id": "a", "name": "A", "node_type": "agentic-step"}
            ]
        }"#;
        let graph: GraphSpec = serde_json::from_str(json).unwrap();
        assert!(!graph.fan_out);
        assert!(graph.edges.is_empty());
        assert!(graph.metadata.is_null());
        assert_eq!(graph.nodes[0].max_retries, 0);
    }

    #[test]
    fn test_node_type_tags() {
        let json = serde_json::to_string(&NodeType::PureTransform).unwrap();
        assert_eq!(json, r#""pure-transform""#);
    }
}
