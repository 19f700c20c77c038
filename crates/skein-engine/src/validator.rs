use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use skein_core::graph::{EdgeCondition, GraphSpec};

/// Outcome of validating a graph. Errors block execution; warnings do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate a graph before its first run.
///
/// Also usable as a standalone diagnostic (`skein validate`); the executor
/// runs it once at construction and refuses invalid graphs.
pub fn validate(graph: &GraphSpec) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Node id uniqueness
    let mut node_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !node_ids.insert(node.id.as_str()) {
            errors.push(format!("duplicate node id '{}'", node.id));
        }
    }

    // Edge id uniqueness and referential integrity
    let mut edge_ids: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            errors.push(format!("duplicate edge id '{}'", edge.id));
        }
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(format!(
                "edge '{}' references unknown source node '{}'",
                edge.id, edge.source
            ));
        }
        if !node_ids.contains(edge.target.as_str()) {
            errors.push(format!(
                "edge '{}' references unknown target node '{}'",
                edge.id, edge.target
            ));
        }
        if let EdgeCondition::Custom { expr } = &edge.condition {
            if expr.trim().is_empty() {
                errors.push(format!("edge '{}' has an empty custom condition", edge.id));
            }
        }
    }

    // Entry membership
    if !node_ids.contains(graph.entry_node.as_str()) {
        errors.push(format!("entry node '{}' is not a node", graph.entry_node));
    }
    for entry in &graph.entry_points {
        if !node_ids.contains(entry.as_str()) {
            errors.push(format!("entry point '{}' is not a node", entry));
        }
    }

    // Terminal/pause membership and disjointness
    for t in &graph.terminal_nodes {
        if !node_ids.contains(t.as_str()) {
            errors.push(format!("terminal node '{}' is not a node", t));
        }
    }
    for p in &graph.pause_nodes {
        if !node_ids.contains(p.as_str()) {
            errors.push(format!("pause node '{}' is not a node", p));
        }
        if graph.terminal_nodes.contains(p) {
            errors.push(format!("node '{}' is both terminal and pause", p));
        }
    }

    // Reachability: at least one terminal or pause node reachable from entry
    if node_ids.contains(graph.entry_node.as_str()) {
        let reachable = reachable_from(graph, &graph.entry_node);
        if !graph
            .terminal_nodes
            .iter()
            .chain(graph.pause_nodes.iter())
            .any(|n| reachable.contains(n.as_str()))
        {
            errors.push(format!(
                "no terminal or pause node is reachable from entry '{}'",
                graph.entry_node
            ));
        }
        for node in &graph.nodes {
            if !reachable.contains(node.id.as_str()) && !graph.is_entry_point(&node.id) {
                warnings.push(format!("node '{}' is unreachable from the entry node", node.id));
            }
        }
    }

    // Ambiguous custom-edge priorities: first-declared wins at runtime
    let mut custom_priorities: HashMap<(&str, i32), Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        if matches!(edge.condition, EdgeCondition::Custom { .. }) {
            custom_priorities
                .entry((edge.source.as_str(), edge.priority))
                .or_default()
                .push(edge.id.as_str());
        }
    }
    for ((source, priority), ids) in custom_priorities {
        if ids.len() > 1 {
            warnings.push(format!(
                "custom edges {:?} from '{}' share priority {}; first-declared wins when both match",
                ids, source, priority
            ));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Node ids reachable from `start`, including `start` itself. Conditions are
/// ignored; this is pure adjacency.
fn reachable_from<'a>(graph: &'a GraphSpec, start: &'a str) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for edge in graph.edges.iter().filter(|e| e.source == current) {
            if seen.insert(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::graph::{EdgeSpec, NodeSpec, NodeType};

    fn linear_graph() -> GraphSpec {
        let mut graph = GraphSpec::new("g1", "1.0.0", "a");
        graph.nodes = vec![
            NodeSpec::new("a", "A", NodeType::AgenticStep),
            NodeSpec::new("b", "B", NodeType::ToolCall),
            NodeSpec::new("c", "C", NodeType::PureTransform),
        ];
        graph.edges = vec![
            EdgeSpec::always("e1", "a", "b"),
            EdgeSpec::on_success("e2", "b", "c"),
        ];
        graph.terminal_nodes = vec!["c".into()];
        graph
    }

    #[test]
    fn test_valid_graph() {
        let report = validate(&linear_graph());
        assert!(report.valid, "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_node_id() {
        let mut graph = linear_graph();
        graph.nodes.push(NodeSpec::new("a", "Dup", NodeType::Decision));
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("duplicate node id 'a'")));
    }

    #[test]
    fn test_dangling_edge() {
        let mut graph = linear_graph();
        graph.edges.push(EdgeSpec::always("e3", "c", "ghost"));
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("unknown target node 'ghost'")));
    }

    #[test]
    fn test_entry_must_be_a_node() {
        let mut graph = linear_graph();
        graph.entry_node = "nope".into();
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("entry node 'nope'")));
    }

    #[test]
    fn test_terminal_pause_disjoint() {
        let mut graph = linear_graph();
        graph.pause_nodes = vec!["c".into()];
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("both terminal and pause")));
    }

    #[test]
    fn test_no_reachable_end() {
        let mut graph = linear_graph();
        graph.terminal_nodes = vec![];
        // 'd' is terminal but disconnected
        graph.nodes.push(NodeSpec::new("d", "D", NodeType::Decision));
        graph.terminal_nodes = vec!["d".into()];
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("no terminal or pause node is reachable")));
    }

    #[test]
    fn test_unreachable_node_warns() {
        let mut graph = linear_graph();
        graph.nodes.push(NodeSpec::new("orphan", "O", NodeType::Decision));
        let report = validate(&graph);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("'orphan' is unreachable")));
    }

    #[test]
    fn test_custom_priority_collision_is_warning() {
        let mut graph = linear_graph();
        graph.edges.push(EdgeSpec::custom("e3", "b", "a", "score > 1").with_priority(5));
        graph.edges.push(EdgeSpec::custom("e4", "b", "c", "score > 2").with_priority(5));
        let report = validate(&graph);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("share priority 5")));
    }

    #[test]
    fn test_empty_custom_expr_is_error() {
        let mut graph = linear_graph();
        graph.edges.push(EdgeSpec::custom("e3", "b", "a", "  "));
        let report = validate(&graph);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("empty custom condition")));
    }

    #[test]
    fn test_pause_node_counts_as_end() {
        let mut graph = linear_graph();
        graph.terminal_nodes = vec![];
        graph.pause_nodes = vec!["c".into()];
        let report = validate(&graph);
        assert!(report.valid, "errors: {:?}", report.errors);
    }
}
