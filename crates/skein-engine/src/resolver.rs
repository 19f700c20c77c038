use tracing::debug;

use skein_core::context::Context;
use skein_core::error::{Result, SkeinError};
use skein_core::graph::{EdgeCondition, EdgeSpec, GraphSpec};
use skein_core::types::StepStatus;

use crate::expr;

/// Select the next edge(s) out of `node_id` given the node's outcome.
///
/// Candidates are the node's outgoing edges, ordered by ascending priority
/// with ties broken by declaration order. By default the first match wins;
/// when the graph opts into `fan_out`, every matching edge is returned, in
/// the same order. No match is a `DeadEnd`.
pub fn resolve<'a>(
    graph: &'a GraphSpec,
    node_id: &str,
    status: StepStatus,
    context: &Context,
) -> Result<Vec<&'a EdgeSpec>> {
    let mut candidates = graph.outgoing(node_id);
    candidates.sort_by_key(|(idx, edge)| (edge.priority, *idx));

    let mut matched = Vec::new();
    for (_, edge) in candidates {
        if edge_matches(edge, status, context) {
            debug!(edge_id = %edge.id, target = %edge.target, "Edge matched");
            matched.push(edge);
            if !graph.fan_out {
                break;
            }
        }
    }

    if matched.is_empty() {
        return Err(SkeinError::DeadEnd {
            node: node_id.to_string(),
        });
    }
    Ok(matched)
}

fn edge_matches(edge: &EdgeSpec, status: StepStatus, context: &Context) -> bool {
    match &edge.condition {
        EdgeCondition::Always => true,
        EdgeCondition::OnSuccess => status.is_success(),
        EdgeCondition::OnFailure => !status.is_success(),
        EdgeCondition::Custom { expr } => expr::evaluate(expr, context.data(), status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::graph::{NodeSpec, NodeType};

    fn graph_with_edges(edges: Vec<EdgeSpec>) -> GraphSpec {
        let mut graph = GraphSpec::new("g1", "1.0.0", "a");
        graph.nodes = vec![
            NodeSpec::new("a", "A", NodeType::AgenticStep),
            NodeSpec::new("b", "B", NodeType::AgenticStep),
            NodeSpec::new("c", "C", NodeType::AgenticStep),
        ];
        graph.edges = edges;
        graph.terminal_nodes = vec!["c".into()];
        graph
    }

    #[test]
    fn test_lower_priority_wins() {
        let graph = graph_with_edges(vec![
            EdgeSpec::always("e1", "a", "b").with_priority(2),
            EdgeSpec::always("e2", "a", "c").with_priority(1),
        ]);
        let next = resolve(&graph, "a", StepStatus::Succeeded, &Context::new()).unwrap();
        assert_eq!(next[0].id, "e2");
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let graph = graph_with_edges(vec![
            EdgeSpec::always("first", "a", "b"),
            EdgeSpec::always("second", "a", "c"),
        ]);
        let next = resolve(&graph, "a", StepStatus::Succeeded, &Context::new()).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, "first");
    }

    #[test]
    fn test_status_conditions() {
        let graph = graph_with_edges(vec![
            EdgeSpec::on_success("ok", "a", "b"),
            EdgeSpec::on_failure("fail", "a", "c"),
        ]);

        let next = resolve(&graph, "a", StepStatus::Succeeded, &Context::new()).unwrap();
        assert_eq!(next[0].id, "ok");

        let next = resolve(&graph, "a", StepStatus::Failed, &Context::new()).unwrap();
        assert_eq!(next[0].id, "fail");
    }

    #[test]
    fn test_custom_condition() {
        let graph = graph_with_edges(vec![
            EdgeSpec::custom("high", "a", "b", "score >= 0.8").with_priority(0),
            EdgeSpec::always("low", "a", "c").with_priority(1),
        ]);

        let mut ctx = Context::new();
        ctx.set("score", serde_json::json!(0.9));
        let next = resolve(&graph, "a", StepStatus::Succeeded, &ctx).unwrap();
        assert_eq!(next[0].id, "high");

        ctx.set("score", serde_json::json!(0.3));
        let next = resolve(&graph, "a", StepStatus::Succeeded, &ctx).unwrap();
        assert_eq!(next[0].id, "low");
    }

    #[test]
    fn test_dead_end() {
        let graph = graph_with_edges(vec![EdgeSpec::on_success("ok", "a", "b")]);
        let err = resolve(&graph, "a", StepStatus::Failed, &Context::new()).unwrap_err();
        assert!(matches!(err, SkeinError::DeadEnd { node } if node == "a"));
    }

    #[test]
    fn test_fan_out_collects_all_matches() {
        let mut graph = graph_with_edges(vec![
            EdgeSpec::on_success("e1", "a", "b"),
            EdgeSpec::on_failure("e2", "a", "c"),
            EdgeSpec::always("e3", "a", "c").with_priority(1),
        ]);
        graph.fan_out = true;

        let next = resolve(&graph, "a", StepStatus::Succeeded, &Context::new()).unwrap();
        let ids: Vec<&str> = next.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e3"]);
    }

    #[test]
    fn test_no_outgoing_edges_is_dead_end() {
        let graph = graph_with_edges(vec![]);
        assert!(resolve(&graph, "a", StepStatus::Succeeded, &Context::new()).is_err());
    }
}
