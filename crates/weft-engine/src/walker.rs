use weft_core::graph::{Node, NodeKind, WorkflowGraph};
use weft_core::types::NodeResult;

/// Select the node a run starts from: the first trigger node, else the
/// first node in the list, else `None` for an empty graph.
pub fn start_node(graph: &WorkflowGraph) -> Option<&str> {
    graph
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::Trigger)
        .or_else(|| graph.nodes.first())
        .map(|n| n.id.as_str())
}

/// Select the node to visit after `current`.
///
/// Condition results pick the outgoing edge whose source handle matches
/// the evaluated branch (`"true"` / `"false"`); every other node follows
/// its first outgoing edge. A missing edge ends the path; that is normal
/// completion, not an error.
pub fn next_node<'a>(
    graph: &'a WorkflowGraph,
    current: &Node,
    last_result: &NodeResult,
) -> Option<&'a str> {
    match last_result.branch() {
        Some(branch) => {
            let handle = if branch { "true" } else { "false" };
            graph
                .edges_from(&current.id)
                .find(|e| e.source_handle.as_deref() == Some(handle))
                .map(|e| e.target.as_str())
        }
        None => graph
            .edges_from(&current.id)
            .next()
            .map(|e| e.target.as_str()),
    }
}
