//! Flattens a [`GraphStore`] into the text block injected into LLM prompts.

use super::GraphStore;

const UNKNOWN_TYPE: &str = "unknown";

/// Serialize the graph as three lines: a header, the node list and the
/// relationship list. Items appear in insertion order.
pub fn serialize_context(graph: &GraphStore) -> String {
    let nodes_info: Vec<String> = graph
        .nodes()
        .iter()
        .map(|n| {
            format!(
                "{} (type: {})",
                n.id,
                n.node_type.as_deref().unwrap_or(UNKNOWN_TYPE)
            )
        })
        .collect();
    let edges_info: Vec<String> = graph
        .edges()
        .iter()
        .map(|e| format!("{} -> {} (relation: {})", e.source, e.target, e.relation))
        .collect();

    format!(
        "Knowledge Graph Information:\nNodes ({}): {}\nRelationships ({}): {}",
        graph.node_count(),
        join_or(&nodes_info, "No nodes found"),
        graph.edge_count(),
        join_or(&edges_info, "No relationships found"),
    )
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}
