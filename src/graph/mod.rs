//! Knowledge graph module: in-memory directed graph and context serialization.
//!
//! Nodes and edges are kept in insertion order so the serialized context is
//! deterministic for a given build input.

mod context;
mod dataset;

pub use context::serialize_context;
pub use dataset::{GraphRecords, NodeRecord, RelationshipRecord};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named entity in the graph. `node_type` is `None` for nodes created
/// implicitly by an edge endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
}

/// A labeled directed relationship (source --relation--> target).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Read-only snapshot of the graph, consumed for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String, String)>,
}

/// Directed graph holding typed nodes and labeled edges.
///
/// Write-once, read-many: there is no removal operation.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
}

impl GraphStore {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load nodes, then relationships, from a record set.
    pub fn build(records: &GraphRecords) -> Self {
        let mut graph = Self::new();
        for node in &records.nodes {
            graph.add_node(&node.id, &node.node_type);
        }
        for rel in &records.relationships {
            graph.add_edge(&rel.source, &rel.target, &rel.relation);
        }
        log::debug!(
            "Built knowledge graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Insert a node, or overwrite the type of an existing one in place.
    pub fn add_node(&mut self, id: &str, node_type: &str) {
        match self.index.get(id) {
            Some(&pos) => self.nodes[pos].node_type = Some(node_type.to_string()),
            None => self.push_node(id, Some(node_type.to_string())),
        }
    }

    /// Append a directed edge.
    ///
    /// Endpoints are not validated: an id that was never added with
    /// [`add_node`](Self::add_node) is created here without a type. Add nodes
    /// before edges to keep every node typed.
    pub fn add_edge(&mut self, source: &str, target: &str, relation: &str) {
        for id in [source, target] {
            if !self.index.contains_key(id) {
                self.push_node(id, None);
            }
        }
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
        });
    }

    fn push_node(&mut self, id: &str, node_type: Option<String>) {
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(Node {
            id: id.to_string(),
            node_type,
        });
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node ids in insertion order
    pub fn list_nodes(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// (source, target, relation) triples in insertion order
    pub fn list_edges(&self) -> Vec<(&str, &str, &str)> {
        self.edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.relation.as_str()))
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            num_nodes: self.node_count(),
            num_edges: self.edge_count(),
            nodes: self.nodes.iter().map(|n| n.id.clone()).collect(),
            edges: self
                .edges
                .iter()
                .map(|e| (e.source.clone(), e.target.clone(), e.relation.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_build_counts() {
        let graph = GraphStore::build(&GraphRecords::financial_reference());
        assert_eq!(graph.node_count(), 12);
        assert_eq!(graph.edge_count(), 11);
    }

    #[test]
    fn test_listing_follows_build_order() {
        let records = GraphRecords::financial_reference();
        let graph = GraphStore::build(&records);

        let expected_nodes: Vec<&str> = records.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(graph.list_nodes(), expected_nodes);

        let expected_edges: Vec<(&str, &str, &str)> = records
            .relationships
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str(), r.relation.as_str()))
            .collect();
        assert_eq!(graph.list_edges(), expected_edges);
    }

    #[test]
    fn test_reference_edges_reference_known_nodes() {
        let graph = GraphStore::build(&GraphRecords::financial_reference());
        for (source, target, _) in graph.list_edges() {
            assert!(graph.contains_node(source), "unknown source {}", source);
            assert!(graph.contains_node(target), "unknown target {}", target);
        }
        // every node came from the record set, so all are typed
        assert!(graph.nodes().iter().all(|n| n.node_type.is_some()));
    }

    #[test]
    fn test_add_node_overwrites_type_without_duplicating() {
        let mut graph = GraphStore::new();
        graph.add_node("Loan", "Financial");
        graph.add_node("Bank", "Organization");
        graph.add_node("Loan", "Debt");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.list_nodes(), vec!["Loan", "Bank"]);
        assert_eq!(graph.nodes()[0].node_type.as_deref(), Some("Debt"));
    }

    #[test]
    fn test_add_edge_creates_untyped_endpoints() {
        let mut graph = GraphStore::new();
        graph.add_node("User", "Person");
        graph.add_edge("User", "Bank", "BORROWS_FROM");

        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains_node("Bank"));
        assert_eq!(graph.nodes()[1].node_type, None);
    }

    #[test]
    fn test_graph_is_directed() {
        let mut graph = GraphStore::new();
        graph.add_node("A", "T");
        graph.add_node("B", "T");
        graph.add_edge("A", "B", "LINKS");

        assert_eq!(graph.list_edges(), vec![("A", "B", "LINKS")]);
        assert!(!graph.list_edges().contains(&("B", "A", "LINKS")));
    }

    #[test]
    fn test_duplicate_edges_are_kept() {
        let mut graph = GraphStore::new();
        graph.add_edge("A", "B", "LINKS");
        graph.add_edge("A", "B", "LINKS");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_stats_snapshot() {
        let graph = GraphStore::build(&GraphRecords::financial_reference());
        let stats = graph.stats();
        assert_eq!(stats.num_nodes, 12);
        assert_eq!(stats.num_edges, 11);
        assert_eq!(stats.nodes.first().map(String::as_str), Some("User"));
        assert_eq!(
            stats.edges.first(),
            Some(&("User".to_string(), "Salary".to_string(), "EARNS".to_string()))
        );
    }

    #[test]
    fn test_stats_json_shape() {
        let mut graph = GraphStore::new();
        graph.add_node("A", "T");
        graph.add_edge("A", "A", "SELF");
        let json = serde_json::to_value(graph.stats()).unwrap();
        assert_eq!(json["num_nodes"], 1);
        assert_eq!(json["edges"][0], serde_json::json!(["A", "A", "SELF"]));
    }
}
