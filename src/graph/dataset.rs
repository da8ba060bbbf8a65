//! Graph ingestion records and the compiled-in reference dataset.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    pub relation: String,
}

/// Immutable input to [`GraphStore::build`](super::GraphStore::build).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecords {
    pub nodes: Vec<NodeRecord>,
    pub relationships: Vec<RelationshipRecord>,
}

const REFERENCE_NODES: &[(&str, &str)] = &[
    ("User", "Person"),
    ("Salary", "Financial"),
    ("1.8 Lakh", "Amount"),
    ("Liabilities", "Financial"),
    ("1.2 Lakh", "Amount"),
    ("Savings", "Financial"),
    ("60000", "Amount"),
    ("Mahindra XUV 7XO", "Vehicle"),
    ("16 Lakh", "Amount"),
    ("Down Payment", "Financial"),
    ("Loan", "Financial"),
    ("End of Year", "Timeline"),
];

const REFERENCE_RELATIONSHIPS: &[(&str, &str, &str)] = &[
    ("User", "Salary", "EARNS"),
    ("Salary", "1.8 Lakh", "AMOUNT"),
    ("User", "Liabilities", "HAS"),
    ("Liabilities", "1.2 Lakh", "AMOUNT"),
    ("User", "Savings", "CAN_SAVE"),
    ("Savings", "60000", "MONTHLY"),
    ("User", "Mahindra XUV 7XO", "WANTS_TO_BUY"),
    ("Mahindra XUV 7XO", "16 Lakh", "COSTS"),
    ("Mahindra XUV 7XO", "Down Payment", "REQUIRES"),
    ("Mahindra XUV 7XO", "Loan", "NEEDS"),
    ("User", "End of Year", "TIMELINE"),
];

impl GraphRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: &str, node_type: &str) -> Self {
        self.nodes.push(NodeRecord {
            id: id.to_string(),
            node_type: node_type.to_string(),
        });
        self
    }

    pub fn with_relationship(mut self, source: &str, target: &str, relation: &str) -> Self {
        self.relationships.push(RelationshipRecord {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
        });
        self
    }

    /// Vehicle-purchase scenario: a salaried user with liabilities and monthly
    /// savings who wants to buy a car by the end of the year.
    pub fn financial_reference() -> Self {
        let records = REFERENCE_NODES
            .iter()
            .fold(Self::new(), |acc, (id, ty)| acc.with_node(id, ty));
        REFERENCE_RELATIONSHIPS
            .iter()
            .fold(records, |acc, (s, t, r)| acc.with_relationship(s, t, r))
    }
}
