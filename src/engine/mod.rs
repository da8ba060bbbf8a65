//! Query engine: graph context + one text-generation call per question.

mod prompt;

pub use prompt::{build_prompt, SAMPLE_QUERIES};

use std::time::Instant;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::graph::{serialize_context, GraphRecords, GraphStats, GraphStore};
use crate::llm::{self, TextBackend};

/// Prefix of every answer returned for a failed query.
pub const QUERY_ERROR_PREFIX: &str = "Error executing query: ";

enum Binding {
    Bound(Box<dyn TextBackend>),
    /// No backend could be initialized; the reason is reported on every query
    Unbound(String),
}

/// Answers questions against a fixed knowledge graph.
///
/// The graph is built once at construction and never mutated afterwards,
/// so a shared `&QueryEngine` is safe to use from concurrent requests.
pub struct QueryEngine {
    graph: GraphStore,
    backend: Binding,
}

impl QueryEngine {
    /// Build the graph from `records` and take the outcome of backend
    /// selection. A failed selection leaves the engine usable, with every
    /// query answering with the failure.
    pub fn new(records: &GraphRecords, backend: Result<Box<dyn TextBackend>>) -> Self {
        let graph = GraphStore::build(records);
        let backend = match backend {
            Ok(backend) => Binding::Bound(backend),
            Err(e) => {
                log::warn!("Query engine starting without a backend: {}", e);
                Binding::Unbound(e.to_string())
            }
        };
        log::info!(
            "Query engine ready: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Self { graph, backend }
    }

    /// Build the engine, binding to the first backend in the configured chain.
    pub fn from_config(records: &GraphRecords, config: &LlmConfig) -> Self {
        Self::new(records, llm::connect(config))
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Text block describing every node and relationship
    pub fn serialize_context(&self) -> String {
        serialize_context(&self.graph)
    }

    /// `provider/model` of the bound backend
    pub fn backend_label(&self) -> Option<String> {
        match &self.backend {
            Binding::Bound(b) => Some(format!("{}/{}", b.provider_name(), b.model_name())),
            Binding::Unbound(_) => None,
        }
    }

    /// Answer a question. Never fails: errors come back as text starting
    /// with [`QUERY_ERROR_PREFIX`].
    pub async fn query(&self, question: &str) -> String {
        match &self.backend {
            Binding::Bound(backend) => self.query_with(backend.as_ref(), question).await,
            Binding::Unbound(reason) => {
                log::error!("Query rejected, no backend bound: {}", reason);
                format!("{}{}", QUERY_ERROR_PREFIX, reason)
            }
        }
    }

    /// Answer a question with a caller-supplied backend instead of the
    /// bound one. Same error contract as [`query`](Self::query).
    pub async fn query_with(&self, backend: &dyn TextBackend, question: &str) -> String {
        let prompt = build_prompt(&self.serialize_context(), question);
        let start = Instant::now();

        match backend.complete(&prompt).await {
            Ok(completion) => {
                log::debug!(
                    "Query answered by {} in {:?}",
                    backend.provider_name(),
                    start.elapsed()
                );
                completion.text
            }
            Err(e) => {
                log::error!("Query failed after {:?}: {}", start.elapsed(), e);
                format!("{}{}", QUERY_ERROR_PREFIX, e)
            }
        }
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KgError;
    use crate::llm::testing::StubBackend;
    use crate::llm::{BackendError, BackendErrorKind, Completion};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn engine_with(backend: StubBackend) -> QueryEngine {
        QueryEngine::new(&GraphRecords::financial_reference(), Ok(Box::new(backend)))
    }

    /// Records the prompt it was sent.
    struct CapturingBackend {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TextBackend for CapturingBackend {
        async fn complete(&self, prompt: &str) -> std::result::Result<Completion, BackendError> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok(Completion {
                text: "ok".to_string(),
            })
        }

        fn provider_name(&self) -> &str {
            "capture"
        }

        fn model_name(&self) -> &str {
            "m"
        }
    }

    #[tokio::test]
    async fn test_query_returns_backend_text() {
        let engine = engine_with(StubBackend::answering("Feasible with a loan."));
        assert_eq!(engine.query("Can I buy?").await, "Feasible with a loan.");
    }

    #[tokio::test]
    async fn test_query_failure_becomes_error_text() {
        let engine =
            engine_with(StubBackend::failing(BackendErrorKind::Network, "connection refused"));
        let answer = engine.query("Can I buy?").await;
        assert!(answer.starts_with("Error executing query: "));
        assert!(answer.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unbound_engine_answers_with_error() {
        let engine = QueryEngine::new(
            &GraphRecords::financial_reference(),
            Err(KgError::NoBackend("openai: key missing".to_string())),
        );
        assert_eq!(engine.backend_label(), None);

        let answer = engine.query("Can I buy?").await;
        assert_eq!(
            answer,
            "Error executing query: no text-generation backend available: openai: key missing"
        );
        // The graph is still usable without a backend
        assert_eq!(engine.stats().num_nodes, 12);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_question() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = CapturingBackend {
            seen: Arc::clone(&seen),
        };
        let engine = QueryEngine::new(&GraphRecords::financial_reference(), Ok(Box::new(backend)));

        assert_eq!(engine.query("Is the loan needed?").await, "ok");

        let prompts = seen.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], build_prompt(&engine.serialize_context(), "Is the loan needed?"));
        assert!(prompts[0].contains("Nodes (12)"));
    }

    #[tokio::test]
    async fn test_query_with_uses_supplied_backend() {
        let engine = engine_with(StubBackend::answering("bound"));
        let other = StubBackend::answering("override");
        assert_eq!(engine.query_with(&other, "Can I buy?").await, "override");
        assert_eq!(engine.query("Can I buy?").await, "bound");
    }

    #[test]
    fn test_stats_after_construction() {
        let engine = engine_with(StubBackend::answering("x"));
        let stats = engine.stats();
        assert_eq!(stats.num_nodes, 12);
        assert_eq!(stats.num_edges, 11);
        assert_eq!(stats.nodes[7], "Mahindra XUV 7XO");
        assert_eq!(stats.edges[10].2, "TIMELINE");
    }

    #[test]
    fn test_context_idempotent_and_counts() {
        let engine = engine_with(StubBackend::answering("x"));
        let first = engine.serialize_context();
        assert_eq!(first, engine.serialize_context());
        assert!(first.contains("Nodes (12)"));
        assert!(first.contains("Relationships (11)"));
    }

    #[test]
    fn test_backend_label() {
        let engine = engine_with(StubBackend::answering("x"));
        assert_eq!(engine.backend_label().as_deref(), Some("stub/stub-model"));
    }

    #[test]
    fn test_independent_engines() {
        let small = GraphRecords::new().with_node("A", "T");
        let a = QueryEngine::new(&small, Ok(Box::new(StubBackend::answering("x"))));
        let b = engine_with(StubBackend::answering("y"));
        assert_eq!(a.stats().num_nodes, 1);
        assert_eq!(b.stats().num_nodes, 12);
    }
}
