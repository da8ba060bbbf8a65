pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod engine;
pub mod image;
pub mod server;

pub use config::Config;
pub use engine::QueryEngine;
pub use error::{KgError, Result};
pub use graph::{GraphRecords, GraphStats, GraphStore};
