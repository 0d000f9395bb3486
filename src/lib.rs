//! dotquery - plan-based dot-path queries over JSON-like documents
//!
//! This is the main library crate that re-exports all dotquery components.

pub use dotquery_core as core;
pub use dotquery_protocol as protocol;
pub use dotquery_query as query;
pub use dotquery_server as server;

// Re-export commonly used types
pub use dotquery_core::{Error, ErrorKind, ProviderRegistry, Result, TreeProvider, TreeValue};
pub use dotquery_query::{
    EngineConfig, EngineStats, EvaluationResult, OptimizationLevel, QueryEngine, parse_query,
};
