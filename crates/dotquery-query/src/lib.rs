//! dotquery Query Engine
//!
//! Compiles dot-path queries such as `"a.b.2.c"` and evaluates them
//! against decoded trees.
//!
//! # Overview
//!
//! The query engine implements:
//! - A logos-based path lexer
//! - A fail-fast path parser
//! - Cost-model query planning with optimization levels
//! - A TTL/LRU plan cache
//! - Plan execution with prefix memoization

pub mod cache;
pub mod engine;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;

pub use cache::{CacheConfig, PlanCache};
pub use engine::{EngineConfig, EngineStats, EvaluationResult, Performance, QueryEngine};
pub use executor::{execute, ExecutionStats, Memo, Outcome, QueryExecutor};
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse_query, Parser, Path};
pub use planner::{
    Optimization, OptimizationLevel, PlannerConfig, QueryPlan, QueryPlanner, Step, StepKind,
};
