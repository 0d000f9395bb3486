//! Query Execution Engine
//!
//! Replays a [`QueryPlan`] against a borrowed tree. An executor is bound to
//! one tree and may run any number of plans against it; memo checkpoints
//! recorded by one plan let later plans sharing the same prefix skip the
//! walk down to it.

use crate::planner::{is_numeric_index, QueryPlan, StepKind};
use dotquery_core::{Error, Result, TreeValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of running a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<'t> {
    /// The path resolved to this subtree
    Found(&'t TreeValue),
    /// The walk stopped at `target`
    NotFound { target: String },
}

impl<'t> Outcome<'t> {
    /// Returns true if the path resolved
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    /// The resolved value, if any
    pub fn value(&self) -> Option<&'t TreeValue> {
        match self {
            Outcome::Found(value) => Some(value),
            Outcome::NotFound { .. } => None,
        }
    }

    /// Convert a miss into [`Error::NotFound`]
    pub fn into_result(self) -> Result<&'t TreeValue> {
        match self {
            Outcome::Found(value) => Ok(value),
            Outcome::NotFound { target } => Err(Error::NotFound { target }),
        }
    }
}

/// Subtrees already resolved in one tree, keyed by the segments walked to reach them
#[derive(Debug, Default)]
pub struct Memo<'t> {
    entries: HashMap<Vec<String>, &'t TreeValue>,
}

impl<'t> Memo<'t> {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resolved prefix
    pub fn get(&self, prefix: &[String]) -> Option<&'t TreeValue> {
        self.entries.get(prefix).copied()
    }

    /// Record the subtree reached through `prefix`
    pub fn insert(&mut self, prefix: Vec<String>, value: &'t TreeValue) {
        self.entries.insert(prefix, value);
    }

    /// Number of memoized prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Execution statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub plans_executed: u64,
    pub lookups: u64,
    pub memo_hits: u64,
    pub memo_stores: u64,
}

/// Plan executor bound to one tree
pub struct QueryExecutor<'t> {
    root: &'t TreeValue,
    memo: Memo<'t>,
    stats: ExecutionStats,
}

impl<'t> QueryExecutor<'t> {
    /// Create an executor over `root`
    pub fn new(root: &'t TreeValue) -> Self {
        Self {
            root,
            memo: Memo::new(),
            stats: ExecutionStats::default(),
        }
    }

    /// Get execution statistics
    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Get the memo built so far
    pub fn memo(&self) -> &Memo<'t> {
        &self.memo
    }

    /// Run `plan` against the bound tree
    pub fn execute(&mut self, plan: &QueryPlan) -> Outcome<'t> {
        self.stats.plans_executed += 1;

        let (start, mut current) = self.resume_point(plan);

        for (index, step) in plan.steps.iter().enumerate().skip(start) {
            match step.kind {
                StepKind::Navigate | StepKind::DirectAccess => {
                    match self.lookup(current, &step.target) {
                        Some(next) => current = next,
                        None => {
                            return Outcome::NotFound {
                                target: step.target.clone(),
                            };
                        }
                    }
                }
                StepKind::CombinedNavigate => {
                    for segment in step.target.split('.') {
                        match self.lookup(current, segment) {
                            Some(next) => current = next,
                            None => {
                                return Outcome::NotFound {
                                    target: segment.to_string(),
                                };
                            }
                        }
                    }
                }
                StepKind::MemoCheck => {
                    self.memo.insert(plan.prefix_before(index), current);
                    self.stats.memo_stores += 1;
                }
            }
        }

        Outcome::Found(current)
    }

    /// Deepest memoized checkpoint of `plan`, or the root
    fn resume_point(&mut self, plan: &QueryPlan) -> (usize, &'t TreeValue) {
        if self.memo.is_empty() {
            return (0, self.root);
        }

        for (index, step) in plan.steps.iter().enumerate().rev() {
            if step.kind != StepKind::MemoCheck {
                continue;
            }
            if let Some(value) = self.memo.get(&plan.prefix_before(index)) {
                self.stats.memo_hits += 1;
                return (index + 1, value);
            }
        }

        (0, self.root)
    }

    fn lookup(&mut self, current: &'t TreeValue, segment: &str) -> Option<&'t TreeValue> {
        self.stats.lookups += 1;
        match current {
            TreeValue::Object(map) => map.get(segment),
            TreeValue::Array(items) => {
                if !is_numeric_index(segment) {
                    return None;
                }
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        }
    }
}

/// Run a single plan against `root`
pub fn execute<'t>(plan: &QueryPlan, root: &'t TreeValue) -> Outcome<'t> {
    QueryExecutor::new(root).execute(plan)
}
