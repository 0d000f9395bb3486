//! Query Planning and Optimization
//!
//! Compiles a [`Path`] into a [`QueryPlan`]: one step per segment, then
//! rewritten by the passes the optimization level selects.
//!
//! - Level 0: literal step list
//! - Level 1: redundant step elimination, navigation fusion
//! - Level 2: level 1 plus memo checkpoints ahead of expensive steps
//!
//! Passes never move a step across another one. Paths mix key and index
//! lookups freely, and every step depends on the one before it, so any
//! reordering would change which value the walk reaches.

use crate::parser::Path;
use dotquery_core::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// How much rewriting the planner performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OptimizationLevel {
    None,
    Basic,
    #[default]
    Aggressive,
}

impl OptimizationLevel {
    /// Numeric form used on the wire and in cache keys
    pub fn as_u8(self) -> u8 {
        match self {
            OptimizationLevel::None => 0,
            OptimizationLevel::Basic => 1,
            OptimizationLevel::Aggressive => 2,
        }
    }
}

impl TryFrom<u8> for OptimizationLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self, Error> {
        match level {
            0 => Ok(OptimizationLevel::None),
            1 => Ok(OptimizationLevel::Basic),
            2 => Ok(OptimizationLevel::Aggressive),
            other => Err(Error::InvalidOptimizationLevel(other)),
        }
    }
}

impl From<OptimizationLevel> for u8 {
    fn from(level: OptimizationLevel) -> u8 {
        level.as_u8()
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Kind of a planned step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Key (or index) lookup for one segment
    Navigate,
    /// Lookup for an all-digit segment, costed as an index access
    DirectAccess,
    /// Several fused segments, target joined by `.`
    CombinedNavigate,
    /// Memo checkpoint keyed by the prefix walked so far
    MemoCheck,
}

impl StepKind {
    /// Whether executing the step moves the cursor
    pub fn moves_cursor(self) -> bool {
        !matches!(self, StepKind::MemoCheck)
    }
}

/// One unit of traversal work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub target: String,
    pub estimated_cost: Duration,
}

impl Step {
    fn new(kind: StepKind, target: impl Into<String>, estimated_cost: Duration) -> Self {
        Self {
            kind,
            target: target.into(),
            estimated_cost,
        }
    }

    /// Literal segments this step walks, in order
    pub fn segments(&self) -> Vec<&str> {
        match self.kind {
            StepKind::Navigate | StepKind::DirectAccess => vec![self.target.as_str()],
            StepKind::CombinedNavigate => self.target.split('.').collect(),
            StepKind::MemoCheck => Vec::new(),
        }
    }
}

/// Rewrites a plan may have gone through
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimization {
    RedundantElimination,
    StepCombination,
    Memoization,
}

/// Compiled, immutable query plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Sum of step costs, in microseconds
    pub estimated_cost: u64,

    /// Passes applied while building the plan
    pub applied_optimizations: BTreeSet<Optimization>,
}

impl QueryPlan {
    /// The literal key/index sequence this plan walks
    pub fn segments(&self) -> Vec<&str> {
        self.steps.iter().flat_map(|step| step.segments()).collect()
    }

    /// Segments walked before step `index`
    pub fn prefix_before(&self, index: usize) -> Vec<String> {
        self.steps[..index.min(self.steps.len())]
            .iter()
            .flat_map(|step| step.segments())
            .map(str::to_string)
            .collect()
    }

    /// Number of memo checkpoints in the plan
    pub fn memo_checks(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.kind == StepKind::MemoCheck)
            .count()
    }
}

/// Cost model and pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Estimated cost of a key lookup
    pub navigate_cost: Duration,

    /// Estimated cost of an index lookup
    pub direct_access_cost: Duration,

    /// Estimated cost of a memo lookup
    pub memo_check_cost: Duration,

    /// Steps costlier than this get a memo checkpoint at level 2
    pub memo_threshold: Duration,

    /// Whether level 2 inserts memo checkpoints at all
    pub memoization_enabled: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            navigate_cost: Duration::from_micros(10),
            direct_access_cost: Duration::from_micros(5),
            memo_check_cost: Duration::from_micros(2),
            memo_threshold: Duration::from_micros(50),
            memoization_enabled: true,
        }
    }
}

/// Query planner
#[derive(Debug, Clone, Default)]
pub struct QueryPlanner {
    config: PlannerConfig,
}

impl QueryPlanner {
    /// Create a planner with the default cost model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner with a custom cost model
    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compile `path` into a plan at the given level
    pub fn plan(&self, path: &Path, level: OptimizationLevel) -> QueryPlan {
        let mut steps = self.literal_steps(path);
        let mut applied = BTreeSet::new();

        if level >= OptimizationLevel::Basic {
            steps = eliminate_redundant_steps(steps);
            applied.insert(Optimization::RedundantElimination);

            steps = combine_navigation(steps);
            applied.insert(Optimization::StepCombination);
        }

        if level >= OptimizationLevel::Aggressive && self.config.memoization_enabled {
            steps = self.insert_memo_checks(steps);
            applied.insert(Optimization::Memoization);
            steps = eliminate_redundant_steps(steps);
        }

        let estimated_cost = steps
            .iter()
            .map(|step| step.estimated_cost.as_micros() as u64)
            .sum();

        debug!(
            "Planned {} at level {}: {} steps, cost {}us",
            path,
            level,
            steps.len(),
            estimated_cost
        );

        QueryPlan {
            steps,
            estimated_cost,
            applied_optimizations: applied,
        }
    }

    fn literal_steps(&self, path: &Path) -> Vec<Step> {
        path.segments()
            .iter()
            .map(|segment| {
                if is_numeric_index(segment) {
                    Step::new(StepKind::DirectAccess, segment, self.config.direct_access_cost)
                } else {
                    Step::new(StepKind::Navigate, segment, self.config.navigate_cost)
                }
            })
            .collect()
    }

    /// Put a memo checkpoint in front of every step above the cost threshold
    fn insert_memo_checks(&self, steps: Vec<Step>) -> Vec<Step> {
        let mut out = Vec::with_capacity(steps.len());
        let mut walked: Vec<String> = Vec::new();

        for step in steps {
            if step.kind.moves_cursor() && step.estimated_cost > self.config.memo_threshold {
                out.push(Step::new(
                    StepKind::MemoCheck,
                    walked.join("."),
                    self.config.memo_check_cost,
                ));
            }
            walked.extend(step.segments().into_iter().map(str::to_string));
            out.push(step);
        }

        out
    }
}

/// Drop a step that repeats its predecessor, when repeating it is a no-op
///
/// Only cursor-neutral steps qualify: `a.a` walks two different levels of
/// the tree and both lookups are kept.
fn eliminate_redundant_steps(steps: Vec<Step>) -> Vec<Step> {
    let mut out: Vec<Step> = Vec::with_capacity(steps.len());
    for step in steps {
        let redundant = !step.kind.moves_cursor()
            && out
                .last()
                .is_some_and(|prev| prev.kind == step.kind && prev.target == step.target);
        if !redundant {
            out.push(step);
        }
    }
    out
}

/// Fuse each run of two or more `Navigate` steps into one `CombinedNavigate`
///
/// A segment containing `.` can't be split back out of a joined target, so
/// it ends the run and stays a plain step.
fn combine_navigation(steps: Vec<Step>) -> Vec<Step> {
    let mut out = Vec::with_capacity(steps.len());
    let mut run: Vec<Step> = Vec::new();

    for step in steps {
        if step.kind == StepKind::Navigate && !step.target.contains('.') {
            run.push(step);
        } else {
            flush_run(&mut run, &mut out);
            out.push(step);
        }
    }
    flush_run(&mut run, &mut out);

    out
}

fn flush_run(run: &mut Vec<Step>, out: &mut Vec<Step>) {
    match run.len() {
        0 => {}
        1 => out.append(run),
        _ => {
            let target = run
                .iter()
                .map(|step| step.target.as_str())
                .collect::<Vec<_>>()
                .join(".");
            let cost = run.iter().map(|step| step.estimated_cost).sum();
            out.push(Step::new(StepKind::CombinedNavigate, target, cost));
            run.clear();
        }
    }
}

/// True when `segment` is made only of ASCII digits
pub fn is_numeric_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_query;

    fn plan(query: &str, level: OptimizationLevel) -> QueryPlan {
        QueryPlanner::new().plan(&parse_query(query).unwrap(), level)
    }

    fn kinds(plan: &QueryPlan) -> Vec<StepKind> {
        plan.steps.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_level_none_is_literal() {
        let plan = plan("a.b.1.c", OptimizationLevel::None);
        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::Navigate,
                StepKind::Navigate,
                StepKind::DirectAccess,
                StepKind::Navigate
            ]
        );
        assert_eq!(plan.estimated_cost, 35);
        assert!(plan.applied_optimizations.is_empty());
    }

    #[test]
    fn test_basic_fuses_navigation_runs() {
        let plan = plan("a.b.c.0.d.e", OptimizationLevel::Basic);
        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::CombinedNavigate,
                StepKind::DirectAccess,
                StepKind::CombinedNavigate
            ]
        );
        assert_eq!(plan.steps[0].target, "a.b.c");
        assert_eq!(plan.steps[0].estimated_cost, Duration::from_micros(30));
        assert_eq!(plan.steps[2].target, "d.e");
        assert_eq!(plan.estimated_cost, 55);
        assert!(plan
            .applied_optimizations
            .contains(&Optimization::StepCombination));
    }

    #[test]
    fn test_repeated_segments_are_kept() {
        let plan = plan("a.a.a", OptimizationLevel::Basic);
        assert_eq!(plan.segments(), vec!["a", "a", "a"]);
    }

    #[test]
    fn test_order_is_preserved_at_every_level() {
        for level in [
            OptimizationLevel::None,
            OptimizationLevel::Basic,
            OptimizationLevel::Aggressive,
        ] {
            let plan = plan("a.0.b.1", level);
            assert_eq!(plan.segments(), vec!["a", "0", "b", "1"]);
        }
    }

    #[test]
    fn test_dotted_segments_are_not_fused() {
        let path = Path::new(["a", "b.c", "d", "e"]).unwrap();
        let plan = QueryPlanner::new().plan(&path, OptimizationLevel::Basic);
        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::Navigate,
                StepKind::Navigate,
                StepKind::CombinedNavigate
            ]
        );
        assert_eq!(plan.steps[1].target, "b.c");
        assert_eq!(plan.steps[2].target, "d.e");
    }

    #[test]
    fn test_aggressive_inserts_memo_before_expensive_steps() {
        // six fused lookups cost 60us, over the 50us threshold
        let plan = plan("x.0.a.b.c.d.e.f", OptimizationLevel::Aggressive);
        assert_eq!(
            kinds(&plan),
            vec![
                StepKind::Navigate,
                StepKind::DirectAccess,
                StepKind::MemoCheck,
                StepKind::CombinedNavigate
            ]
        );
        assert_eq!(plan.steps[2].target, "x.0");
        assert_eq!(plan.steps[3].target, "a.b.c.d.e.f");
        assert_eq!(plan.memo_checks(), 1);
        assert_eq!(plan.prefix_before(3), vec!["x", "0"]);
        assert_eq!(plan.estimated_cost, 10 + 5 + 2 + 60);
        assert!(plan.applied_optimizations.contains(&Optimization::Memoization));
    }

    #[test]
    fn test_cheap_plans_get_no_memo_checks() {
        let plan = plan("a.b.0.c", OptimizationLevel::Aggressive);
        assert_eq!(plan.memo_checks(), 0);
    }

    #[test]
    fn test_memoization_disabled() {
        let planner = QueryPlanner::with_config(PlannerConfig {
            memoization_enabled: false,
            ..Default::default()
        });
        let plan = planner.plan(
            &parse_query("a.b.c.d.e.f").unwrap(),
            OptimizationLevel::Aggressive,
        );
        assert_eq!(plan.memo_checks(), 0);
        assert!(!plan.applied_optimizations.contains(&Optimization::Memoization));
    }

    #[test]
    fn test_redundant_memo_checks_collapse() {
        let steps = vec![
            Step::new(StepKind::MemoCheck, "a", Duration::from_micros(2)),
            Step::new(StepKind::MemoCheck, "a", Duration::from_micros(2)),
            Step::new(StepKind::Navigate, "b", Duration::from_micros(10)),
            Step::new(StepKind::Navigate, "b", Duration::from_micros(10)),
        ];
        let out = eliminate_redundant_steps(steps);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].kind, StepKind::MemoCheck);
    }

    #[test]
    fn test_optimization_level_conversion() {
        assert_eq!(OptimizationLevel::try_from(1).unwrap(), OptimizationLevel::Basic);
        assert_eq!(
            OptimizationLevel::try_from(3).unwrap_err(),
            Error::InvalidOptimizationLevel(3)
        );
        assert_eq!(serde_json::to_string(&OptimizationLevel::Aggressive).unwrap(), "2");
        let level: OptimizationLevel = serde_json::from_str("0").unwrap();
        assert_eq!(level, OptimizationLevel::None);
        assert!(serde_json::from_str::<OptimizationLevel>("7").is_err());
    }

    #[test]
    fn test_is_numeric_index() {
        assert!(is_numeric_index("0"));
        assert!(is_numeric_index("42"));
        assert!(!is_numeric_index(""));
        assert!(!is_numeric_index("4a"));
        assert!(!is_numeric_index("-1"));
    }
}
