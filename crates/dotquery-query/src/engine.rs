//! Query engine service
//!
//! [`QueryEngine`] is the single entry point for evaluating path queries. It
//! owns the plan cache, the statistics and the provider registry, and is
//! meant to be shared behind an `Arc` by every request handler. Evaluation
//! never fails: every error is folded into the returned
//! [`EvaluationResult`].

use crate::cache::{CacheConfig, PlanCache};
use crate::executor::{Outcome, QueryExecutor};
use crate::parser::{parse_query, Path};
use crate::planner::{OptimizationLevel, PlannerConfig, QueryPlan, QueryPlanner};
use dotquery_core::{
    DEFAULT_PROVIDER, Error, ErrorKind, ProviderRegistry, Result, TreeProvider, TreeValue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cost model and pass settings
    pub planner: PlannerConfig,

    /// Plan cache limits
    pub cache: CacheConfig,

    /// Whether compiled plans are cached at all
    pub cache_enabled: bool,

    /// Level used when a caller does not pick one
    pub default_level: OptimizationLevel,

    /// Provider used when a caller does not pick one
    pub default_provider: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            cache: CacheConfig::default(),
            cache_enabled: true,
            default_level: OptimizationLevel::Aggressive,
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }
}

impl EngineConfig {
    /// No caching, literal plans; useful when comparing raw traversal cost
    pub fn unoptimized() -> Self {
        Self {
            cache_enabled: false,
            default_level: OptimizationLevel::None,
            planner: PlannerConfig {
                memoization_enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Set the default optimization level
    pub fn with_default_level(mut self, level: OptimizationLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Set the plan cache limits
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Enable or disable plan caching
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Enable or disable memo checkpoints
    pub fn with_memoization(mut self, enabled: bool) -> Self {
        self.planner.memoization_enabled = enabled;
        self
    }
}

/// Timings of a document evaluation, in microseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub parse_us: u64,
    pub query_us: u64,
    pub total_us: u64,
    pub provider: String,
}

/// Outcome of one query, success or failure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Whether the path resolved
    pub found: bool,

    /// The subtree at the path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TreeValue>,

    /// Parsed segments (empty if the query did not compile)
    pub path: Vec<String>,

    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    /// Segment at which navigation stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_target: Option<String>,

    /// Only set by document-level evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
}

impl EvaluationResult {
    fn failed(path: Vec<String>, error: &Error) -> Self {
        let failing_target = match error {
            Error::NotFound { target } => Some(target.clone()),
            _ => None,
        };
        Self {
            found: false,
            value: None,
            path,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            failing_target,
            performance: None,
        }
    }

    fn from_outcome(path: &Path, outcome: Outcome<'_>) -> Self {
        match outcome.into_result() {
            Ok(value) => Self {
                found: true,
                value: Some(value.clone()),
                path: path.segments().to_vec(),
                ..Default::default()
            },
            Err(err) => Self::failed(path.segments().to_vec(), &err),
        }
    }

    /// Returns true if the query text itself was rejected
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self.error_kind,
            Some(ErrorKind::Lexical) | Some(ErrorKind::Syntax)
        )
    }
}

/// Engine-wide counters, cleared only by [`QueryEngine::reset_stats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub optimized_queries: u64,
    pub optimizations_applied: u64,
    pub not_found: u64,
    pub failed_queries: u64,
    pub total_planning_time_us: u64,
    pub average_planning_time_us: f64,
}

impl EngineStats {
    fn record_planning(&mut self, plan: &QueryPlan, level: OptimizationLevel, elapsed_us: u64) {
        self.cache_misses += 1;
        if level > OptimizationLevel::None {
            self.optimized_queries += 1;
        }
        self.optimizations_applied += plan.applied_optimizations.len() as u64;
        self.total_planning_time_us += elapsed_us;
        self.average_planning_time_us =
            self.total_planning_time_us as f64 / self.cache_misses as f64;
    }
}

/// Where a compiled plan came from
enum Planning {
    Cached,
    Built { elapsed_us: u64 },
}

/// Shared query engine
pub struct QueryEngine {
    config: EngineConfig,
    planner: QueryPlanner,
    cache: PlanCache,
    providers: ProviderRegistry,
    stats: RwLock<EngineStats>,
}

impl QueryEngine {
    /// Create an engine with the bundled providers
    pub fn new(config: EngineConfig) -> Self {
        Self::with_providers(config, ProviderRegistry::new())
    }

    /// Create an engine with a custom provider registry
    pub fn with_providers(config: EngineConfig, providers: ProviderRegistry) -> Self {
        if providers.get(&config.default_provider).is_err() {
            warn!(
                "Default provider {:?} is not registered; document queries without an explicit provider will fail",
                config.default_provider
            );
        }
        Self {
            planner: QueryPlanner::with_config(config.planner.clone()),
            cache: PlanCache::new(config.cache.clone()),
            providers,
            stats: RwLock::new(EngineStats::default()),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the provider registry
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Evaluate `query` against an already decoded tree
    pub fn evaluate(
        &self,
        query: &str,
        tree: &TreeValue,
        level: OptimizationLevel,
    ) -> EvaluationResult {
        let mut executor = QueryExecutor::new(tree);
        self.run(query, level, &self.config.default_provider, &mut executor)
    }

    /// Evaluate several queries against one tree
    ///
    /// All queries share one executor, so memo checkpoints recorded by an
    /// earlier query shorten the walk of later ones with the same prefix.
    pub fn evaluate_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        tree: &TreeValue,
        level: OptimizationLevel,
    ) -> Vec<EvaluationResult> {
        self.run_batch(queries, tree, level, &self.config.default_provider)
    }

    /// Decode `text` once, then evaluate every query against it
    ///
    /// Fails only when the document cannot be decoded; each query failure
    /// is reported in its own result.
    pub fn evaluate_document_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        text: &str,
        provider: Option<&str>,
        level: OptimizationLevel,
    ) -> Result<Vec<EvaluationResult>> {
        let provider_name = provider.unwrap_or(&self.config.default_provider);
        let tree = self.decode(provider_name, text).inspect_err(|_| {
            self.update_stats(|stats| {
                stats.total_queries += queries.len() as u64;
                stats.failed_queries += queries.len() as u64;
            });
        })?;
        Ok(self.run_batch(queries, &tree, level, provider_name))
    }

    /// Decode `text` with a provider, then evaluate `query` against it
    ///
    /// `provider` falls back to the configured default.
    pub fn evaluate_document(
        &self,
        query: &str,
        text: &str,
        provider: Option<&str>,
        level: OptimizationLevel,
    ) -> EvaluationResult {
        let provider_name = provider.unwrap_or(&self.config.default_provider);
        let provider = self.providers.get(provider_name);
        self.evaluate_with(query, text, provider_name, provider, level)
    }

    /// Evaluate `query` on `text` once per registered provider
    pub fn compare_providers(
        &self,
        query: &str,
        text: &str,
        level: OptimizationLevel,
    ) -> BTreeMap<String, EvaluationResult> {
        self.providers
            .iter()
            .map(|(name, provider)| {
                let result = self.evaluate_with(query, text, name, Ok(Arc::clone(provider)), level);
                (name.to_string(), result)
            })
            .collect()
    }

    fn evaluate_with(
        &self,
        query: &str,
        text: &str,
        provider_name: &str,
        provider: Result<Arc<dyn TreeProvider>>,
        level: OptimizationLevel,
    ) -> EvaluationResult {
        let start = Instant::now();

        let tree = match provider.and_then(|provider| provider.parse(text)) {
            Ok(tree) => tree,
            Err(err) => {
                self.update_stats(|stats| {
                    stats.total_queries += 1;
                    stats.failed_queries += 1;
                });
                let mut result = EvaluationResult::failed(Vec::new(), &err);
                result.performance = Some(Performance {
                    parse_us: elapsed_us(start),
                    query_us: 0,
                    total_us: elapsed_us(start),
                    provider: provider_name.to_string(),
                });
                return result;
            }
        };
        let parse_us = elapsed_us(start);

        let query_start = Instant::now();
        let mut executor = QueryExecutor::new(&tree);
        let mut result = self.run(query, level, provider_name, &mut executor);
        let query_us = elapsed_us(query_start);

        result.performance = Some(Performance {
            parse_us,
            query_us,
            total_us: elapsed_us(start),
            provider: provider_name.to_string(),
        });
        result
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> EngineStats {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Zero every counter
    pub fn reset_stats(&self) {
        *self.stats.write().unwrap_or_else(PoisonError::into_inner) = EngineStats::default();
        debug!("Engine statistics reset");
    }

    /// Drop every cached plan
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Plan cache cleared");
    }

    /// Number of cached plans
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn decode(&self, provider: &str, text: &str) -> Result<TreeValue> {
        self.providers.get(provider)?.parse(text)
    }

    fn run_batch<S: AsRef<str>>(
        &self,
        queries: &[S],
        tree: &TreeValue,
        level: OptimizationLevel,
        provider: &str,
    ) -> Vec<EvaluationResult> {
        let mut executor = QueryExecutor::new(tree);
        let results = queries
            .iter()
            .map(|query| self.run(query.as_ref(), level, provider, &mut executor))
            .collect();

        debug!(
            "Batch of {} queries: {} lookups, {} memo hits",
            queries.len(),
            executor.stats().lookups,
            executor.stats().memo_hits
        );
        results
    }

    fn run<'t>(
        &self,
        query: &str,
        level: OptimizationLevel,
        provider: &str,
        executor: &mut QueryExecutor<'t>,
    ) -> EvaluationResult {
        let (path, plan, planning) = match self.compile(query, level, provider) {
            Ok(compiled) => compiled,
            Err(err) => {
                debug!("Query {:?} rejected: {}", query, err);
                self.update_stats(|stats| {
                    stats.total_queries += 1;
                    stats.failed_queries += 1;
                });
                return EvaluationResult::failed(Vec::new(), &err);
            }
        };

        let outcome = executor.execute(&plan);
        let found = outcome.is_found();
        self.update_stats(|stats| {
            match planning {
                Planning::Cached => stats.cache_hits += 1,
                Planning::Built { elapsed_us } => stats.record_planning(&plan, level, elapsed_us),
            }
            stats.total_queries += 1;
            if !found {
                stats.not_found += 1;
            }
        });

        EvaluationResult::from_outcome(&path, outcome)
    }

    /// Parse `query` and fetch or build its plan
    fn compile(
        &self,
        query: &str,
        level: OptimizationLevel,
        provider: &str,
    ) -> Result<(Path, Arc<QueryPlan>, Planning)> {
        let path = parse_query(query)?;

        if !self.config.cache_enabled {
            let (plan, planning) = self.build_plan(&path, level);
            return Ok((path, plan, planning));
        }

        let key = PlanCache::key(provider, level, &path);
        if let Some(plan) = self.cache.get(&key) {
            debug!("Plan cache hit for {}", path);
            return Ok((path, plan, Planning::Cached));
        }

        let (plan, planning) = self.build_plan(&path, level);
        self.cache.put(key, Arc::clone(&plan));
        Ok((path, plan, planning))
    }

    fn build_plan(&self, path: &Path, level: OptimizationLevel) -> (Arc<QueryPlan>, Planning) {
        let start = Instant::now();
        let plan = self.planner.plan(path, level);
        let planning = Planning::Built {
            elapsed_us: elapsed_us(start),
        };
        (Arc::new(plan), planning)
    }

    fn update_stats(&self, update: impl FnOnce(&mut EngineStats)) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("providers", &self.providers)
            .finish()
    }
}

fn elapsed_us(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}
