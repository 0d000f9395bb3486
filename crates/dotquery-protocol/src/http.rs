//! HTTP/REST API types

use dotquery_core::{ErrorKind, TreeValue};
use dotquery_query::{EngineStats, EvaluationResult, OptimizationLevel, Performance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP API endpoint paths
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const QUERY: &str = "/query";
    pub const QUERY_BATCH: &str = "/query/batch";
    pub const QUERY_COMPARE: &str = "/query/compare";
    pub const OPTIMIZATION_STATS: &str = "/optimization/stats";
    pub const OPTIMIZATION_CACHE: &str = "/optimization/cache";
}

/// Single query request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Document text
    pub json: String,

    /// Dot-path query, e.g. `a.b.2.c`
    pub query: String,

    /// Optimization level (0, 1 or 2); the server default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<OptimizationLevel>,

    /// Tree provider name; the server default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// Several queries against one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQueryRequest {
    pub json: String,
    pub queries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<OptimizationLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// One query run through every registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub json: String,
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<OptimizationLevel>,
}

/// Payload of a query that compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryData {
    /// Value at the path (null when not found)
    pub value: TreeValue,

    pub found: bool,

    /// Parsed path segments
    pub path: Vec<String>,

    /// Segment at which navigation stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_target: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
}

/// Single query response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// False only when the query or document was rejected
    pub success: bool,

    /// Result data (if the query compiled and the document decoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryData>,

    /// Error information (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,

    /// Engine counters after this query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_stats: Option<EngineStats>,
}

impl QueryResponse {
    /// Build a response from an engine result
    ///
    /// A path that does not exist is still a successful response with
    /// `found = false`; only rejected queries and documents fail.
    pub fn from_evaluation(result: EvaluationResult) -> Self {
        match result.error_kind {
            Some(kind) if kind != ErrorKind::Navigation => {
                let message = result.error.unwrap_or_default();
                Self::error(ErrorDto::code_for(kind), &message)
            }
            _ => Self {
                success: true,
                data: Some(QueryData {
                    value: result.value.unwrap_or_default(),
                    found: result.found,
                    path: result.path,
                    failing_target: result.failing_target,
                    performance: result.performance,
                }),
                error: None,
                optimization_stats: None,
            },
        }
    }

    /// Create an error response
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorDto {
                code: code.to_string(),
                message: message.to_string(),
            }),
            optimization_stats: None,
        }
    }

    /// Attach engine counters
    pub fn with_stats(mut self, stats: EngineStats) -> Self {
        self.optimization_stats = Some(stats);
        self
    }
}

/// Batch response body, one entry per query in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQueryResponse {
    pub success: bool,
    pub results: Vec<QueryResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_stats: Option<EngineStats>,
}

/// Provider comparison response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    pub success: bool,

    /// Result per provider name
    pub results: BTreeMap<String, QueryResponse>,
}

/// Error information for HTTP responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDto {
    /// Error code
    pub code: String,

    /// Human-readable message
    pub message: String,
}

impl ErrorDto {
    /// Stable error code for an error class
    pub fn code_for(kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::Lexical => "LEXICAL_ERROR",
            ErrorKind::Syntax => "SYNTAX_ERROR",
            ErrorKind::Navigation => "NOT_FOUND",
            ErrorKind::Document => "DOCUMENT_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Version information
    pub version: String,

    /// Uptime in seconds
    pub uptime_seconds: u64,

    /// Server time, RFC 3339
    pub timestamp: String,
}

impl HealthResponse {
    /// A healthy response stamped with the current time
    pub fn healthy(version: &str, uptime_seconds: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            version: version.to_string(),
            uptime_seconds,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Statistics endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    pub optimization_stats: EngineStats,

    /// Plans currently cached
    pub cache_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"json":"{}","query":"a.b"}"#).unwrap();
        assert_eq!(req.query, "a.b");
        assert!(req.level.is_none());
        assert!(req.library.is_none());

        let req: QueryRequest =
            serde_json::from_str(r#"{"json":"{}","query":"a","level":1,"library":"direct"}"#)
                .unwrap();
        assert_eq!(req.level, Some(OptimizationLevel::Basic));
        assert_eq!(req.library.as_deref(), Some("direct"));
    }

    #[test]
    fn test_query_request_rejects_bad_level() {
        let res = serde_json::from_str::<QueryRequest>(r#"{"json":"{}","query":"a","level":9}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_found_response() {
        let result = EvaluationResult {
            found: true,
            value: Some(TreeValue::from(20)),
            path: vec!["a".to_string(), "1".to_string()],
            ..Default::default()
        };
        let resp = QueryResponse::from_evaluation(result);
        assert!(resp.success);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["data"]["value"], serde_json::json!(20));
        assert_eq!(json["data"]["found"], serde_json::json!(true));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_not_found_is_still_success() {
        let result = EvaluationResult {
            found: false,
            path: vec!["a".to_string(), "b".to_string()],
            error: Some("No value found for segment: b".to_string()),
            error_kind: Some(ErrorKind::Navigation),
            failing_target: Some("b".to_string()),
            ..Default::default()
        };
        let resp = QueryResponse::from_evaluation(result);
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert!(!data.found);
        assert_eq!(data.value, TreeValue::Null);
        assert_eq!(data.failing_target.as_deref(), Some("b"));
    }

    #[test]
    fn test_syntax_error_response() {
        let result = EvaluationResult {
            error: Some("Syntax error".to_string()),
            error_kind: Some(ErrorKind::Syntax),
            ..Default::default()
        };
        let resp = QueryResponse::from_evaluation(result).with_stats(EngineStats::default());
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.error.unwrap().code, "SYNTAX_ERROR");
        assert!(resp.optimization_stats.is_some());
    }

    #[test]
    fn test_health_timestamp_is_rfc3339() {
        let health = HealthResponse::healthy("0.1.0", 5);
        assert_eq!(health.status, "healthy");
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }
}
