//! CORS (Cross-Origin Resource Sharing) configuration
//!
//! Browser front ends call the query API from another origin. Development
//! setups allow any origin; deployments list the origins they serve.

use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// CORS configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
    /// Whether to allow credentials
    pub allow_credentials: bool,
    /// Maximum age for preflight cache (in seconds)
    pub max_age_secs: u64,
    /// Allowed HTTP methods
    pub allowed_methods: Vec<Method>,
    /// Allowed request headers
    pub allowed_headers: Vec<String>,
    /// Enable permissive mode (development only)
    pub permissive: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allow_credentials: false,
            max_age_secs: 3600,
            allowed_methods: vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS],
            allowed_headers: vec![
                "Origin".to_string(),
                "Content-Type".to_string(),
                "Accept".to_string(),
            ],
            permissive: true,
        }
    }
}

impl CorsConfig {
    /// Allow every origin
    pub fn development() -> Self {
        Self {
            permissive: true,
            ..Default::default()
        }
    }

    /// Only allow `origins`
    pub fn production(origins: Vec<String>) -> Self {
        Self {
            allowed_origins: origins,
            max_age_secs: 86400,
            permissive: false,
            ..Default::default()
        }
    }

    /// Create CORS configuration from environment variables
    ///
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated list of allowed origins
    /// - `CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `CORS_MAX_AGE`: max age in seconds (default: 3600)
    /// - `CORS_PERMISSIVE`: "true" to allow every origin (default: true
    ///   when no origins are listed)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let allowed_origins: Vec<String> = lookup("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let allow_credentials = lookup("CORS_ALLOW_CREDENTIALS")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_age_secs = lookup("CORS_MAX_AGE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let permissive = lookup("CORS_PERMISSIVE")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(allowed_origins.is_empty());

        Self {
            allowed_origins,
            allow_credentials,
            max_age_secs,
            permissive,
            ..Default::default()
        }
    }

    /// Build the tower-http CorsLayer from this configuration
    pub fn build_layer(&self) -> CorsLayer {
        if self.permissive {
            return CorsLayer::permissive();
        }

        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| {
                origin.parse().ok().or_else(|| {
                    tracing::warn!("CORS: Invalid origin format: {}", origin);
                    None
                })
            })
            .collect();

        let mut layer = CorsLayer::new();
        if origins.is_empty() {
            tracing::warn!("CORS: No valid origins configured, allowing any origin");
            layer = layer.allow_origin(Any);
        } else {
            layer = layer.allow_origin(origins);
            // Credentials can't be combined with a wildcard origin
            if self.allow_credentials {
                layer = layer.allow_credentials(true);
            }
        }

        let headers: Vec<header::HeaderName> = self
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();

        layer
            .allow_methods(self.allowed_methods.clone())
            .allow_headers(headers)
            .max_age(Duration::from_secs(self.max_age_secs))
    }
}
