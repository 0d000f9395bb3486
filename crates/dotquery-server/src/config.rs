//! Server configuration

use crate::cors::CorsConfig;
use dotquery_core::{Error, Result};
use dotquery_query::{EngineConfig, OptimizationLevel};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_address: String,

    /// HTTP API port (0 picks a free port)
    pub http_port: u16,

    /// Requests running longer than this are answered with 408
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_bytes: usize,

    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,

    /// Query engine settings
    pub engine: EngineConfig,

    /// CORS policy
    #[serde(skip)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            request_timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration for development
    pub fn for_development() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            cors: CorsConfig::development(),
            ..Default::default()
        }
    }

    /// Create configuration for production
    pub fn for_production(origins: Vec<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            cors: CorsConfig::production(origins),
            ..Default::default()
        }
    }

    /// Read overrides from the process environment
    ///
    /// Recognized variables: `DOTQUERY_BIND_ADDRESS`, `DOTQUERY_HTTP_PORT`,
    /// `DOTQUERY_REQUEST_TIMEOUT_SECS`, `DOTQUERY_MAX_BODY_BYTES`,
    /// `DOTQUERY_LOG_LEVEL`, `DOTQUERY_OPTIMIZATION_LEVEL`,
    /// `DOTQUERY_CACHE_ENABLED`, `DOTQUERY_CACHE_SIZE`,
    /// `DOTQUERY_CACHE_TTL_SECS`, `DOTQUERY_MEMOIZATION` and
    /// `DOTQUERY_DEFAULT_PROVIDER`, plus the `CORS_*` set read by
    /// [`CorsConfig::from_env`]. Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            cors: CorsConfig::from_lookup(&lookup),
            ..Default::default()
        };

        if let Some(address) = lookup("DOTQUERY_BIND_ADDRESS") {
            config.bind_address = address;
        }
        if let Some(level) = lookup("DOTQUERY_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(provider) = lookup("DOTQUERY_DEFAULT_PROVIDER") {
            config.engine.default_provider = provider;
        }
        if let Some(port) = parsed(&lookup, "DOTQUERY_HTTP_PORT") {
            config.http_port = port;
        }
        if let Some(secs) = parsed(&lookup, "DOTQUERY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs;
        }
        if let Some(bytes) = parsed(&lookup, "DOTQUERY_MAX_BODY_BYTES") {
            config.max_body_bytes = bytes;
        }
        if let Some(level) = parsed::<u8>(&lookup, "DOTQUERY_OPTIMIZATION_LEVEL") {
            match OptimizationLevel::try_from(level) {
                Ok(level) => config.engine.default_level = level,
                Err(e) => warn!("Ignoring DOTQUERY_OPTIMIZATION_LEVEL: {}", e),
            }
        }
        if let Some(enabled) = parsed(&lookup, "DOTQUERY_CACHE_ENABLED") {
            config.engine.cache_enabled = enabled;
        }
        if let Some(size) = parsed(&lookup, "DOTQUERY_CACHE_SIZE") {
            config.engine.cache.max_entries = size;
        }
        if let Some(secs) = parsed(&lookup, "DOTQUERY_CACHE_TTL_SECS") {
            config.engine.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(enabled) = parsed(&lookup, "DOTQUERY_MEMOIZATION") {
            config.engine.planner.memoization_enabled = enabled;
        }

        config
    }

    /// Check settings that would make the server unusable
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request timeout must be at least one second".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Configuration(
                "maximum body size must be positive".to_string(),
            ));
        }
        if self.engine.cache_enabled && self.engine.cache.ttl.is_zero() {
            return Err(Error::Configuration(
                "plan cache TTL must be positive when caching is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Listener address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builder: set HTTP port
    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Builder: set bind address
    pub fn bind_address(mut self, address: &str) -> Self {
        self.bind_address = address.to_string();
        self
    }

    /// Builder: set request timeout
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Builder: set log level
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    /// Builder: set engine configuration
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Builder: set CORS policy
    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.engine.default_level, OptimizationLevel::Aggressive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .http_port(9000)
            .bind_address("127.0.0.1")
            .request_timeout_secs(5)
            .log_level("debug")
            .engine(EngineConfig::unoptimized());

        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, "debug");
        assert!(!config.engine.cache_enabled);
    }

    #[test]
    fn test_presets() {
        assert!(ServerConfig::for_development().cors.permissive);
        let prod = ServerConfig::for_production(vec!["https://app.example.com".to_string()]);
        assert!(!prod.cors.permissive);
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DOTQUERY_HTTP_PORT", "3001"),
            ("DOTQUERY_OPTIMIZATION_LEVEL", "1"),
            ("DOTQUERY_CACHE_SIZE", "16"),
            ("DOTQUERY_CACHE_TTL_SECS", "60"),
            ("DOTQUERY_MEMOIZATION", "false"),
            ("DOTQUERY_DEFAULT_PROVIDER", "direct"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000"),
        ]));
        assert_eq!(config.http_port, 3001);
        assert_eq!(config.engine.default_level, OptimizationLevel::Basic);
        assert_eq!(config.engine.cache.max_entries, 16);
        assert_eq!(config.engine.cache.ttl, Duration::from_secs(60));
        assert!(!config.engine.planner.memoization_enabled);
        assert_eq!(config.engine.default_provider, "direct");
        assert!(!config.cors.permissive);
    }

    #[test]
    fn test_from_lookup_ignores_bad_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DOTQUERY_HTTP_PORT", "not-a-port"),
            ("DOTQUERY_OPTIMIZATION_LEVEL", "7"),
        ]));
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.engine.default_level, OptimizationLevel::Aggressive);
    }

    #[test]
    fn test_validate() {
        assert!(ServerConfig::new().request_timeout_secs(0).validate().is_err());

        let mut config = ServerConfig::new();
        config.engine.cache.ttl = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.engine.cache_enabled = false;
        assert!(config.validate().is_ok());
    }
}
