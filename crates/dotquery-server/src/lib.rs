//! dotquery Server
//!
//! Serves the query engine over HTTP.
//!
//! # Features
//!
//! - JSON query, batch and provider-comparison endpoints
//! - Plan cache and statistics management
//! - Environment-driven configuration
//! - CORS and request tracing

pub mod config;
pub mod cors;
pub mod http_server;
pub mod server;

pub use config::ServerConfig;
pub use cors::CorsConfig;
pub use http_server::{create_router, AppState};
pub use server::Server;
