//! Server implementation

use crate::config::ServerConfig;
use crate::http_server;
use dotquery_core::{Error, Result};
use dotquery_query::QueryEngine;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Running listener and the means to stop it
struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// dotquery HTTP server
pub struct Server {
    /// Server configuration
    config: ServerConfig,

    /// Shared query engine
    engine: Arc<QueryEngine>,

    /// Running state
    running: AtomicBool,

    /// HTTP listener, present while running
    listener: Mutex<Option<Listener>>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let engine = Arc::new(QueryEngine::new(config.engine.clone()));

        Ok(Self {
            config,
            engine,
            running: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the query engine
    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|listener| listener.addr)
    }

    /// Start the server
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::Configuration("Server already running".to_string()));
        }

        info!("Starting dotquery server...");
        info!(
            "Default optimization level {}, plan cache {} (max {} entries)",
            self.config.engine.default_level,
            if self.config.engine.cache_enabled { "enabled" } else { "disabled" },
            self.config.engine.cache.max_entries
        );

        let router = http_server::create_router(Arc::clone(&self.engine), &self.config);
        let tcp = tokio::net::TcpListener::bind(self.config.listen_addr()).await?;
        let addr = tcp.local_addr()?;

        info!("HTTP server listening on {}", addr);

        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(tcp, router).with_graceful_shutdown(async {
                signal.await.ok();
            });
            if let Err(e) = serve.await {
                warn!("HTTP server error: {}", e);
            }
        });

        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(Listener {
            addr,
            shutdown,
            handle,
        });
        self.running.store(true, Ordering::SeqCst);

        info!("dotquery server started successfully");
        Ok(())
    }

    /// Stop the server, waiting for in-flight requests
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running() {
            return Err(Error::Configuration("Server not running".to_string()));
        }

        info!("Stopping dotquery server...");

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let _ = listener.shutdown.send(());
            listener
                .handle
                .await
                .map_err(|e| Error::Internal(format!("HTTP server task failed: {}", e)))?;
        }

        self.running.store(false, Ordering::SeqCst);

        let stats = self.engine.stats();
        info!(
            "dotquery server stopped after {} queries ({} plan cache hits)",
            stats.total_queries, stats.cache_hits
        );
        Ok(())
    }

    /// Get server version
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn create_test_server() -> Server {
        let config = ServerConfig::for_development().http_port(0);
        Server::new(config).unwrap()
    }

    #[test]
    fn test_server_creation() {
        let server = create_test_server();
        assert!(!server.is_running());
        assert!(server.local_addr().is_none());
        assert_eq!(server.config().bind_address, "127.0.0.1");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServerConfig::new().request_timeout_secs(0);
        assert!(matches!(Server::new(config), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_server_start_stop() {
        let server = create_test_server();

        server.start().await.unwrap();
        assert!(server.is_running());
        assert!(server.start().await.is_err());

        let addr = server.local_addr().unwrap();
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("healthy"));

        server.stop().await.unwrap();
        assert!(!server.is_running());
        assert!(server.stop().await.is_err());
    }
}
