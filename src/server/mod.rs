//! HTTP server assembly
//!
//! Builds the shared application state, the router, and the serving
//! loop with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::engines::EngineTable;
use crate::error::{PosternError, Result};
use crate::fetch::FetchClient;
use crate::mounts::MountTable;
use crate::rewrite::ContentRewriter;
use crate::tunnel::TunnelRegistry;

pub mod dispatch;
pub mod handlers;
pub mod routes;

/// Shared state for all handlers. Everything here is immutable after
/// startup except the tunnel registry, which tracks live sessions.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetch: FetchClient,
    pub rewriter: Arc<ContentRewriter>,
    pub engines: Arc<EngineTable>,
    pub mounts: Arc<MountTable>,
    pub tunnels: TunnelRegistry,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let fetch = FetchClient::new(&config.fetch)?;
        let rewriter = Arc::new(ContentRewriter::new(&config.rewrite));
        let engines = Arc::new(EngineTable::new());
        let mounts = Arc::new(MountTable::new(&engines)?);

        Ok(Self {
            config: Arc::new(config),
            fetch,
            rewriter,
            engines,
            mounts,
            tunnels: TunnelRegistry::new(),
            started_at: Instant::now(),
        })
    }
}

/// The proxy server
pub struct ProxyServer {
    state: AppState,
}

impl ProxyServer {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            state: AppState::new(config)?,
        })
    }

    /// Run until the shutdown channel flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self
            .state
            .config
            .server_addr()
            .parse()
            .map_err(|e| PosternError::InvalidConfig(format!("bind address: {}", e)))?;

        let router = routes::create_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            mounts = self.state.mounts.len(),
            tunnel = self.state.config.tunnel.enabled,
            "proxy server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| PosternError::Internal(e.to_string()))?;

        info!("proxy server shut down");
        Ok(())
    }
}
