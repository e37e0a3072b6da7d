//! REST API for the danger-prediction service
//!
//! A thin axum layer over [`PredictionService`]: dataset statistics
//! under `/api`, a predict endpoint, and a health endpoint reporting
//! the service lifecycle.

mod api;
mod error;
mod handlers;

pub use api::create_router;
pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::service::PredictionService;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("AVALANCHE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("AVALANCHE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
        }
    }
}

/// Start the API server.
///
/// Warms the service up before binding so the first request does not
/// pay for training. A failed warm-up still binds: the failure stays
/// visible through `/api/health` and every data endpoint.
pub async fn run_server(config: ServerConfig, service: Arc<PredictionService>) -> anyhow::Result<()> {
    match service.ensure_ready() {
        Ok(_) => info!("service warmed up"),
        Err(err) => warn!(error = %err, "warm-up failed, serving unready"),
    }

    let app = create_router(Arc::clone(&service));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, status = %service.status(), "avalanche API listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_reads_env_or_falls_back() {
        let config = ServerConfig::default();
        assert!(!config.host.is_empty());
        assert!(config.port > 0);
    }
}
