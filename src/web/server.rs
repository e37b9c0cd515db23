//! Web server using Axum.

use std::net::SocketAddr;
use std::sync::Arc;

use super::router::create_app_router;
use crate::error::{Error, Result};
use crate::receiver::Receiver;

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
    pub max_body_bytes: usize,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 8900,
            host: "0.0.0.0".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Run the receiver until Ctrl-C.
pub async fn run_server(config: WebServerConfig, receiver: Arc<Receiver>) -> Result<()> {
    let app = create_app_router(receiver, config.max_body_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
