//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging, then metrics
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::Level;

use crate::config::NoteConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::logging::{init_logging, LoggingError};
use crate::observability::{metrics, TracingSink};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid address {0:?}")]
    Address(String),

    #[error("invalid capture level {0:?}")]
    Level(String),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

/// Bring the service up from a validated configuration and run it.
pub async fn start(config: NoteConfig) -> Result<(), StartupError> {
    init_logging(&config.logging)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        encode_bytes = config.capture.encode_bytes,
        log_file = ?config.logging.file,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let level: Level = config
        .capture
        .level
        .parse()
        .map_err(|_| StartupError::Level(config.capture.level.clone()))?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::new(TracingSink::new(level)));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
