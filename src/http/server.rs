//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the note handler
//! - Wire up middleware (tracing, timeout, body limit, capture)
//! - Bind server to listener with peer addresses attached
//! - Shut down on signal or internal broadcast

use axum::{http::StatusCode, middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::NoteConfig;
use crate::http::form::FormLimits;
use crate::http::middleware::{capture_middleware, CaptureState};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::RecordSink;

/// HTTP server that records every request it receives.
pub struct HttpServer {
    router: Router,
    config: NoteConfig,
}

impl HttpServer {
    /// Create a new HTTP server emitting records to `sink`.
    pub fn new(config: NoteConfig, sink: Arc<dyn RecordSink>) -> Self {
        let state = CaptureState {
            encoding: config.capture.encoding(),
            parse_forms: config.capture.parse_forms,
            form_limits: FormLimits {
                max_memory: config.capture.multipart_max_memory,
            },
            sink,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &NoteConfig, state: CaptureState) -> Router {
        Router::new()
            .fallback(note_handler)
            .layer(middleware::from_fn_with_state(state, capture_middleware))
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until a shutdown signal or a message on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            encode_bytes = self.config.capture.encode_bytes,
            parse_forms = self.config.capture.parse_forms,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = async {
                        // a dropped coordinator is not a shutdown request
                        if shutdown.recv().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    } => {
                        tracing::info!("Shutdown requested");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request gets an empty 200; the interesting part happened in the
/// capture middleware.
async fn note_handler() -> StatusCode {
    StatusCode::OK
}
