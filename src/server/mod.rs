//! Web shell: a single-page upload form in front of [`Analyzer`].
//!
//! ## Routes
//!
//! | Method | Path           | Response                                   |
//! |--------|----------------|--------------------------------------------|
//! | GET    | `/`            | page, idle state                           |
//! | POST   | `/analyze`     | page with report / error / rejection       |
//! | POST   | `/api/analyze` | `AnalysisOutcome` as JSON                  |
//! | GET    | `/health`      | `ok`                                       |
//!
//! Requests share nothing but the `Arc<Analyzer>`; every upload gets its own
//! uniquely named temp files, so concurrent sessions don't collide.

pub mod handlers;
pub mod markdown;
pub mod page;

use crate::analyze::Analyzer;
use crate::error::MedImgError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default listen address (loopback, Streamlit's usual port).
pub const DEFAULT_BIND: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 8501));

/// Default request body limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

/// Build the router. Exposed separately from [`serve`] so tests can drive it
/// without a socket.
pub fn router(analyzer: Arc<Analyzer>, config: &ServerConfig) -> Router {
    let state = AppState { analyzer };
    Router::new()
        .route("/", get(handlers::index))
        .route("/analyze", post(handlers::analyze_form))
        .route("/api/analyze", post(handlers::analyze_api))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(analyzer: Arc<Analyzer>, config: ServerConfig) -> Result<(), MedImgError> {
    let app = router(analyzer, &config);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| MedImgError::BindFailed {
            addr: config.bind,
            source,
        })?;
    let local = listener.local_addr().unwrap_or(config.bind);
    info!("Listening on http://{}", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MedImgError::Internal(format!("server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            tracing::warn!("Could not install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
