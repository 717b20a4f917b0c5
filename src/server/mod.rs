//! HTTP service: upload an OBJ, follow its progress, download the PDF.
//!
//! ```text
//! POST /convert ──▶ JobQueue ──▶ ConversionWorker ──▶ convert()
//!       │                              │
//!       └── waits on ◀── JobRegistry ◀─┘ progress / result
//!                           │
//!   GET /progress/:id ◀─────┘ (watch channel → SSE)
//!   GET /download/:id ◀──── job table, then output-dir scan
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod worker;

use axum::{http::Method, Router};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::Mesh2PdfError;
pub use config::ServerConfig;
pub use state::AppState;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    // CORS layer - must be added last (outermost)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(routes::routes(state.config().max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Run the server until Ctrl+C or SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<(), Mesh2PdfError> {
    let addr = config.bind_addr()?;
    let state = AppState::new(config).await?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Mesh2PdfError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Starting mesh2pdf server on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Mesh2PdfError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
