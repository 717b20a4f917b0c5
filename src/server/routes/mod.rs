//! HTTP routes for the conversion server

pub mod convert;
pub mod download;
pub mod pages;
pub mod progress;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all routes
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload form and health probe
        .route("/", get(pages::index))
        .route("/health", get(pages::health))
        // Conversion - with larger body limit for mesh uploads
        .route(
            "/convert",
            post(convert::convert_upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Job side-channels
        .route("/progress/:job_id", get(progress::progress_stream))
        .route("/download/:job_id", get(download::download))
}
