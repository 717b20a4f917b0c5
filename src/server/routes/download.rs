//! Document download

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use std::path::{Path as FsPath, PathBuf};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::server::error::{ApiError, ApiResult};
use crate::server::state::AppState;

/// GET /download/:job_id - Serve the finished PDF as an attachment
///
/// Looks in the job table first. Documents produced before a restart (or
/// after eviction) are found by scanning the output directory.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let recorded = Uuid::parse_str(&job_id)
        .ok()
        .and_then(|id| state.registry().output_path(&id));

    let path = match recorded {
        Some(p) if tokio::fs::try_exists(&p).await.unwrap_or(false) => p,
        _ => find_output_by_job_id(&state.config().output_dir, &job_id)
            .await
            .ok_or_else(|| {
                tracing::warn!("PDF not found for job: {}", job_id);
                ApiError::FileNotFound
            })?,
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{job_id}.pdf"));
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read {}: {}", path.display(), e)))?
        .len();
    tracing::info!("Serving PDF for download: {} ({} bytes)", path.display(), len);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Find a `.pdf` in `dir` whose name, with hyphens removed, contains the
/// job id with hyphens removed.
///
/// Sanitised upload names drop the id's hyphens, so both sides are
/// normalised. With several matches the lexicographically first wins.
pub async fn find_output_by_job_id(dir: &FsPath, job_id: &str) -> Option<PathBuf> {
    let needle = job_id.replace('-', "");
    if needle.is_empty() {
        return None;
    }

    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut matches = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".pdf") && name.replace('-', "").contains(&needle) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    matches.into_iter().next()
}
