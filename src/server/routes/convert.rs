//! Upload-and-convert endpoint

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use uuid::Uuid;

use crate::convert::inspect;
use crate::error::Mesh2PdfError;
use crate::pipeline::input::{has_mesh_extension, require_faces};
use crate::pipeline::paths::{base_file_name, sanitize_file_name};
use crate::progress::Stage;
use crate::server::error::{ApiError, ApiResult};
use crate::server::jobs::JobStatus;
use crate::server::state::AppState;
use crate::server::worker::{ConversionTask, SubmitError};

/// Query parameters for POST /convert
#[derive(Debug, Default, Deserialize)]
pub struct ConvertParams {
    /// Return 202 immediately instead of waiting for the result
    #[serde(default, rename = "async")]
    pub run_async: bool,
}

/// Response for a finished conversion
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub download_url: String,
    pub message: String,
    pub job_id: Uuid,
}

/// Response for an accepted asynchronous conversion
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub progress_url: String,
    pub download_url: String,
    pub message: String,
}

/// POST /convert - Upload an OBJ file and convert it to PDF
///
/// Without `?async=true` the response is sent once the job reaches a
/// terminal state: 200 with a download URL, or 500 with the diagnostic.
pub async fn convert_upload(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let (file_name, data) = read_upload(&mut multipart).await?;

    let job_id = Uuid::new_v4();
    tracing::info!("Starting new conversion job: {} ({})", job_id, file_name);

    // Job-qualified, sanitised name: "<uuid>_<name>.obj" with only [A-Za-z0-9] kept.
    // Client directories go first so they cannot swallow the id.
    let stored_name =
        sanitize_file_name(&format!("{job_id}_{}", base_file_name(&file_name)));
    let config = state.config();
    let input_path = save_upload(&config.upload_dir, &stored_name, data).await?;

    // Reject meshes without faces before a worker slot is spent on them
    let checked = match inspect(&input_path).await {
        Ok(stats) => require_faces(&input_path, &stats),
        Err(e) => Err(e),
    };
    if let Err(e) = checked {
        remove_upload(&input_path).await;
        return Err(ApiError::from(e));
    }

    let stem = Path::new(&stored_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| job_id.simple().to_string());
    let output_path = config.output_dir.join(format!("{stem}.pdf"));
    tracing::info!("Output PDF will be: {}", output_path.display());

    let registry = state.registry();
    let entry = registry
        .register(job_id, input_path.clone(), output_path.clone())
        .ok_or_else(|| ApiError::Internal(format!("Job id {job_id} already registered")))?;
    entry.update(
        i32::from(Stage::Upload.global_percent(100)),
        "Upload received. Waiting for a worker...",
    );
    let receiver = entry.subscribe();

    let task = ConversionTask {
        job_id,
        input_path: input_path.clone(),
        output_path,
    };
    if let Err(e) = state.queue().try_submit(task) {
        registry.fail(&job_id, e.to_string());
        remove_upload(&input_path).await;
        return Err(match e {
            SubmitError::Full(_) => ApiError::QueueFull,
            SubmitError::Closed(_) => ApiError::Internal(e.to_string()),
        });
    }

    if params.run_async {
        let body = AcceptedResponse {
            success: true,
            job_id,
            progress_url: state.progress_url(&job_id),
            download_url: state.download_url(&job_id),
            message: "Conversion started".to_string(),
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let status = wait_for_terminal(receiver).await?;
    if status.succeeded() {
        let download_url = state.download_url(&job_id);
        tracing::info!("Conversion successful, download URL: {}", download_url);
        Ok(Json(ConvertResponse {
            success: true,
            download_url,
            message: "Conversion successful".to_string(),
            job_id,
        })
        .into_response())
    } else {
        Err(ApiError::ConversionFailed(format!(
            "Error during conversion: {}",
            status.message
        )))
    }
}

/// Pull the `file` field out of the form, validating before anything is read
/// into memory or written to disk.
async fn read_upload(multipart: &mut Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Rejected {
        status: e.status(),
        message: format!("Invalid multipart body: {}", e.body_text()),
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest("No selected file".to_string()));
        }
        if !has_mesh_extension(&file_name) {
            return Err(ApiError::BadRequest("Invalid file type".to_string()));
        }

        let data = field.bytes().await.map_err(|e| ApiError::Rejected {
            status: e.status(),
            message: format!("Failed to read upload: {}", e.body_text()),
        })?;
        return Ok((file_name, data));
    }

    Err(ApiError::BadRequest("No file part".to_string()))
}

/// Write the upload atomically: a temp file in the same directory, renamed
/// into place once complete.
async fn save_upload(dir: &Path, name: &str, data: Bytes) -> ApiResult<PathBuf> {
    let dir = dir.to_path_buf();
    let target = dir.join(name);
    tracing::info!("Saving file to: {} ({} bytes)", target.display(), data.len());

    let stored = tokio::task::spawn_blocking(move || -> Result<PathBuf, Mesh2PdfError> {
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::Builder::new()
                .prefix(".upload-")
                .tempfile_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|source| Mesh2PdfError::UploadWriteFailed {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Upload task failed: {e}")))?;
    Ok(stored?)
}

async fn remove_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }
}

async fn wait_for_terminal(mut receiver: watch::Receiver<JobStatus>) -> ApiResult<JobStatus> {
    let status = receiver
        .wait_for(JobStatus::is_terminal)
        .await
        .map_err(|_| ApiError::Internal("Job was dropped before finishing".to_string()))?;
    Ok(status.clone())
}
