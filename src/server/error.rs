//! HTTP error responses.
//!
//! Two body shapes are used, one per kind of client:
//!
//! * `{"success": false, "message": …}` for `/convert`
//! * `{"error": …}` for lookups (`/progress`, `/download`)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::Mesh2PdfError;

/// Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Handler error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client sent something unusable
    #[error("{0}")]
    BadRequest(String),

    /// Multipart body rejected by the extractor (size limit, malformed)
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// The conversion ran and failed
    #[error("{0}")]
    ConversionFailed(String),

    /// Every worker is busy and the queue is full
    #[error("Server busy: conversion queue is full, retry later")]
    QueueFull,

    /// No job with this id
    #[error("Job not found")]
    JobNotFound,

    /// No document for this id
    #[error("File not found")]
    FileNotFound,

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::ConversionFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::JobNotFound | ApiError::FileNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<Mesh2PdfError> for ApiError {
    fn from(e: Mesh2PdfError) -> Self {
        if e.is_input_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{} -> {}", status, self);
        } else {
            tracing::warn!("{} -> {}", status, self);
        }

        let body = match self {
            ApiError::JobNotFound | ApiError::FileNotFound => json!({ "error": self.to_string() }),
            other => json!({ "success": false, "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
