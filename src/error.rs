//! Error types for the mesh2pdf library.
//!
//! Every fallible operation returns [`Mesh2PdfError`]. A conversion either
//! produces a document or fails as a whole; there is no partial-success
//! state, so one error type is enough.
//!
//! Variants are grouped by where they arise (input validation, the two
//! external stages, I/O, configuration) so callers such as the HTTP layer can
//! classify them with [`Mesh2PdfError::is_input_error`] without matching on
//! every variant.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mesh2pdf library.
#[derive(Debug, Error)]
pub enum Mesh2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Mesh file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file does not carry the `.obj` extension.
    #[error("Unsupported file type '{path}': only .obj meshes are accepted")]
    UnsupportedExtension { path: PathBuf },

    /// The OBJ file parsed but declares no faces.
    #[error("Mesh '{path}' contains no faces ({vertices} vertices)")]
    EmptyMesh { path: PathBuf, vertices: usize },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The mesh-to-U3D converter reported failure.
    #[error("U3D conversion failed for '{input}' (exit code {code:?}): {stderr}")]
    MeshConversionFailed {
        input: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The U3D-to-PDF embedder exited non-zero.
    #[error("PDF creation failed with exit code {code:?}: {stderr}\n{stdout}")]
    EmbedFailed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external program could not be located on `PATH`.
    #[error("External tool '{program}' not found.\nInstall it or point --{flag} at it.")]
    ToolNotFound { program: String, flag: &'static str },

    /// An external program exists but could not be started.
    #[error("Failed to start '{program}': {source}")]
    ToolSpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran longer than its configured timeout.
    #[error("'{program}' timed out after {secs}s")]
    ToolTimeout { program: String, secs: u64 },

    /// A stage reported success but its output file does not exist.
    #[error("Expected output '{path}' was not created")]
    OutputMissing { path: PathBuf },

    /// A stage task panicked or was cancelled.
    #[error("{stage} stage aborted: {detail}")]
    StageAborted { stage: &'static str, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create an output directory or write an output file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not store an uploaded mesh.
    #[error("Failed to write upload '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Mesh2PdfError {
    /// True when the error was caused by the caller's input rather than by a
    /// conversion stage.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::UnsupportedExtension { .. }
                | Self::EmptyMesh { .. }
        )
    }
}
