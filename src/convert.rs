//! Conversion entry points.
//!
//! [`convert`] sequences the two external stages, maps their progress onto
//! the global scale and turns every failure, panics included, into a
//! `Err(Mesh2PdfError)`. Success is decided by one thing only: the PDF exists
//! on disk after the embedder exits cleanly.

use crate::config::ConversionConfig;
use crate::error::Mesh2PdfError;
use crate::output::{ConversionOutput, ConversionStats, MeshStats};
use crate::pipeline::embed::{CommandEmbedder, DocumentEmbedder};
use crate::pipeline::mesh::{CommandMeshConverter, MeshConverter};
use crate::pipeline::paths::ConversionPaths;
use crate::pipeline::input;
use crate::progress::{Stage, StageReporter};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Convert an OBJ file to a PDF with an embedded 3D model.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`  — Path to a local `.obj` file
/// * `output` — Where to write the PDF; defaults to `<work_dir>/pdf/<base>.pdf`
/// * `config` — Conversion configuration
///
/// # Errors
/// Any failure is logged, forwarded to the progress callback's
/// `on_failure`, and returned. A panic inside an injected converter is caught
/// and reported as [`Mesh2PdfError::StageAborted`].
pub async fn convert(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Mesh2PdfError> {
    let input = input.as_ref();
    let reporter = StageReporter::new(config.progress_callback.clone());

    let result = match AssertUnwindSafe(run(input, output, config, &reporter))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(Mesh2PdfError::StageAborted {
            stage: "conversion",
            detail: panic_message(panic.as_ref()),
        }),
    };

    if let Err(ref e) = result {
        error!("Error converting {} to PDF: {}", input.display(), e);
        reporter.fail(&e.to_string());
    }
    result
}

async fn run(
    input_path: &Path,
    output: Option<&Path>,
    config: &ConversionConfig,
    reporter: &StageReporter,
) -> Result<ConversionOutput, Mesh2PdfError> {
    let total_start = Instant::now();
    info!("Starting conversion: {}", input_path.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let mesh_path = input::resolve_mesh(input_path)?;

    // ── Step 2: Inspect mesh ─────────────────────────────────────────────
    let mesh = input::inspect_mesh(&mesh_path).await?;
    input::require_faces(&mesh_path, &mesh)?;
    debug!(
        "Mesh has {} vertices, {} faces",
        mesh.vertices, mesh.faces
    );

    // ── Step 3: Derive paths ─────────────────────────────────────────────
    let paths = ConversionPaths::derive(&mesh_path, output, &config.work_dir)?;
    paths.ensure_dirs().await?;
    let title = config.title_for(&paths.base_name);

    // ── Step 4: OBJ → U3D ────────────────────────────────────────────────
    info!("Converting {} to U3D", mesh_path.display());
    reporter.report(Stage::Load, 0, "Loading 3D model...");
    let mesh_start = Instant::now();
    resolve_mesh_converter(config)
        .convert(&mesh_path, &paths.interchange, config.target_faces, reporter)
        .await?;
    if !tokio::fs::try_exists(&paths.interchange).await.unwrap_or(false) {
        return Err(Mesh2PdfError::OutputMissing {
            path: paths.interchange.clone(),
        });
    }
    let mesh_duration_ms = mesh_start.elapsed().as_millis() as u64;
    info!(
        "U3D written to {} in {}ms",
        paths.interchange.display(),
        mesh_duration_ms
    );

    // ── Step 5: U3D → PDF ────────────────────────────────────────────────
    info!("Creating PDF with embedded 3D model: {}", paths.document.display());
    reporter.report(Stage::Embed, 0, "U3D conversion done. Creating PDF...");
    remove_stale(&paths.document).await?;
    let embed_start = Instant::now();
    resolve_embedder(config)
        .embed(&paths.interchange, &paths.document, &title, reporter)
        .await?;
    let pdf_bytes = match tokio::fs::metadata(&paths.document).await {
        Ok(m) if m.is_file() => m.len(),
        _ => {
            return Err(Mesh2PdfError::OutputMissing {
                path: paths.document.clone(),
            })
        }
    };
    let embed_duration_ms = embed_start.elapsed().as_millis() as u64;

    // ── Step 6: Finish ───────────────────────────────────────────────────
    let interchange_path = if config.remove_intermediate {
        if let Err(e) = tokio::fs::remove_file(&paths.interchange).await {
            warn!("Could not remove {}: {}", paths.interchange.display(), e);
        }
        None
    } else {
        Some(paths.interchange.clone())
    };

    let stats = ConversionStats {
        mesh_duration_ms,
        embed_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        pdf_bytes,
    };

    reporter.report(Stage::Complete, 100, "PDF created successfully");
    info!(
        "Conversion complete! PDF saved to {} ({} bytes, {}ms total)",
        paths.document.display(),
        pdf_bytes,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        pdf_path: paths.document,
        interchange_path,
        title,
        mesh,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Mesh2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Mesh2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, output, config))
}

/// Convert OBJ bytes held in memory.
///
/// `file_name` provides the base name for derived paths (`cube.obj` →
/// `<work_dir>/pdf/cube.pdf`). The bytes are staged in a managed temp
/// directory that is removed on return.
pub async fn convert_bytes(
    bytes: &[u8],
    file_name: &str,
    output: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Mesh2PdfError> {
    let name = Path::new(file_name)
        .file_name()
        .ok_or_else(|| Mesh2PdfError::UnsupportedExtension {
            path: file_name.into(),
        })?;
    let staging = tempfile::tempdir()
        .map_err(|e| Mesh2PdfError::Internal(format!("tempdir: {e}")))?;
    let path = staging.path().join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Mesh2PdfError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    // `staging` is dropped (and the copy deleted) when `convert` returns
    convert(&path, output, config).await
}

/// Count the records of an OBJ file without converting it.
///
/// Does not require either external tool.
pub async fn inspect(input: impl AsRef<Path>) -> Result<MeshStats, Mesh2PdfError> {
    let path = input::resolve_mesh(input)?;
    input::inspect_mesh(&path).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// An injected converter wins over the configured command.
fn resolve_mesh_converter(config: &ConversionConfig) -> Arc<dyn MeshConverter> {
    match config.mesh_converter {
        Some(ref c) => Arc::clone(c),
        None => Arc::new(CommandMeshConverter::new(
            config.mesh_tool.clone(),
            config.mesh_timeout_secs,
        )),
    }
}

/// An injected embedder wins over the configured command.
fn resolve_embedder(config: &ConversionConfig) -> Arc<dyn DocumentEmbedder> {
    match config.embedder {
        Some(ref e) => Arc::clone(e),
        None => Arc::new(CommandEmbedder::new(
            config.embed_tool.clone(),
            config.embed_timeout_secs,
        )),
    }
}

/// A PDF left over from an earlier run must not count as success.
async fn remove_stale(path: &Path) -> Result<(), Mesh2PdfError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Mesh2PdfError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}
