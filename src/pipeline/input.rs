//! Input resolution: validate a user-supplied mesh path.
//!
//! Checks run in the order a user would fix them: existence, then read
//! permission, then the extension. The OBJ body is only scanned for
//! statistics, never parsed into geometry; the external tool owns that.

use crate::error::Mesh2PdfError;
use crate::output::MeshStats;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The only accepted mesh extension (compared case-insensitively).
pub const MESH_EXTENSION: &str = "obj";

/// True when `name` ends in `.obj`, ignoring case.
pub fn has_mesh_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && ext.eq_ignore_ascii_case(MESH_EXTENSION),
        None => false,
    }
}

/// Resolve a local mesh path, validating existence, permission and extension.
pub fn resolve_mesh(path: impl AsRef<Path>) -> Result<PathBuf, Mesh2PdfError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(Mesh2PdfError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Mesh2PdfError::PermissionDenied { path });
        }
        Err(_) => return Err(Mesh2PdfError::FileNotFound { path }),
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !has_mesh_extension(&name) {
        return Err(Mesh2PdfError::UnsupportedExtension { path });
    }

    debug!("Resolved local mesh: {}", path.display());
    Ok(path)
}

/// Count the records of an OBJ file.
///
/// Runs on the blocking pool; OBJ exports of scanned parts are routinely
/// several hundred megabytes.
pub async fn inspect_mesh(path: &Path) -> Result<MeshStats, Mesh2PdfError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || scan_obj(&owned))
        .await
        .map_err(|e| Mesh2PdfError::StageAborted {
            stage: "inspect",
            detail: e.to_string(),
        })?
}

/// Reject a mesh with no `f` records; the tools cannot build a scene from
/// a point cloud.
pub fn require_faces(path: &Path, stats: &MeshStats) -> Result<(), Mesh2PdfError> {
    if stats.faces == 0 {
        return Err(Mesh2PdfError::EmptyMesh {
            path: path.to_path_buf(),
            vertices: stats.vertices,
        });
    }
    Ok(())
}

fn scan_obj(path: &Path) -> Result<MeshStats, Mesh2PdfError> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Mesh2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Mesh2PdfError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    let file_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);

    let mut stats = MeshStats {
        file_bytes,
        ..MeshStats::default()
    };
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| Mesh2PdfError::Internal(format!("reading {}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        count_record(&line, &mut stats);
    }
    Ok(stats)
}

fn count_record(line: &[u8], stats: &mut MeshStats) {
    let trimmed = line.trim_ascii_start();
    let keyword = trimmed
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or_default();
    match keyword {
        b"v" => stats.vertices += 1,
        b"f" => stats.faces += 1,
        b"vn" => stats.normals += 1,
        b"vt" => stats.texcoords += 1,
        b"g" | b"o" => stats.groups += 1,
        _ => {}
    }
}
