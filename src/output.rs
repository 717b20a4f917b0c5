//! Result types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Record counts from a quick scan of an OBJ file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStats {
    /// `v` records.
    pub vertices: usize,
    /// `f` records (polygons, not triangles).
    pub faces: usize,
    /// `vn` records.
    pub normals: usize,
    /// `vt` records.
    pub texcoords: usize,
    /// `g` and `o` records.
    pub groups: usize,
    /// File size on disk.
    pub file_bytes: u64,
}

/// Timing and size information for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub mesh_duration_ms: u64,
    pub embed_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Size of the produced PDF.
    pub pdf_bytes: u64,
}

/// A successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The produced PDF.
    pub pdf_path: PathBuf,
    /// The intermediate U3D file. Absent when it was removed after the run.
    pub interchange_path: Option<PathBuf>,
    /// Title passed to the embedder.
    pub title: String,
    /// Statistics of the input mesh.
    pub mesh: MeshStats,
    pub stats: ConversionStats,
}
