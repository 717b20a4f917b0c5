//! # mesh2pdf
//!
//! Convert OBJ meshes into PDF documents carrying an interactive,
//! camera-navigable 3D model.
//!
//! The heavy lifting is delegated: an external tool decimates the mesh and
//! writes a U3D scene, and a second tool typesets that scene into a PDF. This
//! crate sequences the two, keeps the paths straight, maps their progress onto
//! one 0–100 scale and reports failures with the tool's own diagnostics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! OBJ
//!  │
//!  ├─ 1. Input    validate path, extension and face count
//!  ├─ 2. Paths    output/<base>.u3d, output/pdf/<base>.pdf
//!  ├─ 3. Mesh     decimate + encode U3D        (30–70 %)
//!  ├─ 4. Embed    LaTeX/media9 → PDF            (70–100 %)
//!  └─ 5. Output   PDF path + timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mesh2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("cube.obj", None, &config).await?;
//!     println!("{}", output.pdf_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `mesh2pdf` binary (clap + anyhow + indicatif) |
//! | `server` | on      | Enables [`server`] and the `mesh2pdf-server` binary (axum) |
//!
//! Disable both when using only the library:
//! ```toml
//! mesh2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ExternalTool};
pub use convert::{convert, convert_bytes, convert_sync, inspect};
pub use error::Mesh2PdfError;
pub use output::{ConversionOutput, ConversionStats, MeshStats};
pub use pipeline::embed::{CommandEmbedder, DocumentEmbedder};
pub use pipeline::mesh::{CommandMeshConverter, MeshConverter};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressUpdate, Stage,
    StageReporter,
};
