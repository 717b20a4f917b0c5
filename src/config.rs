//! Configuration types for mesh-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The two external stages are described
//! by [`ExternalTool`] values, or replaced entirely by injecting a
//! [`MeshConverter`] / [`DocumentEmbedder`] implementation.

use crate::error::Mesh2PdfError;
use crate::pipeline::embed::DocumentEmbedder;
use crate::pipeline::mesh::MeshConverter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a mesh-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use mesh2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .target_faces(20_000)
///     .work_dir("build/meshes")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum triangle count after decimation. Default: 5000.
    ///
    /// PDF viewers render U3D in software on many platforms; a few thousand
    /// faces keeps rotation smooth in Acrobat. Minimum: 4.
    pub target_faces: u32,

    /// Directory for intermediate U3D files. Default: `output`.
    ///
    /// When no output path is given, the PDF goes to `<work_dir>/pdf/<base>.pdf`.
    pub work_dir: PathBuf,

    /// Command that turns an OBJ into a U3D file.
    pub mesh_tool: ExternalTool,

    /// Command that typesets a U3D file into a PDF.
    pub embed_tool: ExternalTool,

    /// Document title. If None, uses `"<base> 3D Model"`.
    pub title: Option<String>,

    /// Timeout for the mesh stage in seconds. Default: 600.
    pub mesh_timeout_secs: u64,

    /// Timeout for the embed stage in seconds. Default: 600.
    ///
    /// LaTeX runs twice for the 3D annotation to resolve; large scenes can
    /// take minutes on a loaded host.
    pub embed_timeout_secs: u64,

    /// Delete the intermediate U3D file after a successful run. Default: false.
    pub remove_intermediate: bool,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-constructed mesh converter. Takes precedence over `mesh_tool`.
    pub mesh_converter: Option<Arc<dyn MeshConverter>>,

    /// Pre-constructed embedder. Takes precedence over `embed_tool`.
    pub embedder: Option<Arc<dyn DocumentEmbedder>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            target_faces: 5000,
            work_dir: PathBuf::from("output"),
            mesh_tool: ExternalTool::new("python3").arg("obj_to_u3d/obj_to_u3d.py"),
            embed_tool: ExternalTool::new("python3").arg("u3d_pdf/latex_3d_pdf.py"),
            title: None,
            mesh_timeout_secs: 600,
            embed_timeout_secs: 600,
            remove_intermediate: false,
            progress_callback: None,
            mesh_converter: None,
            embedder: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("target_faces", &self.target_faces)
            .field("work_dir", &self.work_dir)
            .field("mesh_tool", &self.mesh_tool)
            .field("embed_tool", &self.embed_tool)
            .field("title", &self.title)
            .field("mesh_timeout_secs", &self.mesh_timeout_secs)
            .field("embed_timeout_secs", &self.embed_timeout_secs)
            .field("remove_intermediate", &self.remove_intermediate)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field(
                "mesh_converter",
                &self.mesh_converter.as_ref().map(|_| "<dyn MeshConverter>"),
            )
            .field("embedder", &self.embedder.as_ref().map(|_| "<dyn DocumentEmbedder>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Title for a document derived from `base_name`.
    pub fn title_for(&self, base_name: &str) -> String {
        match self.title {
            Some(ref t) => t.clone(),
            None => format!("{base_name} 3D Model"),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.config.fmt(f)
    }
}

impl ConversionConfigBuilder {
    pub fn target_faces(mut self, n: u32) -> Self {
        self.config.target_faces = n.max(4);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn mesh_tool(mut self, tool: ExternalTool) -> Self {
        self.config.mesh_tool = tool;
        self
    }

    pub fn embed_tool(mut self, tool: ExternalTool) -> Self {
        self.config.embed_tool = tool;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn mesh_timeout_secs(mut self, secs: u64) -> Self {
        self.config.mesh_timeout_secs = secs.max(1);
        self
    }

    pub fn embed_timeout_secs(mut self, secs: u64) -> Self {
        self.config.embed_timeout_secs = secs.max(1);
        self
    }

    pub fn remove_intermediate(mut self, v: bool) -> Self {
        self.config.remove_intermediate = v;
        self
    }

    /// Set a progress callback to receive per-stage events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn mesh_converter(mut self, converter: Arc<dyn MeshConverter>) -> Self {
        self.config.mesh_converter = Some(converter);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn DocumentEmbedder>) -> Self {
        self.config.embedder = Some(embedder);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Mesh2PdfError> {
        let c = &self.config;
        if c.target_faces < 4 {
            return Err(Mesh2PdfError::InvalidConfig(format!(
                "target faces must be ≥ 4, got {}",
                c.target_faces
            )));
        }
        if c.mesh_converter.is_none() && c.mesh_tool.program.trim().is_empty() {
            return Err(Mesh2PdfError::InvalidConfig(
                "mesh tool program is empty".into(),
            ));
        }
        if c.embedder.is_none() && c.embed_tool.program.trim().is_empty() {
            return Err(Mesh2PdfError::InvalidConfig(
                "embed tool program is empty".into(),
            ));
        }
        if c.work_dir.as_os_str().is_empty() {
            return Err(Mesh2PdfError::InvalidConfig("work dir is empty".into()));
        }
        Ok(self.config)
    }
}

// ── External tools ───────────────────────────────────────────────────────

/// A program plus leading arguments, e.g. `python3 obj_to_u3d/obj_to_u3d.py`.
///
/// Stage-specific arguments (input, output, flags) are appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTool {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}
