//! Stage 2: U3D → PDF.
//!
//! The document is typeset by an external program (typically a Python script
//! driving pdflatex with the `media9` package). A non-zero exit code is a
//! failure even if a PDF was partially written. The captured stdout/stderr
//! travel inside [`Mesh2PdfError::EmbedFailed`] so the HTTP layer can show the
//! LaTeX diagnostic to the user.

use crate::config::ExternalTool;
use crate::error::Mesh2PdfError;
use crate::pipeline::mesh::parse_progress_line;
use crate::pipeline::tool::{self, MAX_DIAGNOSTIC_CHARS};
use crate::progress::{Stage, StageReporter};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::error;

/// Produces a PDF with an embedded, navigable 3D scene.
#[async_trait]
pub trait DocumentEmbedder: Send + Sync {
    /// Typeset `interchange` into a PDF at `output` titled `title`.
    async fn embed(
        &self,
        interchange: &Path,
        output: &Path,
        title: &str,
        progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError>;
}

/// Runs `<program> <args…> <input.u3d> <output.pdf> --title <title>`.
#[derive(Debug, Clone)]
pub struct CommandEmbedder {
    tool: ExternalTool,
    timeout_secs: u64,
}

impl CommandEmbedder {
    pub fn new(tool: ExternalTool, timeout_secs: u64) -> Self {
        Self { tool, timeout_secs }
    }
}

#[async_trait]
impl DocumentEmbedder for CommandEmbedder {
    async fn embed(
        &self,
        interchange: &Path,
        output: &Path,
        title: &str,
        progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError> {
        let extra = vec![
            OsString::from(interchange),
            OsString::from(output),
            OsString::from("--title"),
            OsString::from(title),
        ];

        // Any PROGRESS line from the embedder counts towards the embed stage.
        let out = tool::run_tool(&self.tool, &extra, self.timeout_secs, "embed-tool", |line| {
            if let Some((_, pct, msg)) = parse_progress_line(line) {
                progress.report(Stage::Embed, pct, msg);
            }
        })
        .await?;

        if !out.success() {
            error!(
                "PDF creation failed with exit code {:?}",
                out.status.code()
            );
            error!("Error output: {}", out.stderr.trim());
            error!("Command output: {}", out.stdout.trim());
            return Err(Mesh2PdfError::EmbedFailed {
                code: out.status.code(),
                stdout: tool::tail(&out.stdout, MAX_DIAGNOSTIC_CHARS),
                stderr: tool::tail(&out.stderr, MAX_DIAGNOSTIC_CHARS),
            });
        }
        Ok(())
    }
}
