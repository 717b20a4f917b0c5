//! Stage 1: OBJ → U3D.
//!
//! Decimation and U3D encoding are done by an external tool. The
//! [`MeshConverter`] trait is the seam; [`CommandMeshConverter`] is the
//! default implementation that shells out to a configured program.
//!
//! ## Progress protocol
//!
//! The tool may print lines of the form
//!
//! ```text
//! PROGRESS <stage> <percent> <message…>
//! ```
//!
//! on stdout, where `<stage>` is `load`, `decimate` (or `decimation`),
//! `normals` or `encode`. Each line is forwarded through the
//! [`StageReporter`]. Everything else is logged at debug level.

use crate::config::ExternalTool;
use crate::error::Mesh2PdfError;
use crate::pipeline::tool::{self, MAX_DIAGNOSTIC_CHARS};
use crate::progress::{Stage, StageReporter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use tracing::{error, warn};

/// Converts an OBJ mesh into a simplified U3D scene.
#[async_trait]
pub trait MeshConverter: Send + Sync {
    /// Write a U3D file to `output` holding at most `target_faces` triangles.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_faces: u32,
        progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError>;
}

/// Runs `<program> <args…> <input.obj> <output.u3d> --target-faces <N>`.
#[derive(Debug, Clone)]
pub struct CommandMeshConverter {
    tool: ExternalTool,
    timeout_secs: u64,
}

impl CommandMeshConverter {
    pub fn new(tool: ExternalTool, timeout_secs: u64) -> Self {
        Self { tool, timeout_secs }
    }
}

#[async_trait]
impl MeshConverter for CommandMeshConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_faces: u32,
        progress: &StageReporter,
    ) -> Result<(), Mesh2PdfError> {
        let extra = vec![
            OsString::from(input),
            OsString::from(output),
            OsString::from("--target-faces"),
            OsString::from(target_faces.to_string()),
        ];

        let out = tool::run_tool(&self.tool, &extra, self.timeout_secs, "mesh-tool", |line| {
            if let Some((stage, pct, msg)) = parse_progress_line(line) {
                progress.report(stage, pct, msg);
            }
        })
        .await?;

        if !out.success() {
            error!("U3D conversion failed with exit status {}", out.status);
            error!("Error output: {}", out.stderr.trim());
            return Err(Mesh2PdfError::MeshConversionFailed {
                input: input.to_path_buf(),
                code: out.status.code(),
                stderr: tool::tail(&out.stderr, MAX_DIAGNOSTIC_CHARS),
            });
        }
        if !out.stderr.trim().is_empty() {
            warn!("mesh tool wrote to stderr: {}", out.stderr.trim());
        }
        Ok(())
    }
}

static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*PROGRESS\s+([A-Za-z_]+)\s+(\d{1,3})(?:\s+(.*))?$").unwrap());

/// Parse a `PROGRESS <stage> <percent> <message>` line.
///
/// Unknown stage names and non-progress lines yield `None`. Percentages above
/// 100 are clamped.
pub fn parse_progress_line(line: &str) -> Option<(Stage, u8, String)> {
    let caps = PROGRESS_LINE.captures(line)?;
    let stage = Stage::from_tool_name(&caps[1])?;
    let pct: u16 = caps[2].parse().ok()?;
    let message = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| stage.to_string());
    Some((stage, pct.min(100) as u8, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_lines() {
        assert_eq!(
            parse_progress_line("PROGRESS decimation 40 Reducing to 5000 faces"),
            Some((Stage::Decimate, 40, "Reducing to 5000 faces".to_string()))
        );
        assert_eq!(
            parse_progress_line("  PROGRESS load 100"),
            Some((Stage::Load, 100, "load".to_string()))
        );
        assert_eq!(
            parse_progress_line("PROGRESS encode 250 writing"),
            Some((Stage::Encode, 100, "writing".to_string()))
        );
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(parse_progress_line("Loaded 1234 vertices"), None);
        assert_eq!(parse_progress_line("PROGRESS teleport 10 x"), None);
        assert_eq!(parse_progress_line("PROGRESS load abc"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_converter_forwards_progress_and_fails_on_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ExternalTool::new("sh").arg("-c").arg(
            "echo 'PROGRESS load 100 loaded'; echo 'PROGRESS decimate 50 half'; \
             echo 'pymeshlab exploded' >&2; exit 1",
        );
        let converter = CommandMeshConverter::new(tool, 10);
        let reporter = StageReporter::silent();

        let err = converter
            .convert(
                &dir.path().join("a.obj"),
                &dir.path().join("a.u3d"),
                5000,
                &reporter,
            )
            .await
            .unwrap_err();

        assert_eq!(reporter.percent(), 45);
        match err {
            Mesh2PdfError::MeshConversionFailed { code, stderr, .. } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("pymeshlab exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
