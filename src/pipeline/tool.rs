//! Subprocess plumbing shared by the command-backed stages.
//!
//! Both external tools are driven the same way: spawn with piped output,
//! stream stdout line by line (so progress lines surface while the tool is
//! still running), collect stderr, and enforce a wall-clock timeout. The child
//! is spawned with `kill_on_drop`, so abandoning the future on timeout also
//! kills the process.

use crate::config::ExternalTool;
use crate::error::Mesh2PdfError;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Diagnostics longer than this are cut to their tail; LaTeX and Python put
/// the actual error at the end.
pub const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// What a finished tool produced.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `tool` with `extra` appended to its arguments.
///
/// `on_line` sees every stdout line as it arrives. `flag` names the CLI
/// option that configures this tool and is only used in error hints.
pub async fn run_tool<F>(
    tool: &ExternalTool,
    extra: &[OsString],
    timeout_secs: u64,
    flag: &'static str,
    mut on_line: F,
) -> Result<ToolOutput, Mesh2PdfError>
where
    F: FnMut(&str) + Send,
{
    let mut cmd = Command::new(&tool.program);
    cmd.args(&tool.args)
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!("Running command: {}", command_line(tool, extra));

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Mesh2PdfError::ToolNotFound {
                program: tool.program.clone(),
                flag,
            }
        } else {
            Mesh2PdfError::ToolSpawnFailed {
                program: tool.program.clone(),
                source: e,
            }
        }
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Mesh2PdfError::Internal("child stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Mesh2PdfError::Internal("child stderr was not captured".into()))?;

    let run = async {
        let read_stdout = async {
            let mut segments = BufReader::new(stdout).split(b'\n');
            let mut all = String::new();
            while let Some(raw) = segments.next_segment().await? {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                debug!("[{}] {}", tool.program, line);
                on_line(line);
                all.push_str(line);
                all.push('\n');
            }
            Ok::<_, std::io::Error>(all)
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            BufReader::new(stderr).read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        };
        let (out, err) = tokio::try_join!(read_stdout, read_stderr)?;
        let status = child.wait().await?;
        Ok::<_, std::io::Error>(ToolOutput {
            status,
            stdout: out,
            stderr: err,
        })
    };

    match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
        Ok(Ok(output)) => {
            debug!("{} exited with {}", tool.program, output.status);
            Ok(output)
        }
        Ok(Err(e)) => Err(Mesh2PdfError::Internal(format!(
            "I/O error while running '{}': {e}",
            tool.program
        ))),
        Err(_) => Err(Mesh2PdfError::ToolTimeout {
            program: tool.program.clone(),
            secs: timeout_secs,
        }),
    }
}

/// Human-readable command line for logs.
pub fn command_line(tool: &ExternalTool, extra: &[OsString]) -> String {
    let mut line = tool.to_string();
    for a in extra {
        line.push(' ');
        line.push_str(&a.to_string_lossy());
    }
    line
}

/// Keep the last `max` characters of a diagnostic, trimmed.
pub fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(count - max).collect();
    format!("…{skipped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_end() {
        assert_eq!(tail("  short \n", 10), "short");
        assert_eq!(tail("abcdefghij", 4), "…ghij");
    }

    #[test]
    fn command_line_joins_args() {
        let tool = ExternalTool::new("python3").arg("latex_3d_pdf.py");
        let extra = vec![OsString::from("in.u3d"), OsString::from("out.pdf")];
        assert_eq!(
            command_line(&tool, &extra),
            "python3 latex_3d_pdf.py in.u3d out.pdf"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_stdout_lines_and_collects_stderr() {
        let tool = ExternalTool::new("sh")
            .arg("-c")
            .arg("echo one; echo two; echo oops >&2; exit 3");
        let mut lines = Vec::new();
        let out = run_tool(&tool, &[], 10, "tool", |l| lines.push(l.to_string()))
            .await
            .unwrap();
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_tool_not_found() {
        let tool = ExternalTool::new("definitely-not-a-real-program-7f3a");
        let err = run_tool(&tool, &[], 5, "mesh-tool", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Mesh2PdfError::ToolNotFound { .. }), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let tool = ExternalTool::new("sh").arg("-c").arg("sleep 5");
        let err = run_tool(&tool, &[], 1, "embed-tool", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Mesh2PdfError::ToolTimeout { secs: 1, .. }), "{err}");
    }
}
