//! CLI binary for mesh2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mesh2pdf::{
    convert, inspect, ConversionConfig, ConversionProgressCallback, ExternalTool, MeshStats,
    ProgressCallback, ProgressUpdate, Stage,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one 0–100 bar, with a log line each time the
/// pipeline enters a new stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Last stage printed, so each stage is announced once.
    stage: Mutex<Option<Stage>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage: Mutex::new(None),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_progress(&self, update: &ProgressUpdate) {
        let entered = match self.stage.lock() {
            Ok(mut last) if *last != Some(update.stage) => {
                *last = Some(update.stage);
                true
            }
            _ => false,
        };
        if entered && update.stage != Stage::Complete {
            self.bar.println(format!("  {} {}", dim("›"), update.stage));
        }

        self.bar.set_prefix(update.stage.to_string());
        self.bar.set_position(u64::from(update.percent));
        self.bar.set_message(update.message.clone());

        if update.stage == Stage::Complete {
            self.bar.finish_and_clear();
        }
    }

    fn on_failure(&self, message: &str) {
        self.bar.abandon();
        // Tool diagnostics can run to pages; the full text follows via the error
        let first = message.lines().next().unwrap_or(message);
        eprintln!("{} {}", red("✘"), red(first));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes output/pdf/cube.pdf)
  mesh2pdf cube.obj

  # Explicit output path and a finer mesh
  mesh2pdf --target-faces 20000 scan.obj -o scan.pdf

  # Custom tools
  mesh2pdf --mesh-tool obj2u3d --embed-tool u3d2pdf model.obj

  # Mesh statistics only (no external tools needed)
  mesh2pdf --inspect-only model.obj

  # JSON output for scripts
  mesh2pdf --json model.obj > result.json

ENVIRONMENT VARIABLES:
  Every flag has a MESH2PDF_* counterpart, e.g. MESH2PDF_TARGET_FACES=20000.
  RUST_LOG overrides the log filter.

SETUP:
  The default tools are Python scripts run from the current directory:
    python3 obj_to_u3d/obj_to_u3d.py <in.obj> <out.u3d> --target-faces N
    python3 u3d_pdf/latex_3d_pdf.py  <in.u3d> <out.pdf> --title TITLE
  The second needs pdflatex with the media9 package.
"#;

/// Convert OBJ meshes to PDF documents with an embedded 3D model.
#[derive(Parser, Debug)]
#[command(
    name = "mesh2pdf",
    version,
    about = "Convert OBJ meshes to PDF documents with an embedded 3D model",
    long_about = "Convert a Wavefront OBJ mesh into a PDF carrying an interactive U3D model. \
The mesh is decimated and encoded by one external tool, then typeset into a PDF by a second.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// OBJ file to convert.
    input: PathBuf,

    /// Write the PDF here instead of <work-dir>/pdf/<name>.pdf.
    #[arg(short, long, env = "MESH2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum face count after decimation (minimum 4).
    #[arg(long, env = "MESH2PDF_TARGET_FACES", default_value_t = 5000)]
    target_faces: u32,

    /// Directory for intermediate U3D files.
    #[arg(long, env = "MESH2PDF_WORK_DIR", default_value = "output")]
    work_dir: PathBuf,

    /// Program that converts OBJ to U3D.
    #[arg(long, env = "MESH2PDF_MESH_TOOL")]
    mesh_tool: Option<String>,

    /// Leading argument for the mesh tool (repeatable).
    #[arg(long = "mesh-tool-arg", env = "MESH2PDF_MESH_TOOL_ARGS", value_delimiter = ' ')]
    mesh_tool_args: Vec<String>,

    /// Program that embeds U3D into PDF.
    #[arg(long, env = "MESH2PDF_EMBED_TOOL")]
    embed_tool: Option<String>,

    /// Leading argument for the embed tool (repeatable).
    #[arg(long = "embed-tool-arg", env = "MESH2PDF_EMBED_TOOL_ARGS", value_delimiter = ' ')]
    embed_tool_args: Vec<String>,

    /// Document title (default: "<name> 3D Model").
    #[arg(long, env = "MESH2PDF_TITLE")]
    title: Option<String>,

    /// Mesh stage timeout in seconds.
    #[arg(long, env = "MESH2PDF_MESH_TIMEOUT", default_value_t = 600)]
    mesh_timeout: u64,

    /// Embed stage timeout in seconds.
    #[arg(long, env = "MESH2PDF_EMBED_TIMEOUT", default_value_t = 600)]
    embed_timeout: u64,

    /// Delete the intermediate U3D file after success.
    #[arg(long, env = "MESH2PDF_REMOVE_INTERMEDIATE")]
    remove_intermediate: bool,

    /// Print mesh statistics only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of a summary line.
    #[arg(long, env = "MESH2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MESH2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MESH2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MESH2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would tear the progress bar; keep them for -v.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let stats = inspect(&cli.input).await.context("Failed to inspect mesh")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("Failed to serialise statistics")?
            );
        } else {
            print_stats(&cli.input, &stats);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, cli.output.as_deref(), &config)
        .await
        .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} faces  {}ms  →  {}",
            green("✔"),
            output.mesh.faces,
            output.stats.total_duration_ms,
            bold(&output.pdf_path.display().to_string()),
        );
        eprintln!(
            "   {}",
            dim(&format!(
                "mesh {}ms  /  embed {}ms  /  {} bytes",
                output.stats.mesh_duration_ms,
                output.stats.embed_duration_ms,
                output.stats.pdf_bytes
            )),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let defaults = ConversionConfig::default();

    let mut builder = ConversionConfig::builder()
        .target_faces(cli.target_faces)
        .work_dir(&cli.work_dir)
        .mesh_tool(tool_from_args(
            defaults.mesh_tool,
            cli.mesh_tool.as_deref(),
            &cli.mesh_tool_args,
        ))
        .embed_tool(tool_from_args(
            defaults.embed_tool,
            cli.embed_tool.as_deref(),
            &cli.embed_tool_args,
        ))
        .mesh_timeout_secs(cli.mesh_timeout)
        .embed_timeout_secs(cli.embed_timeout)
        .remove_intermediate(cli.remove_intermediate);

    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--x-tool` replaces the program and its arguments; `--x-tool-arg` alone
/// replaces only the arguments.
fn tool_from_args(default: ExternalTool, program: Option<&str>, args: &[String]) -> ExternalTool {
    let args = args.iter().filter(|a| !a.is_empty());
    match program {
        Some(p) => ExternalTool::new(p).args(args),
        None if args.clone().next().is_some() => ExternalTool::new(default.program).args(args),
        None => default,
    }
}

fn print_stats(input: &std::path::Path, stats: &MeshStats) {
    println!("File:         {}", input.display());
    println!("Size:         {} bytes", stats.file_bytes);
    println!("Vertices:     {}", stats.vertices);
    println!("Faces:        {}", stats.faces);
    println!("Normals:      {}", stats.normals);
    println!("Tex coords:   {}", stats.texcoords);
    println!("Groups:       {}", stats.groups);
}
