//! HTTP service binary for mesh2pdf.
//!
//! Maps flags and `MESH2PDF_*` environment variables onto `ServerConfig`
//! and runs until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use mesh2pdf::server::{self, ServerConfig};
use mesh2pdf::{ConversionConfig, ExternalTool};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Serve OBJ-to-PDF conversion over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "mesh2pdf-server",
    version,
    about = "Serve OBJ-to-PDF conversion over HTTP",
    color = clap::ColorChoice::Auto
)]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "MESH2PDF_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(short, long, env = "MESH2PDF_PORT", default_value_t = 5000)]
    port: u16,

    /// Directory for uploaded meshes.
    #[arg(long, env = "MESH2PDF_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for finished PDFs.
    #[arg(long, env = "MESH2PDF_OUTPUT_DIR", default_value = "output/pdf")]
    output_dir: PathBuf,

    /// Directory for intermediate U3D files.
    #[arg(long, env = "MESH2PDF_WORK_DIR", default_value = "output")]
    work_dir: PathBuf,

    /// Extra directory created at startup for an external publisher.
    #[arg(long, env = "MESH2PDF_PUBLISH_DIR")]
    publish_dir: Option<PathBuf>,

    /// Prefix for download links (default: http://<local-ip>:<port>).
    #[arg(long, env = "MESH2PDF_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Concurrent conversions.
    #[arg(long, env = "MESH2PDF_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Jobs that may wait for a worker before uploads are refused.
    #[arg(long, env = "MESH2PDF_QUEUE_CAPACITY", default_value_t = 64)]
    queue_capacity: usize,

    /// Seconds a finished job stays queryable.
    #[arg(long, env = "MESH2PDF_JOB_TTL", default_value_t = 3600)]
    job_ttl: u64,

    /// Maximum upload size in MiB.
    #[arg(long, env = "MESH2PDF_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    /// Maximum face count after decimation.
    #[arg(long, env = "MESH2PDF_TARGET_FACES", default_value_t = 5000)]
    target_faces: u32,

    /// Command that converts OBJ to U3D, split on spaces.
    #[arg(long, env = "MESH2PDF_MESH_TOOL", default_value = "python3 obj_to_u3d/obj_to_u3d.py")]
    mesh_tool: String,

    /// Command that embeds U3D into PDF, split on spaces.
    #[arg(long, env = "MESH2PDF_EMBED_TOOL", default_value = "python3 u3d_pdf/latex_3d_pdf.py")]
    embed_tool: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mesh2pdf=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = server_config(args)?;
    tracing::info!(
        "Uploads: {}  Output: {}  Work: {}",
        config.upload_dir.display(),
        config.output_dir.display(),
        config.conversion.work_dir.display()
    );

    server::serve(config).await.context("Server failed")
}

fn server_config(args: Args) -> Result<ServerConfig> {
    let conversion = ConversionConfig::builder()
        .target_faces(args.target_faces)
        .work_dir(args.work_dir)
        .mesh_tool(parse_tool(&args.mesh_tool).context("Empty --mesh-tool")?)
        .embed_tool(parse_tool(&args.embed_tool).context("Empty --embed-tool")?)
        .build()
        .context("Invalid conversion configuration")?;

    Ok(ServerConfig {
        host: args.host,
        port: args.port,
        upload_dir: args.upload_dir,
        output_dir: args.output_dir,
        publish_dir: args.publish_dir,
        public_base_url: args.public_base_url,
        workers: args.workers,
        queue_capacity: args.queue_capacity,
        job_ttl_secs: args.job_ttl,
        max_upload_size: args.max_upload_mb.saturating_mul(1024 * 1024),
        conversion,
        ..ServerConfig::default()
    })
}

fn parse_tool(command: &str) -> Option<ExternalTool> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    Some(ExternalTool::new(program).args(parts))
}
