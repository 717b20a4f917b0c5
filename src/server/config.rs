//! Server configuration.
//!
//! Every path and network setting is resolved once at startup. The binary
//! fills [`ServerConfig`] from CLI flags and `MESH2PDF_*` environment
//! variables; tests build it directly.

use crate::config::ConversionConfig;
use crate::error::Mesh2PdfError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use tracing::warn;

/// HTTP service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// Port to bind. Default: 5000.
    pub port: u16,

    /// Where uploads are stored. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Where finished PDFs are written and looked up. Default: `output/pdf`.
    pub output_dir: PathBuf,

    /// Extra directory created at startup for an external publisher.
    /// The service itself never writes to it.
    pub publish_dir: Option<PathBuf>,

    /// Prefix for download links, e.g. `https://3d.example.com`.
    /// If None, uses `http://<local-ip>:<port>`.
    pub public_base_url: Option<String>,

    /// Concurrent conversions. Default: 2.
    ///
    /// Each conversion runs pdflatex, which is single-threaded but
    /// memory-hungry on large scenes.
    pub workers: usize,

    /// Jobs that may wait for a worker before submissions get 503. Default: 64.
    pub queue_capacity: usize,

    /// Seconds a finished job stays queryable. Default: 3600.
    pub job_ttl_secs: u64,

    /// Seconds between eviction sweeps. Default: 60.
    pub sweep_interval_secs: u64,

    /// Maximum upload body in bytes. Default: 100 MiB.
    pub max_upload_size: usize,

    /// Template for every conversion. The progress callback is set per job.
    pub conversion: ConversionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output/pdf"),
            publish_dir: None,
            public_base_url: None,
            workers: 2,
            queue_capacity: 64,
            job_ttl_secs: 3600,
            sweep_interval_secs: 60,
            max_upload_size: 100 * 1024 * 1024,
            conversion: ConversionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, Mesh2PdfError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Mesh2PdfError::InvalidConfig(format!("Invalid address: {}", e)))
    }

    /// Base URL for download links, without a trailing slash.
    pub fn base_url(&self, server_ip: IpAddr) -> String {
        match self.public_base_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", server_ip, self.port),
        }
    }

    /// Check limits that would make the service unusable.
    pub fn validate(&self) -> Result<(), Mesh2PdfError> {
        if self.workers == 0 {
            return Err(Mesh2PdfError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Mesh2PdfError::InvalidConfig(
                "queue capacity must be ≥ 1".into(),
            ));
        }
        if self.max_upload_size == 0 {
            return Err(Mesh2PdfError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Create the upload, output, work and publish directories.
    pub async fn ensure_dirs(&self) -> Result<(), Mesh2PdfError> {
        let dirs = [
            Some(&self.upload_dir),
            Some(&self.output_dir),
            Some(&self.conversion.work_dir),
            self.publish_dir.as_ref(),
        ];
        for dir in dirs.into_iter().flatten() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Mesh2PdfError::OutputWriteFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

/// Address of the interface that routes to the public internet.
///
/// Connecting a UDP socket sends no packets; it only asks the kernel to pick
/// a route. Falls back to `0.0.0.0` on hosts without one.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(ip) => ip,
        Err(e) => {
            warn!("Could not determine local IP: {}", e);
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    }
}
