//! Application state for the conversion server

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Mesh2PdfError;
use crate::server::config::{local_ip, ServerConfig};
use crate::server::jobs::{spawn_sweeper, JobRegistry};
use crate::server::worker::{ConversionWorker, JobQueue};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: ServerConfig,
    /// Every job since startup, minus evicted ones
    registry: Arc<JobRegistry>,
    /// Sending half of the worker queue
    queue: JobQueue,
    /// Address reported by /health
    server_ip: IpAddr,
    /// Prefix for download links
    base_url: String,
}

impl AppState {
    /// Create state, directories, the worker pool and the eviction sweeper.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn new(config: ServerConfig) -> Result<Self, Mesh2PdfError> {
        config.validate()?;
        config.ensure_dirs().await?;

        let server_ip = local_ip();
        let base_url = config.base_url(server_ip);
        let registry = Arc::new(JobRegistry::new());

        let (queue, receiver) = JobQueue::new(config.queue_capacity);
        let worker = ConversionWorker::new(
            Arc::clone(&registry),
            config.conversion.clone(),
            config.workers,
        );
        tokio::spawn(worker.run(receiver));

        spawn_sweeper(
            Arc::clone(&registry),
            Duration::from_secs(config.job_ttl_secs),
            Duration::from_secs(config.sweep_interval_secs.max(1)),
        );

        tracing::info!(
            "Server state ready: uploads in {}, documents in {}, links under {}",
            config.upload_dir.display(),
            config.output_dir.display(),
            base_url
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                queue,
                server_ip,
                base_url,
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    pub fn queue(&self) -> &JobQueue {
        &self.inner.queue
    }

    pub fn server_ip(&self) -> IpAddr {
        self.inner.server_ip
    }

    /// `<base>/download/<job_id>`
    pub fn download_url(&self, job_id: &uuid::Uuid) -> String {
        format!("{}/download/{}", self.inner.base_url, job_id)
    }

    /// `<base>/progress/<job_id>`
    pub fn progress_url(&self, job_id: &uuid::Uuid) -> String {
        format!("{}/progress/{}", self.inner.base_url, job_id)
    }
}
