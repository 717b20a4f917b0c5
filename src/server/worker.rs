//! Background conversion workers.
//!
//! Request handlers push a [`ConversionTask`] onto a bounded queue and return
//! (or wait on the job's status). [`ConversionWorker::run`] drains the queue,
//! running up to `workers` conversions at once. Each conversion runs in its
//! own task so a panic marks that job failed instead of killing the worker.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::progress::ProgressCallback;
use crate::server::jobs::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One conversion waiting for a worker.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub job_id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Why a task could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("conversion queue is full")]
    Full(ConversionTask),
    #[error("conversion workers have stopped")]
    Closed(ConversionTask),
}

/// Sending half of the conversion queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<ConversionTask>,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` waiting tasks.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ConversionTask>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a task without waiting for space.
    pub fn try_submit(&self, task: ConversionTask) -> Result<(), SubmitError> {
        self.sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(t) => SubmitError::Full(t),
            mpsc::error::TrySendError::Closed(t) => SubmitError::Closed(t),
        })
    }
}

/// Runs queued conversions.
pub struct ConversionWorker {
    registry: Arc<JobRegistry>,
    template: ConversionConfig,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl ConversionWorker {
    pub fn new(registry: Arc<JobRegistry>, template: ConversionConfig, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            registry,
            template,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Process tasks until every [`JobQueue`] handle is dropped.
    pub async fn run(self, mut receiver: mpsc::Receiver<ConversionTask>) {
        info!("Conversion worker started: {} parallel jobs", self.workers);

        while let Some(task) = receiver.recv().await {
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    error!("Worker semaphore closed; dropping job {}", task.job_id);
                    self.registry.fail(&task.job_id, "Conversion workers stopped");
                    break;
                }
            };

            let registry = Arc::clone(&self.registry);
            let template = self.template.clone();
            tokio::spawn(async move {
                process(registry, template, task).await;
                drop(permit);
            });
        }

        info!("Conversion worker stopped");
    }
}

async fn process(registry: Arc<JobRegistry>, template: ConversionConfig, task: ConversionTask) {
    let job_id = task.job_id;
    info!(
        "Starting conversion for job {}: {} -> {}",
        job_id,
        task.input_path.display(),
        task.output_path.display()
    );

    let mut config = template;
    config.progress_callback = Some(registry.progress_callback(job_id) as ProgressCallback);

    let input = task.input_path.clone();
    let output = task.output_path.clone();
    let handle = tokio::spawn(async move { convert(&input, Some(&output), &config).await });

    match handle.await {
        Ok(Ok(result)) => {
            info!(
                "Job {} finished in {}ms: {}",
                job_id,
                result.stats.total_duration_ms,
                result.pdf_path.display()
            );
            registry.complete(&job_id, &result.pdf_path, "Conversion completed successfully");
        }
        Ok(Err(e)) => {
            error!("Job {} failed: {}", job_id, e);
            registry.fail(&job_id, e.to_string());
        }
        Err(join_error) => {
            warn!("Job {} task aborted: {}", job_id, join_error);
            registry.fail(&job_id, format!("Conversion task aborted: {join_error}"));
        }
    }
}
