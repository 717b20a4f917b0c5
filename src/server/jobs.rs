//! In-process job registry.
//!
//! Each job owns a `tokio::sync::watch` channel holding its latest
//! [`JobStatus`]. The worker running the job is the only writer; progress
//! streams and waiting request handlers subscribe to it. Status updates are
//! monotonic, and a terminal status (100 or -1) absorbs every later update.
//!
//! Finished jobs are recorded in an explicit job-id → output-path table and
//! evicted after a TTL by [`spawn_sweeper`].

use crate::progress::{ConversionProgressCallback, ProgressUpdate, Stage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Progress value marking a failed job.
pub const FAILED: i32 = -1;

/// Progress value marking a finished job.
pub const COMPLETE: i32 = 100;

/// What the progress stream sends: `{progress, message, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// 0–100, or [`FAILED`].
    pub progress: i32,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl JobStatus {
    pub fn new(progress: i32, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: message.into(),
            timestamp: unix_now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.progress >= COMPLETE || self.progress == FAILED
    }

    pub fn succeeded(&self) -> bool {
        self.progress >= COMPLETE
    }
}

/// One accepted upload.
#[derive(Debug)]
pub struct JobEntry {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub created_at: DateTime<Utc>,
    status: watch::Sender<JobStatus>,
}

impl JobEntry {
    /// Latest status.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Apply an update if it moves the job forward.
    ///
    /// Ignored when the job is already terminal or when `progress` is lower
    /// than the current value. [`FAILED`] is accepted from any
    /// non-terminal state. Returns whether the status changed.
    pub fn update(&self, progress: i32, message: impl Into<String>) -> bool {
        let message = message.into();
        let changed = self.status.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            if progress != FAILED && progress < current.progress {
                return false;
            }
            *current = JobStatus::new(progress.min(COMPLETE), message.clone());
            true
        });
        if changed {
            info!("Job {}: {}% - {}", self.id, progress, message);
        }
        changed
    }
}

/// All jobs known to this process.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, Arc<JobEntry>>,
    outputs: DashMap<Uuid, PathBuf>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job at 0 %. Returns None if `id` is already taken.
    pub fn register(
        &self,
        id: Uuid,
        input_path: PathBuf,
        output_path: PathBuf,
    ) -> Option<Arc<JobEntry>> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (status, _) = watch::channel(JobStatus::new(0, "Job created"));
                let entry = Arc::new(JobEntry {
                    id,
                    input_path,
                    output_path,
                    created_at: Utc::now(),
                    status,
                });
                slot.insert(Arc::clone(&entry));
                debug!("Registered job {}", id);
                Some(entry)
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<JobEntry>> {
        self.jobs.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn status(&self, id: &Uuid) -> Option<JobStatus> {
        self.jobs.get(id).map(|e| e.status())
    }

    pub fn subscribe(&self, id: &Uuid) -> Option<watch::Receiver<JobStatus>> {
        self.jobs.get(id).map(|e| e.subscribe())
    }

    /// Record progress for a job. Unknown ids are ignored.
    pub fn update(&self, id: &Uuid, progress: i32, message: impl Into<String>) -> bool {
        match self.get(id) {
            Some(entry) => entry.update(progress, message),
            None => false,
        }
    }

    /// Record the output path, then publish 100 %.
    ///
    /// The table is written first so a client that sees 100 can always
    /// download.
    pub fn complete(&self, id: &Uuid, output: &Path, message: impl Into<String>) -> bool {
        let Some(entry) = self.get(id) else {
            return false;
        };
        if entry.status().is_terminal() {
            return false;
        }
        self.outputs.insert(*id, output.to_path_buf());
        entry.update(COMPLETE, message)
    }

    pub fn fail(&self, id: &Uuid, message: impl Into<String>) -> bool {
        self.update(id, FAILED, message)
    }

    /// Output path of a finished job.
    pub fn output_path(&self, id: &Uuid) -> Option<PathBuf> {
        self.outputs.get(id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs that have not reached a terminal state.
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|e| !e.value().status().is_terminal())
            .count()
    }

    /// Callback that records conversion progress into this registry.
    pub fn progress_callback(self: &Arc<Self>, id: Uuid) -> Arc<JobProgress> {
        Arc::new(JobProgress {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Drop terminal jobs whose last update is older than `ttl`.
    /// Running jobs are never evicted. Returns the number removed.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let cutoff = unix_now() - ttl.as_secs_f64();
        let before = self.jobs.len();
        self.jobs.retain(|id, entry| {
            let status = entry.status();
            let keep = !(status.is_terminal() && status.timestamp <= cutoff);
            if !keep {
                self.outputs.remove(id);
            }
            keep
        });
        before.saturating_sub(self.jobs.len())
    }
}

/// Progress sink bound to one job.
///
/// [`Stage::Complete`] is not forwarded: the worker publishes 100 % through
/// [`JobRegistry::complete`] once the output path is recorded.
pub struct JobProgress {
    registry: Arc<JobRegistry>,
    id: Uuid,
}

impl ConversionProgressCallback for JobProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        if update.stage == Stage::Complete {
            return;
        }
        self.registry
            .update(&self.id, i32::from(update.percent), update.message.clone());
    }

    fn on_failure(&self, message: &str) {
        self.registry.fail(&self.id, message);
    }
}

/// Periodically evict expired jobs.
pub fn spawn_sweeper(registry: Arc<JobRegistry>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let evicted = registry.evict_expired(ttl);
            if evicted > 0 {
                info!("Evicted {} expired jobs ({} remain)", evicted, registry.len());
            }
        }
    })
}

fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_job() -> (Arc<JobRegistry>, Uuid) {
        let registry = Arc::new(JobRegistry::new());
        let id = Uuid::new_v4();
        registry
            .register(id, "uploads/a.obj".into(), "output/pdf/a.pdf".into())
            .unwrap();
        (registry, id)
    }

    #[test]
    fn duplicate_ids_rejected() {
        let (registry, id) = registry_with_job();
        assert!(registry.register(id, "x".into(), "y".into()).is_none());
    }

    #[test]
    fn progress_is_monotonic() {
        let (registry, id) = registry_with_job();
        assert!(registry.update(&id, 40, "decimate"));
        assert!(!registry.update(&id, 30, "late load"));
        assert_eq!(registry.status(&id).unwrap().progress, 40);
    }

    #[test]
    fn terminal_states_absorb_updates() {
        let (registry, id) = registry_with_job();
        assert!(registry.fail(&id, "LaTeX Error"));
        assert!(!registry.update(&id, 80, "embed"));
        assert!(!registry.complete(&id, Path::new("out.pdf"), "done"));
        let status = registry.status(&id).unwrap();
        assert_eq!(status.progress, FAILED);
        assert_eq!(status.message, "LaTeX Error");
        assert!(registry.output_path(&id).is_none());
    }

    #[test]
    fn complete_records_output_path() {
        let (registry, id) = registry_with_job();
        assert!(registry.complete(&id, Path::new("output/pdf/a.pdf"), "ok"));
        assert_eq!(
            registry.output_path(&id),
            Some(PathBuf::from("output/pdf/a.pdf"))
        );
        assert!(registry.status(&id).unwrap().succeeded());
    }

    #[test]
    fn callback_skips_complete_stage() {
        let (registry, id) = registry_with_job();
        let cb = registry.progress_callback(id);
        cb.on_progress(&ProgressUpdate {
            stage: Stage::Encode,
            stage_percent: 50,
            percent: 65,
            message: "encode".into(),
        });
        cb.on_progress(&ProgressUpdate {
            stage: Stage::Complete,
            stage_percent: 100,
            percent: 100,
            message: "done".into(),
        });
        assert_eq!(registry.status(&id).unwrap().progress, 65);
        cb.on_failure("boom");
        assert_eq!(registry.status(&id).unwrap().progress, FAILED);
    }

    #[test]
    fn eviction_spares_running_jobs() {
        let (registry, running) = registry_with_job();
        let done = Uuid::new_v4();
        registry.register(done, "b.obj".into(), "b.pdf".into()).unwrap();
        registry.complete(&done, Path::new("b.pdf"), "ok");

        assert_eq!(registry.evict_expired(Duration::ZERO), 1);
        assert!(registry.get(&running).is_some());
        assert!(registry.get(&done).is_none());
        assert!(registry.output_path(&done).is_none());
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_latest_status() {
        let (registry, id) = registry_with_job();
        let mut rx = registry.subscribe(&id).unwrap();
        registry.update(&id, 50, "normals");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().progress, 50);
    }
}
