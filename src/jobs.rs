// src/jobs.rs - Persisted job queue and execution history
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::meta::{FileMetadata, GcodeMetaAuto};
use crate::rpc::{Notification, NotificationSink};
use crate::worker::{Worker, WorkerError};

const QUEUE_STATE_READY: &str = "ready";

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("queue handle closed")]
    HandleClosed,
}

fn default_status() -> String {
    "queued".to_string()
}

/// One queued or completed print submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub filename: String,
    pub job_id: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time_added: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub metadata: FileMetadata,
}

/// Pending jobs plus execution history, persisted as one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQueue {
    pub jobs: Vec<Job>,
    pub history: Vec<Job>,
    // High-water mark for the current run; reseeded from the persisted
    // lists on load so ids survive restarts without reuse.
    #[serde(skip)]
    last_id: u64,
}

impl JobQueue {
    /// Strictly increasing id, unique for the lifetime of the queue.
    pub fn next_job_id(&mut self) -> u64 {
        let persisted_max = self
            .jobs
            .iter()
            .chain(&self.history)
            .map(|job| job.job_id)
            .max()
            .unwrap_or(0);
        self.last_id = self.last_id.max(persisted_max) + 1;
        self.last_id
    }

    /// Missing or unreadable storage degrades to an empty queue; a broken
    /// file must never keep the bridge from starting.
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(queue) => queue,
                Err(e) => {
                    tracing::warn!("corrupt job queue at {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("unreadable job queue at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Atomic write: temp file in the target directory, then rename.
    pub fn save(&self, path: &Path) -> Result<(), JobQueueError> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        tmp.write_all(&serde_json::to_vec_pretty(self).expect("queue serializes"))?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Owns the queue; all mutation funnels through here.
pub struct JobQueueManager {
    queue: JobQueue,
    loader: GcodeMetaAuto,
    gcode_dir: PathBuf,
    sink: Arc<dyn NotificationSink>,
}

impl JobQueueManager {
    pub fn new(loader: GcodeMetaAuto, gcode_dir: PathBuf, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            queue: JobQueue::default(),
            loader,
            gcode_dir,
            sink,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn set_queue(&mut self, queue: JobQueue) {
        self.queue = queue;
    }

    fn queued_jobs(&self) -> Vec<Value> {
        self.queue
            .jobs
            .iter()
            .map(|job| serde_json::to_value(job).expect("job serializes"))
            .collect()
    }

    fn load_metadata(&self, filename: &str) -> Result<FileMetadata, JobQueueError> {
        let path = self.gcode_dir.join(filename);
        let stat = fs::metadata(&path)?;
        let mut file = fs::File::open(&path)?;

        let mut md = self.loader.load(&mut file)?.unwrap_or_default();
        md.size = stat.len();
        md.modified = stat
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        md.filename = path.to_string_lossy().into_owned();

        // Re-queueing a file already seen in history keeps its content
        // identifier instead of minting a new one.
        if md.uuid.is_none() {
            md.uuid = self
                .queue
                .history
                .iter()
                .find(|job| job.filename == filename)
                .and_then(|job| job.metadata.uuid.clone());
        }
        Ok(md)
    }

    /// Append a new pending job enriched with file metadata.
    pub fn enqueue(&mut self, filename: &str) -> Result<(), JobQueueError> {
        let mut md = self.load_metadata(filename)?;
        if md.uuid.is_none() {
            md.uuid = Some(uuid::Uuid::new_v4().to_string());
        }

        let job = Job {
            filename: filename.to_string(),
            job_id: self.queue.next_job_id(),
            time_added: Utc::now(),
            start_time: None,
            end_time: None,
            status: default_status(),
            metadata: md,
        };
        tracing::info!("queued job {} [{}]", job.job_id, job.filename);
        self.queue.jobs.push(job);

        self.sink.notify(Notification::job_queue_changed(
            "jobs_added",
            self.queued_jobs(),
            QUEUE_STATE_READY,
        ));
        Ok(())
    }

    pub fn remove(&mut self, job_ids: &[u64]) {
        self.queue.jobs.retain(|job| !job_ids.contains(&job.job_id));
        self.sink.notify(Notification::job_queue_changed(
            "jobs_removed",
            self.queued_jobs(),
            QUEUE_STATE_READY,
        ));
    }

    /// Record the pending head as started: a deep copy moves into history
    /// under a fresh id, while the pending entry stays untouched.
    ///
    /// Calling this with an empty pending list is a caller bug.
    pub fn start_next(&mut self) {
        let mut job = self
            .queue
            .jobs
            .first()
            .expect("start_next with empty pending queue")
            .clone();
        job.job_id = self.queue.next_job_id();
        job.start_time = Some(Utc::now());

        let serialized = serde_json::to_value(&job).expect("job serializes");
        self.queue.history.push(job);
        self.sink
            .notify(Notification::history_changed("added", serialized));
    }

    /// Close out the newest history entry as failed.
    pub fn mark_error(&mut self) {
        let job = self
            .queue
            .history
            .last_mut()
            .expect("mark_error with empty history");
        job.end_time = Some(Utc::now());
        job.status = "error".to_string();

        let serialized = serde_json::to_value(&*job).expect("job serializes");
        self.sink
            .notify(Notification::history_changed("finished", serialized));
    }

    pub fn mark_status(&mut self, status: &str) {
        let job = self
            .queue
            .history
            .last_mut()
            .expect("mark_status with empty history");
        job.status = status.to_string();
    }

    pub fn remove_history(&mut self, job_id: u64) {
        self.queue.history.retain(|job| job.job_id != job_id);
    }
}

/// Queue mutations accepted over the worker's channel.
#[derive(Debug)]
pub enum JobCommand {
    Enqueue { filename: String },
    Remove { job_ids: Vec<u64> },
    StartNext,
    MarkError,
    MarkStatus { status: String },
    RemoveHistory { job_id: u64 },
}

/// Cloneable capability handle for submitting queue commands.
#[derive(Debug, Clone)]
pub struct JobQueueHandle {
    tx: mpsc::Sender<JobCommand>,
}

impl JobQueueHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<JobCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, command: JobCommand) -> Result<(), JobQueueError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| JobQueueError::HandleClosed)
    }
}

/// Worker owning the persisted queue for the life of the process.
pub struct JobQueueWorker {
    manager: JobQueueManager,
    queue_path: PathBuf,
    commands_rx: mpsc::Receiver<JobCommand>,
}

impl JobQueueWorker {
    pub fn new(
        manager: JobQueueManager,
        queue_path: PathBuf,
        commands_rx: mpsc::Receiver<JobCommand>,
    ) -> Self {
        Self {
            manager,
            queue_path,
            commands_rx,
        }
    }

    fn apply(&mut self, command: JobCommand) {
        match command {
            JobCommand::Enqueue { filename } => {
                // Unreadable input files are external faults: log and move on.
                if let Err(e) = self.manager.enqueue(&filename) {
                    tracing::warn!("enqueue of {filename} failed: {e}");
                }
            }
            JobCommand::Remove { job_ids } => self.manager.remove(&job_ids),
            JobCommand::StartNext => self.manager.start_next(),
            JobCommand::MarkError => self.manager.mark_error(),
            JobCommand::MarkStatus { status } => self.manager.mark_status(&status),
            JobCommand::RemoveHistory { job_id } => self.manager.remove_history(job_id),
        }
    }
}

#[async_trait]
impl Worker for JobQueueWorker {
    fn name(&self) -> &'static str {
        "job-queue"
    }

    async fn init(&mut self) -> Result<(), WorkerError> {
        self.manager.set_queue(JobQueue::load(&self.queue_path));
        let queue = self.manager.queue();
        tracing::info!(
            "job queue loaded: {} pending, {} history",
            queue.jobs.len(),
            queue.history.len()
        );
        Ok(())
    }

    async fn run(&mut self, timeout: Duration) -> Result<(), WorkerError> {
        match tokio::time::timeout(timeout, self.commands_rx.recv()).await {
            Ok(Some(command)) => self.apply(command),
            Ok(None) => tokio::time::sleep(timeout).await,
            Err(_) => {}
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        self.manager
            .queue()
            .save(&self.queue_path)
            .map_err(|e| WorkerError::Other(e.to_string()))
    }
}
