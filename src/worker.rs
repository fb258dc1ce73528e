// src/worker.rs - Cooperative worker lifecycle and host scheduler
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),
    #[error("Other: {0}")]
    Other(String),
}

/// Lifecycle hooks of one managed unit.
///
/// `run` must bound its own waiting by `timeout` and return control to the
/// host loop; it is the only point at which a worker may suspend.
#[async_trait]
pub trait Worker: Send {
    fn name(&self) -> &'static str;

    async fn init(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn start(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn run(&mut self, timeout: Duration) -> Result<(), WorkerError>;

    async fn stop(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// "At most once per interval" gate.
///
/// `reset` arms a deadline; `passed` reports it elapsed. The caller acts
/// when `passed` turns true and rearms for the next window.
#[derive(Debug, Default)]
pub struct Holdoff {
    deadline: Option<Instant>,
}

impl Holdoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn passed(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

/// Spawns each worker as its own task and drives it at a bounded cadence.
///
/// Shutdown is cooperative and ordered: the broadcast flips, every loop
/// finishes its current `run` call, `stop` flushes, and `join_all` waits
/// for all of it before the host releases resources.
pub struct WorkerScheduler {
    run_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerScheduler {
    pub fn new(run_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            run_timeout,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn spawn(&mut self, mut worker: Box<dyn Worker>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let run_timeout = self.run_timeout;

        let handle = tokio::spawn(async move {
            let name = worker.name();
            if let Err(e) = worker.init().await {
                tracing::error!("{name}: init failed: {e}");
                return;
            }
            if let Err(e) = worker.start().await {
                tracing::error!("{name}: start failed: {e}");
                return;
            }
            tracing::info!("{name}: running");

            loop {
                // Checked between run calls only; a worker is never
                // cancelled in the middle of an operation.
                match shutdown_rx.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => break,
                }
                if let Err(e) = worker.run(run_timeout).await {
                    // External faults are transient; the next iteration
                    // retries. Invariant violations panic instead.
                    tracing::error!("{name}: run failed: {e}");
                    tokio::time::sleep(run_timeout).await;
                }
            }

            if let Err(e) = worker.stop().await {
                tracing::error!("{name}: stop failed: {e}");
            }
            tracing::info!("{name}: stopped");
        });

        self.handles.push(handle);
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn join_all(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("worker task panicked: {e}");
            }
        }
    }
}
