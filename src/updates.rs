// src/updates.rs - Status update worker: telemetry in, minimal diffs out
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::rpc::{Notification, NotificationSink};
use crate::telemetry::TelemetryRecord;
use crate::translator::{EventTranslator, PrinterState};
use crate::worker::{Holdoff, Worker, WorkerError};

// One sample per holdoff tick at 1s is 20 minutes of history.
const TEMP_HISTORY_LIMIT: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempSample {
    pub ts: f64,
    pub current: f64,
    pub target: f64,
}

/// Bounded per-heater sample ring, persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TempHistory {
    pub nozzle: VecDeque<TempSample>,
    pub hotbed: VecDeque<TempSample>,
}

impl TempHistory {
    pub fn append(&mut self, state: &PrinterState) {
        let ts = Utc::now().timestamp_millis() as f64 / 1000.0;
        for (ring, reading) in [
            (&mut self.nozzle, state.nozzle),
            (&mut self.hotbed, state.hotbed),
        ] {
            ring.push_back(TempSample {
                ts,
                current: reading.current,
                target: reading.target,
            });
            while ring.len() > TEMP_HISTORY_LIMIT {
                ring.pop_front();
            }
        }
    }

    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("corrupt temperature history at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, serde_json::to_vec(self).expect("history serializes"))
    }
}

/// Worker owning the status model for the life of the process.
///
/// Telemetry arrives over the channel; once per holdoff tick the heater
/// readings are sampled and a heartbeat goes out; after each drain the
/// model publishes whatever sections actually changed.
pub struct UpdateWorker {
    translator: EventTranslator,
    records_rx: mpsc::Receiver<TelemetryRecord>,
    sink: Arc<dyn NotificationSink>,
    holdoff: Holdoff,
    stats: TempHistory,
    stats_path: PathBuf,
    sample_interval: Duration,
}

impl UpdateWorker {
    pub fn new(
        records_rx: mpsc::Receiver<TelemetryRecord>,
        sink: Arc<dyn NotificationSink>,
        stats_path: PathBuf,
        sample_interval: Duration,
    ) -> Self {
        Self {
            translator: EventTranslator::new(),
            records_rx,
            sink,
            holdoff: Holdoff::new(),
            stats: TempHistory::default(),
            stats_path,
            sample_interval,
        }
    }

    pub fn translator(&self) -> &EventTranslator {
        &self.translator
    }

    fn dispatch(&mut self, record: TelemetryRecord) {
        if let Some(notification) = self.translator.dispatch(&record) {
            self.sink.notify(notification);
        }
    }

    fn publish_changes(&mut self) {
        let update = self.translator.model.status_update();
        if !update.is_empty() {
            tracing::debug!(sections = update.len(), "publishing status update");
            self.sink.notify(Notification::status_update(update));
        }
    }
}

#[async_trait]
impl Worker for UpdateWorker {
    fn name(&self) -> &'static str {
        "updates"
    }

    async fn init(&mut self) -> Result<(), WorkerError> {
        self.stats = TempHistory::load(&self.stats_path);
        self.holdoff.reset(self.sample_interval);
        Ok(())
    }

    async fn run(&mut self, timeout: Duration) -> Result<(), WorkerError> {
        if self.holdoff.passed() {
            self.holdoff.reset(self.sample_interval);
            self.stats.append(&self.translator.printer);
            self.sink.notify(Notification::status_heartbeat());
        }

        while let Ok(record) = self.records_rx.try_recv() {
            self.dispatch(record);
        }
        self.publish_changes();

        // Bounded idle wait; a record arriving here is folded in now and
        // published on the next pass.
        match tokio::time::timeout(timeout, self.records_rx.recv()).await {
            Ok(Some(record)) => self.dispatch(record),
            Ok(None) => tokio::time::sleep(timeout).await,
            Err(_) => {}
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WorkerError> {
        self.stats.save(&self.stats_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::HeaterReading;

    #[test]
    fn test_history_ring_is_bounded() {
        let mut history = TempHistory::default();
        let state = PrinterState {
            nozzle: HeaterReading {
                current: 25.0,
                target: 0.0,
            },
            hotbed: HeaterReading::default(),
        };
        for _ in 0..(TEMP_HISTORY_LIMIT + 10) {
            history.append(&state);
        }
        assert_eq!(history.nozzle.len(), TEMP_HISTORY_LIMIT);
        assert_eq!(history.hotbed.len(), TEMP_HISTORY_LIMIT);
    }

    #[test]
    fn test_history_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let mut history = TempHistory::default();
        history.append(&PrinterState::default());
        history.save(&path).unwrap();

        let reloaded = TempHistory::load(&path);
        assert_eq!(reloaded.nozzle.len(), 1);
    }

    #[test]
    fn test_missing_history_file_is_empty() {
        let history = TempHistory::load(Path::new("/nonexistent/stats.json"));
        assert!(history.nozzle.is_empty());
    }
}
