// src/lib.rs - anker-bridge library surface
pub mod config;
pub mod jobs;
pub mod meta;
pub mod rpc;
pub mod status;
pub mod telemetry;
pub mod translator;
pub mod transport;
pub mod updates;
pub mod worker;

pub use config::{load_config, Config};
pub use jobs::{Job, JobCommand, JobQueue, JobQueueHandle, JobQueueManager, JobQueueWorker};
pub use rpc::{ChannelSink, Notification, NotificationSink};
pub use status::StatusModel;
pub use telemetry::{CommandType, TelemetryRecord};
pub use translator::EventTranslator;
pub use transport::{MqttTransport, TelemetrySource, TransportWorker};
pub use updates::UpdateWorker;
pub use worker::{Holdoff, Worker, WorkerScheduler};
