// src/main.rs - Bridge bootstrap and wiring
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use anker_bridge::jobs::{JobQueueHandle, JobQueueManager, JobQueueWorker};
use anker_bridge::meta::GcodeMetaAuto;
use anker_bridge::rpc::{ChannelSink, NotificationSink};
use anker_bridge::transport::{MqttTransport, TransportWorker};
use anker_bridge::updates::UpdateWorker;
use anker_bridge::worker::WorkerScheduler;
use anker_bridge::{config, Notification};

#[derive(Parser, Debug)]
#[command(name = "anker-bridge", about = "MQTT-to-Moonraker printer bridge")]
struct Cli {
    /// Path to the bridge configuration file
    #[arg(default_value = "bridge.toml")]
    config: String,

    /// Skip TLS regardless of configuration
    #[arg(long)]
    insecure: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting anker-bridge");
    tracing::info!("Loading configuration from: {}", cli.config);

    let mut config = config::load_config(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    if cli.insecure {
        config.mqtt.insecure = true;
    }

    tracing::info!("Device endpoint: {}:{}", config.mqtt.host, config.mqtt.port);

    // Units are built in dependency order and handed narrow capability
    // handles; nothing reaches into a sibling.
    let (sink, mut notifications_rx) = ChannelSink::new();
    let sink: Arc<dyn NotificationSink> = Arc::new(sink);

    let transport = MqttTransport::connect(&config.mqtt).await.map_err(|e| {
        tracing::error!("Failed to connect: {e}");
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let (records_tx, records_rx) = mpsc::channel(256);
    let (_job_handle, job_commands_rx) = JobQueueHandle::channel(16);

    let mut scheduler = WorkerScheduler::new(config.update.run_timeout());
    scheduler.spawn(Box::new(TransportWorker::new(
        Box::new(transport),
        records_tx,
    )));
    scheduler.spawn(Box::new(UpdateWorker::new(
        records_rx,
        sink.clone(),
        config.paths.stats_file.clone(),
        config.update.sample_interval(),
    )));
    scheduler.spawn(Box::new(JobQueueWorker::new(
        JobQueueManager::new(
            GcodeMetaAuto::builtin(),
            config.paths.gcode_dir.clone(),
            sink.clone(),
        ),
        config.paths.jobs_file.clone(),
        job_commands_rx,
    )));

    // Outbound envelopes; clients attach here, the workers never block.
    let drain = tokio::spawn(async move {
        while let Some(notification) = notifications_rx.recv().await {
            forward(&notification);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    scheduler.shutdown();
    scheduler.join_all().await;
    drain.abort();

    Ok(())
}

fn forward(notification: &Notification) {
    match serde_json::to_string(notification) {
        Ok(body) => tracing::debug!("-> {body}"),
        Err(e) => tracing::error!("unserializable notification: {e}"),
    }
}
