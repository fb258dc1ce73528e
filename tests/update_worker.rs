use std::sync::Arc;
use std::time::Duration;

use anker_bridge::rpc::{ChannelSink, NotificationSink};
use anker_bridge::telemetry::TelemetryRecord;
use anker_bridge::updates::{TempHistory, UpdateWorker};
use anker_bridge::worker::{Worker, WorkerScheduler};
use serde_json::json;
use tokio::sync::mpsc;

fn record(fields: serde_json::Value) -> TelemetryRecord {
    serde_json::from_value(fields).unwrap()
}

#[tokio::test]
async fn test_worker_publishes_diff_for_incoming_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut notifications) = ChannelSink::new();
    let (records_tx, records_rx) = mpsc::channel(16);

    let mut worker = UpdateWorker::new(
        records_rx,
        Arc::new(sink) as Arc<dyn NotificationSink>,
        dir.path().join("stats.json"),
        Duration::from_secs(60), // keep heartbeats out of this test
    );
    worker.init().await.unwrap();

    records_tx
        .send(record(json!({"commandType": 1004, "currentTemp": "5000", "targetTemp": "6000"})))
        .await
        .unwrap();

    // One pass drains the channel and publishes the resulting diff.
    worker.run(Duration::from_millis(10)).await.unwrap();

    let update = notifications.recv().await.unwrap();
    assert_eq!(update.method, "notify_status_update");
    let sections = update.params[0].as_object().unwrap();
    assert_eq!(sections["heater_bed"]["temperature"], json!(50.0));
    assert!(update.params[1].is_number());
}

#[tokio::test]
async fn test_heartbeat_and_stats_flush() {
    let dir = tempfile::tempdir().unwrap();
    let stats_path = dir.path().join("stats.json");
    let (sink, mut notifications) = ChannelSink::new();
    let (_records_tx, records_rx) = mpsc::channel(16);

    let mut worker = UpdateWorker::new(
        records_rx,
        Arc::new(sink) as Arc<dyn NotificationSink>,
        stats_path.clone(),
        Duration::from_millis(20),
    );
    worker.init().await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    worker.run(Duration::from_millis(10)).await.unwrap();
    worker.stop().await.unwrap();

    let heartbeat = notifications.recv().await.unwrap();
    assert_eq!(heartbeat.method, "notify_status_update");
    assert_eq!(heartbeat.params, vec![json!({})]);

    let history = TempHistory::load(&stats_path);
    assert_eq!(history.nozzle.len(), 1);
    assert_eq!(history.hotbed.len(), 1);
}

#[tokio::test]
async fn test_scheduler_drives_worker_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut notifications) = ChannelSink::new();
    let (records_tx, records_rx) = mpsc::channel(16);

    let worker = UpdateWorker::new(
        records_rx,
        Arc::new(sink) as Arc<dyn NotificationSink>,
        dir.path().join("stats.json"),
        Duration::from_secs(60),
    );

    let mut scheduler = WorkerScheduler::new(Duration::from_millis(5));
    scheduler.spawn(Box::new(worker));

    records_tx
        .send(record(json!({"commandType": 1000, "subType": 1, "value": 1})))
        .await
        .unwrap();

    let update = tokio::time::timeout(Duration::from_secs(1), notifications.recv())
        .await
        .expect("diff published before timeout")
        .unwrap();
    assert_eq!(update.method, "notify_status_update");
    assert_eq!(update.params[0]["print_stats"]["state"], "printing");

    scheduler.shutdown();
    scheduler.join_all().await;
}
