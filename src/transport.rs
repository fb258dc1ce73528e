// src/transport.rs - Pub/sub transport adapter feeding the translator
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::MqttConfig;
use crate::telemetry::TelemetryRecord;
use crate::worker::{Worker, WorkerError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MQTT connection failed: {0}")]
    ConnectionFailed(String),
    #[error("MQTT error: {0}")]
    Mqtt(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Bounded fetch/publish view of the device connection.
///
/// Everything above this trait treats the transport as a message source;
/// connection management stays behind it.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Collect decoded messages arriving within `timeout`. An empty batch
    /// is the normal idle outcome, not an error.
    async fn fetch(&mut self, timeout: Duration) -> Result<Vec<(String, Vec<TelemetryRecord>)>>;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Device connection over rumqttc.
pub struct MqttTransport {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttTransport {
    pub async fn connect(config: &MqttConfig) -> Result<Self> {
        let client_id = format!("anker-bridge-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_credentials(&config.username, &config.password);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);

        if !config.insecure {
            // The device endpoint runs TLS with a vendor certificate chain.
            let tls = TlsConfiguration::Simple {
                ca: config.ca_cert.clone().unwrap_or_default().into_bytes(),
                alpn: None,
                client_auth: None,
            };
            options.set_transport(Transport::tls_with_config(tls));
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let mut transport = Self { client, event_loop };

        transport.wait_for_connack(config.connect_timeout()).await?;
        transport
            .client
            .subscribe(&config.subscribe_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Mqtt(e.to_string()))?;
        tracing::info!("connected to {}:{}", config.host, config.port);

        Ok(transport)
    }

    async fn wait_for_connack(&mut self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                return Err(TransportError::ConnectionFailed("connect timeout".into()));
            }
            match tokio::time::timeout(Duration::from_millis(500), self.event_loop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => return Ok(()),
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(TransportError::ConnectionFailed(e.to_string())),
                Err(_) => continue,
            }
        }
    }
}

/// Decode one message payload into telemetry records.
///
/// A payload is either a JSON object or an array of objects; anything
/// else decodes to an empty batch. Bad input is the device's problem,
/// not a reason to drop the connection.
pub fn decode_payload(payload: &[u8]) -> Vec<TelemetryRecord> {
    let value: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("undecodable payload: {e}");
            return Vec::new();
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("skipping malformed record: {e}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl TelemetrySource for MqttTransport {
    async fn fetch(&mut self, timeout: Duration) -> Result<Vec<(String, Vec<TelemetryRecord>)>> {
        let mut batches = Vec::new();
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = if batches.is_empty() {
                deadline.saturating_duration_since(Instant::now())
            } else {
                // Something already arrived; only drain what is immediately
                // behind it instead of sitting out the full window.
                Duration::from_millis(10)
            };
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, self.event_loop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    let records = decode_payload(&publish.payload);
                    batches.push((publish.topic, records));
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(TransportError::Mqtt(e.to_string())),
                Err(_) => break,
            }
        }

        Ok(batches)
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| TransportError::Mqtt(e.to_string()))
    }
}

/// Worker pumping fetched records into the translator's channel.
pub struct TransportWorker {
    source: Box<dyn TelemetrySource>,
    records_tx: mpsc::Sender<TelemetryRecord>,
}

impl TransportWorker {
    pub fn new(source: Box<dyn TelemetrySource>, records_tx: mpsc::Sender<TelemetryRecord>) -> Self {
        Self { source, records_tx }
    }
}

#[async_trait]
impl Worker for TransportWorker {
    fn name(&self) -> &'static str {
        "transport"
    }

    async fn run(&mut self, timeout: Duration) -> std::result::Result<(), WorkerError> {
        for (topic, records) in self.source.fetch(timeout).await? {
            tracing::info!("TOPIC [{topic}]");
            for record in records {
                if self.records_tx.send(record).await.is_err() {
                    tracing::debug!("translator channel closed, dropping record");
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_object() {
        let records = decode_payload(br#"{"commandType": 1001, "time": 70}"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].command_type, 1001);
    }

    #[test]
    fn test_decode_array_of_objects() {
        let records =
            decode_payload(br#"[{"commandType": 1003}, {"commandType": 1004}, "noise"]"#);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_decode_garbage_is_empty() {
        assert!(decode_payload(b"\xff\x00 not json").is_empty());
        assert!(decode_payload(b"42").is_empty());
    }
}
