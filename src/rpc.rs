// src/rpc.rs - JSON-RPC notification envelopes and the outbound sink
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

/// A push message in JSON-RPC 2.0 notification form; no response expected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
}

impl Notification {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
        }
    }

    /// Incremental status update: changed sections plus an event timestamp.
    pub fn status_update(update: Map<String, Value>) -> Self {
        let ts = Utc::now().timestamp_millis() as f64 / 1000.0;
        Self::new("notify_status_update", vec![Value::Object(update), json!(ts)])
    }

    /// Empty-params heartbeat variant of `notify_status_update`.
    pub fn status_heartbeat() -> Self {
        Self::new("notify_status_update", vec![json!({})])
    }

    pub fn gcode_response(text: &str) -> Self {
        Self::new("notify_gcode_response", vec![json!(text)])
    }

    pub fn history_changed(action: &str, job: Value) -> Self {
        Self::new(
            "notify_history_changed",
            vec![json!({ "action": action, "job": job })],
        )
    }

    pub fn job_queue_changed(action: &str, queue: Vec<Value>, state: &str) -> Self {
        Self::new(
            "notify_job_queue_changed",
            vec![json!({
                "action": action,
                "updated_queue": queue,
                "queue_state": state,
            })],
        )
    }
}

/// Capability handle for emitting notifications.
///
/// Units are handed a sink at construction instead of looking siblings up
/// by name; the sink owner decides where envelopes actually go.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink forwarding envelopes over an unbounded channel to the host.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver dropped means the host is shutting down; nothing useful
        // to do with the envelope at that point.
        if self.tx.send(notification).is_err() {
            tracing::debug!("notification dropped: sink closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let n = Notification::gcode_response("ok");
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["method"], "notify_gcode_response");
        assert_eq!(v["params"], json!(["ok"]));
    }

    #[test]
    fn test_heartbeat_params_are_empty() {
        let n = Notification::status_heartbeat();
        assert_eq!(n.params, vec![json!({})]);
    }

    #[test]
    fn test_job_queue_envelope_carries_state_token() {
        let n = Notification::job_queue_changed("jobs_added", vec![], "ready");
        assert_eq!(n.params[0]["queue_state"], "ready");
        assert_eq!(n.params[0]["action"], "jobs_added");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(Notification::status_heartbeat());
        let got = rx.recv().await.unwrap();
        assert_eq!(got.method, "notify_status_update");
    }
}
