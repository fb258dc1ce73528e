// src/config.rs - Bridge configuration
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub update: UpdateConfig,
}

/// Device connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,

    /// Plain TCP instead of TLS; for local test brokers.
    #[serde(default)]
    pub insecure: bool,

    /// PEM bundle for the device endpoint's certificate chain.
    #[serde(default)]
    pub ca_cert: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            subscribe_topic: default_subscribe_topic(),
            insecure: false,
            ca_cert: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MqttConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_gcode_dir")]
    pub gcode_dir: PathBuf,

    #[serde(default = "default_jobs_file")]
    pub jobs_file: PathBuf,

    #[serde(default = "default_stats_file")]
    pub stats_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gcode_dir: default_gcode_dir(),
            jobs_file: default_jobs_file(),
            stats_file: default_stats_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateConfig {
    /// Seconds between heartbeat/sample ticks.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: f64,

    /// Upper bound on any worker's single idle wait.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval(),
            run_timeout_ms: default_run_timeout(),
        }
    }
}

impl UpdateConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sample_interval_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8883
}

fn default_subscribe_topic() -> String {
    "anker/+/report".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_gcode_dir() -> PathBuf {
    PathBuf::from("database/gcodes")
}

fn default_jobs_file() -> PathBuf {
    PathBuf::from("jobs.json")
}

fn default_stats_file() -> PathBuf {
    PathBuf::from("stats.json")
}

fn default_sample_interval() -> f64 {
    1.0
}

fn default_run_timeout() -> u64 {
    500
}

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let mut content = String::new();
    File::open(path)?.read_to_string(&mut content)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.paths.jobs_file, PathBuf::from("jobs.json"));
        assert_eq!(config.update.sample_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            "[mqtt]\nhost = \"10.0.0.5\"\ninsecure = true\n\n[update]\nrun_timeout_ms = 250\n",
        )
        .unwrap();
        assert_eq!(config.mqtt.host, "10.0.0.5");
        assert!(config.mqtt.insecure);
        assert_eq!(config.update.run_timeout(), Duration::from_millis(250));
        assert_eq!(config.mqtt.port, 8883);
    }
}
