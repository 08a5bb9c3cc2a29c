//! Configuration structures for service registry

use crate::{
    backend::{FileStore, MemoryStore, SnapshotStore},
    error::Result,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Failure detector configuration
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Discovery client configuration
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Snapshot file; `None` keeps the table in memory only
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: Option<PathBuf>,
}

/// Failure detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Pause between probe rounds, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Probe attempts per registration per round
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause after a failed attempt, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// HTTP timeout for probes and pushes, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Discovery client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registry `/services` endpoint
    #[serde(default = "default_registry_url")]
    pub registry_url: String,
    /// HTTP timeout for registry calls, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_snapshot_path() -> Option<PathBuf> {
    Some(PathBuf::from("./registry.json"))
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_registry_url() -> String {
    "http://localhost:3000/services".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from file
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use async_fs::File;
        use futures::io::AsyncReadExt;

        let mut file = File::open(path.as_ref()).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        // YAML by extension, JSON otherwise
        if path.as_ref().extension().and_then(|s| s.to_str()) == Some("yaml")
            || path.as_ref().extension().and_then(|s| s.to_str()) == Some("yml")
        {
            Ok(serde_yaml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }
}

impl ServerConfig {
    /// Snapshot store matching `snapshot_path`
    pub fn snapshot_store(&self) -> Box<dyn SnapshotStore> {
        match &self.snapshot_path {
            Some(path) => Box::new(FileStore::new(path)),
            None => Box::new(MemoryStore::new()),
        }
    }
}

impl HeartbeatConfig {
    /// Pause between rounds
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Pause after a failed attempt
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// HTTP timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ClientConfig {
    /// HTTP timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
