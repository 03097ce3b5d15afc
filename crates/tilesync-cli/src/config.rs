//! Configuration types for tilesync.
//! Parsed from ~/.tilesync/config.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tilesync_client::{ClientConfig, ReconnectPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub tiles: TilesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_base_address")]
    pub base_address: String,
    pub timeout_ms: Option<u64>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    pub max_attempts: Option<u32>,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
            jitter_ms: default_jitter_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TilesSection {
    /// JSON tile index mapping rendering ids to protocol ids.
    pub index: Option<String>,
}

// Default value functions
fn default_base_address() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter_ms() -> u64 {
    250
}

impl SyncConfig {
    /// Load config from file, or use defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: SyncConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_address: self.backend.base_address.clone(),
            timeout_ms: self.backend.timeout_ms,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
            jitter: Duration::from_millis(self.reconnect.jitter_ms),
        }
    }
}
