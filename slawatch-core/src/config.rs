//! Console configuration
//!
//! Handles:
//! - Backend base URL (env override `SLAWATCH_API_URL`)
//! - Poll cadences and page sizes per data source
//! - Where the session is persisted (file or OS keyring)

use crate::error::SessionError;
use crate::session::{FileStore, KeyValueStore, KeyringStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    /// No timeout unless set; a hung request only delays its own loop.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub alerts_interval_secs: u64,
    pub live_feed_interval_secs: u64,
    pub connectivity_interval_secs: u64,
    pub alerts_limit: u32,
    pub live_feed_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    /// Overrides `<config_dir>/slawatch/session.json` for the file backend.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    File,
    Keyring,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            user_agent: format!("slawatch/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            alerts_interval_secs: 10,
            live_feed_interval_secs: 3,
            connectivity_interval_secs: 30,
            alerts_limit: 50,
            live_feed_limit: 20,
        }
    }
}

impl PollingConfig {
    pub fn alerts_period(&self) -> Duration {
        Duration::from_secs(self.alerts_interval_secs.max(1))
    }

    pub fn live_feed_period(&self) -> Duration {
        Duration::from_secs(self.live_feed_interval_secs.max(1))
    }

    pub fn connectivity_period(&self) -> Duration {
        Duration::from_secs(self.connectivity_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { backend: SessionBackend::File, path: None }
    }
}

impl SessionConfig {
    /// Build the durable store this configuration points at.
    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>, SessionError> {
        match self.backend {
            SessionBackend::Keyring => Ok(Box::new(KeyringStore::new("slawatch"))),
            SessionBackend::File => match &self.path {
                Some(path) => Ok(Box::new(FileStore::new(path))),
                None => Ok(Box::new(FileStore::default_location()?)),
            },
        }
    }
}

impl ConsoleConfig {
    /// `SLAWATCH_CONFIG` if set, else `<config_dir>/slawatch/config.toml`.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SLAWATCH_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()?;
        path.push("slawatch");
        path.push("config.toml");
        Some(path)
    }

    /// Load from disk. Missing or invalid files fall back to defaults.
    pub async fn load() -> Self {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => match tokio::fs::read_to_string(&path).await {
                Ok(txt) if txt.trim().is_empty() => Self::default(),
                Ok(txt) => Self::from_toml(&txt).unwrap_or_else(|e| {
                    warn!("Invalid config {}: {}", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("Could not read config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        config.apply_env();
        config
    }

    pub fn from_toml(txt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(txt)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SLAWATCH_API_URL") {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }

    pub async fn save(&self) -> std::io::Result<()> {
        let path = Self::config_file_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory")
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, content).await
    }
}
