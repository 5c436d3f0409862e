//! Client configuration.
//!
//! Stored as TOML:
//! - Linux: `~/.config/cfms/client.toml`
//! - Windows: `%APPDATA%/cfms/client.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use cfms_connection::ConnectOptions;
use cfms_protocol::constants::TRANSFER_MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::ClientError;
use crate::types::RetryConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address, e.g. `wss://files.example.org:5104`.
    #[serde(default)]
    pub server_address: String,

    /// Verify server certificates.
    #[serde(default = "default_true")]
    pub enforce_tls: bool,

    /// Extra CA bundle (PEM) trusted when enforcing TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    /// Root for temporary download state.
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    /// Message-size cap on dedicated transfer connections.
    #[serde(default = "default_transfer_max_message_size")]
    pub transfer_max_message_size: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub upload_retry: RetryConfig,
}

fn default_true() -> bool {
    true
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("cfms")
}

fn default_transfer_max_message_size() -> usize {
    TRANSFER_MAX_MESSAGE_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            enforce_tls: true,
            ca_file: None,
            temp_root: default_temp_root(),
            transfer_max_message_size: default_transfer_max_message_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            upload_retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the platform path, creating a default file if none exists.
    pub fn load() -> Result<Self, ClientError> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ClientError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = ClientConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves to the platform path.
    pub fn save(&self) -> Result<(), ClientError> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Options for the shared control connection.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            enforce_tls: self.enforce_tls,
            ca_file: self.ca_file.clone(),
            max_message_size: None,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// Options for dedicated transfer connections.
    pub fn transfer_options(&self) -> ConnectOptions {
        ConnectOptions {
            max_message_size: Some(self.transfer_max_message_size),
            ..self.connect_options()
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("cfms").join("client.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("cfms")
            .join("client.toml")
    }
}
