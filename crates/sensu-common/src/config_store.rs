// ConfigurationStore: loads and validates the client configuration file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Transport implementations the client knows how to build.
pub const KNOWN_TRANSPORTS: &[&str] = &["memory"];

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Persisted client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Client identity, sent as `client` in every check result.
    pub name: String,

    /// Address advertised for this client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Subscriptions to bind, one subscriber each.
    #[serde(default)]
    pub subscriptions: Vec<String>,

    /// Named command checks registered in the check store at startup.
    #[serde(default)]
    pub checks: BTreeMap<String, CheckDefinition>,

    /// Transport selection.
    #[serde(default)]
    pub transport: TransportSettings,

    /// Values masked out of every log line.
    #[serde(default)]
    pub redact: Vec<String>,
}

/// A check defined in configuration and registered by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckDefinition {
    pub command: String,

    /// Seconds before the command is cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSettings {
    #[serde(default = "default_transport_name")]
    pub name: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            name: default_transport_name(),
        }
    }
}

fn default_transport_name() -> String {
    "memory".to_string()
}

/// Why a configuration was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("client name must not be empty")]
    MissingName,
    #[error("subscription names must not be empty")]
    EmptySubscription,
    #[error("check '{0}' has an empty command")]
    EmptyCheckCommand(String),
    #[error("unknown transport '{0}'")]
    UnknownTransport(String),
}

impl ClientConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(json).context("Failed to deserialize client configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the client relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.subscriptions.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptySubscription);
        }
        if let Some((name, _)) = self.checks.iter().find(|(_, c)| c.command.trim().is_empty()) {
            return Err(ConfigError::EmptyCheckCommand(name.clone()));
        }
        if !KNOWN_TRANSPORTS.contains(&self.transport.name.as_str()) {
            return Err(ConfigError::UnknownTransport(self.transport.name.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigurationStore
// ---------------------------------------------------------------------------

/// Loads the client configuration from disk, caching it after the first read.
pub struct ConfigurationStore {
    config_file_path: PathBuf,
    config: Mutex<Option<ClientConfig>>,
}

impl ConfigurationStore {
    pub fn new(config_file_path: impl Into<PathBuf>) -> Self {
        Self {
            config_file_path: config_file_path.into(),
            config: Mutex::new(None),
        }
    }

    pub fn config_file_path(&self) -> &Path {
        &self.config_file_path
    }

    /// Whether the configuration file exists.
    pub fn is_configured(&self) -> bool {
        self.config_file_path.exists()
    }

    /// Load and return the configuration. Cached after first load.
    pub fn get_config(&self) -> anyhow::Result<ClientConfig> {
        let mut guard = self
            .config
            .lock()
            .map_err(|_| anyhow::anyhow!("configuration cache poisoned"))?;
        if let Some(ref config) = *guard {
            return Ok(config.clone());
        }

        let json = fs::read_to_string(&self.config_file_path).with_context(|| {
            format!("Failed to read configuration from {:?}", self.config_file_path)
        })?;
        let config = ClientConfig::from_json(&json)
            .with_context(|| format!("Invalid configuration in {:?}", self.config_file_path))?;

        *guard = Some(config.clone());
        Ok(config)
    }
}
