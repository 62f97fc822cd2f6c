//! Configuration for the CresKit bridge.
//!
//! A TOML file (platform config dir or an explicit path) merged with
//! `CRESKIT_*` environment variables, and translation to
//! `creskit_core::BridgeConfig`. The CLI layers its flag overrides on
//! top before translating.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use creskit_core::{BridgeConfig, CoreError, PeerConfig, PointConfig, PointKind};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Controller host name or address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Controller TCP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Gap between retransmissions of unanswered reads.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Retransmissions before a read gives up. Unset = never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Pause after a failed connect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Consecutive failed connects before giving up. Unset = never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connect_attempts: Option<u32>,

    /// Bridged devices.
    #[serde(default)]
    pub accessories: Vec<AccessoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_connect_attempts: None,
            accessories: Vec::new(),
        }
    }
}

fn default_retry_interval_ms() -> u64 {
    2000
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_connect_timeout_secs() -> u64 {
    10
}

/// One `[[accessories]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessoryConfig {
    /// Device kind, e.g. "Lightbulb".
    #[serde(rename = "type")]
    pub kind: String,

    /// Controller-side instance id. Written as a bare number or a string.
    pub id: AccessoryId,

    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AccessoryId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Config {
    /// A starter config with one accessory, written by `config init`.
    pub fn example() -> Self {
        Self {
            host: Some("192.168.1.50".into()),
            port: Some(41794),
            accessories: vec![AccessoryConfig {
                kind: PointKind::Lightbulb.to_string(),
                id: AccessoryId::Number(1),
                name: "Kitchen".into(),
            }],
            ..Self::default()
        }
    }

    /// Parse and check every accessory entry.
    pub fn points(&self) -> Result<Vec<PointConfig>, ConfigError> {
        self.accessories
            .iter()
            .enumerate()
            .map(|(i, acc)| {
                let kind = PointKind::from_str(&acc.kind).map_err(|_| ConfigError::Validation {
                    field: format!("accessories[{i}].type"),
                    reason: format!("unknown accessory type '{}'", acc.kind),
                })?;
                Ok(PointConfig::new(kind, acc.id.to_string(), acc.name.clone()))
            })
            .collect()
    }

    /// Build the runtime `BridgeConfig`.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::Validation {
                field: "host".into(),
                reason: "not set (use --host or CRESKIT_HOST)".into(),
            })?;
        let port = self
            .port
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::Validation {
                field: "port".into(),
                reason: "not set or zero (use --port or CRESKIT_PORT)".into(),
            })?;
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "retry_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let mut peer = PeerConfig::new(host, port);
        peer.retry_delay = Duration::from_millis(self.reconnect_delay_ms);
        peer.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        peer.max_attempts = self.max_connect_attempts;

        let mut bridge = BridgeConfig::new(peer);
        bridge.points = self.points()?;
        bridge.retry_interval = Duration::from_millis(self.retry_interval_ms);
        bridge.max_retries = self.max_retries;

        bridge.validate().map_err(|e| match e {
            CoreError::Config { message } => ConfigError::Validation {
                field: "accessories".into(),
                reason: message,
            },
            other => ConfigError::Validation {
                field: "config".into(),
                reason: other.to_string(),
            },
        })?;
        Ok(bridge)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "creskit", "creskit").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("creskit");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from `path` (missing file is fine) + environment.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CRESKIT_").ignore(&["config"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
