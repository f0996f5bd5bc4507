//! Configuration for the DNH hub.
//!
//! A JSON or TOML file (chosen by extension), layered over built-in
//! defaults and under `DNH_`-prefixed environment variables. The binary
//! applies its CLI flags on top of the result.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dnh_core::{HubSettings, ValueSet};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Prefix for environment overrides, e.g. `DNH_WS_PORT`.
pub const ENV_PREFIX: &str = "DNH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

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

// ── Config struct ───────────────────────────────────────────────────

/// Effective hub configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Seconds between keepalive pings; 0 disables them.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Per-connection outbound queue depth.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default)]
    pub verbose: bool,

    /// Daily-rolled log file in addition to stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Datacache parameter definitions.
    #[serde(default)]
    pub params: Vec<serde_json::Value>,

    #[serde(default)]
    pub startupcmds: Vec<String>,

    #[serde(default)]
    pub resetcmds: Vec<String>,

    #[serde(default)]
    pub fatalcmds: Vec<String>,

    #[serde(default)]
    pub endcmds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            ping_interval_secs: default_ping_interval(),
            outbound_queue: default_outbound_queue(),
            verbose: false,
            log_file: None,
            params: Vec::new(),
            startupcmds: Vec::new(),
            resetcmds: Vec::new(),
            fatalcmds: Vec::new(),
            endcmds: Vec::new(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_http_port() -> u16 {
    5700
}
fn default_ws_port() -> u16 {
    5701
}
fn default_ping_interval() -> u64 {
    10
}
fn default_outbound_queue() -> usize {
    dnh_core::DEFAULT_OUTBOUND_QUEUE
}

impl Config {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.http_port)
    }

    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.ws_port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// The part of the config the hub coordinator consumes.
    pub fn to_hub_settings(&self) -> HubSettings {
        HubSettings {
            params: self.params.clone(),
            startupcmds: self.startupcmds.clone(),
            resetcmds: self.resetcmds.clone(),
            fatalcmds: self.fatalcmds.clone(),
            endcmds: self.endcmds.clone(),
        }
    }

    /// Reject settings the servers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port != 0 && self.http_port == self.ws_port {
            return Err(ConfigError::Validation {
                field: "ws_port".into(),
                reason: format!("must differ from http_port ({})", self.http_port),
            });
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::Validation {
                field: "outbound_queue".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Parse every configured param definition, returning one message per
    /// rejected entry. Duplicate ids count as errors.
    pub fn check_params(&self) -> Vec<String> {
        let mut seen = ValueSet::new();
        self.params
            .iter()
            .enumerate()
            .filter_map(|(index, definition)| {
                seen.parse_and_insert(definition)
                    .err()
                    .map(|e| format!("params[{index}]: {e}"))
            })
            .collect()
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Per-user config file used when the working directory has none.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "dnh", "dnh").map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

/// Which file, if any, a load would read.
///
/// An explicit path must exist. Without one, `./config.json` and then the
/// per-user file are tried; finding neither is not an error.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(Some(path.to_path_buf()))
        } else {
            Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        };
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Ok(Some(local));
    }
    Ok(user_config_path().filter(|p| p.is_file()))
}

// ── Config loading ──────────────────────────────────────────────────

/// Result of [`load_config`]: the config plus the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

/// Defaults, then the file (JSON unless the extension is `.toml`), then
/// `DNH_` environment variables.
pub fn figment_for(file: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    if let Some(path) = file {
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        figment = if is_toml {
            figment.merge(Toml::file(path))
        } else {
            figment.merge(Json::file(path))
        };
    }
    figment.merge(Env::prefixed(ENV_PREFIX))
}

/// Load and validate the config.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let source = resolve_config_path(explicit)?;
    let config: Config = figment_for(source.as_deref()).extract()?;
    config.validate()?;
    Ok(LoadedConfig { config, source })
}
