//! Bootstrap configuration for compmon
//!
//! Settings come from an optional TOML file. Each key resolves in this order:
//!
//! 1. Command-line arguments (applied by the binary through [`ConfigOverrides`])
//! 2. TOML configuration file
//! 3. Built-in defaults (code constants)
//!
//! The TOML file itself is located by:
//!
//! 1. Explicit path (command-line `--config`)
//! 2. `COMPMON_CONFIG` environment variable
//! 3. `<config_dir>/compmon/config.toml`
//!
//! An explicit path that does not exist is an error. A missing default file is
//! not: the built-in defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "COMPMON_CONFIG";

/// Default remote host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default remote REST port
pub const DEFAULT_PORT: u16 = 8080;

/// Default remote API-version prefix
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Default seconds between update cycles
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default bind address of the local read API
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5730";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Remote host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote REST port
    #[serde(default = "default_port")]
    pub port: u16,

    /// API-version path prefix prepended to every remote path
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Seconds between update cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Re-run tree discovery on this cadence (disabled when absent)
    #[serde(default)]
    pub rediscover_interval_secs: Option<u64>,

    /// Bind address of the local read API
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Per-request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-request timeouts in milliseconds
///
/// Discovery fetches a potentially large document and gets the longest bound.
/// The clip-name fallback gets the shortest so a slow fallback path cannot
/// hold up a whole cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_composition_ms")]
    pub composition_ms: u64,
    #[serde(default = "default_layer_ms")]
    pub layer_ms: u64,
    #[serde(default = "default_clip_ms")]
    pub clip_ms: u64,
    #[serde(default = "default_trigger_ms")]
    pub trigger_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_composition_ms() -> u64 {
    10_000
}

fn default_layer_ms() -> u64 {
    5_000
}

fn default_clip_ms() -> u64 {
    2_000
}

fn default_trigger_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            poll_interval_secs: default_poll_interval_secs(),
            rediscover_interval_secs: None,
            listen_addr: default_listen_addr(),
            timeouts: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            composition_ms: default_composition_ms(),
            layer_ms: default_layer_ms(),
            clip_ms: default_clip_ms(),
            trigger_ms: default_trigger_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl TimeoutConfig {
    pub fn composition(&self) -> Duration {
        Duration::from_millis(self.composition_ms)
    }

    pub fn layer(&self) -> Duration {
        Duration::from_millis(self.layer_ms)
    }

    pub fn clip(&self) -> Duration {
        Duration::from_millis(self.clip_ms)
    }

    pub fn trigger(&self) -> Duration {
        Duration::from_millis(self.trigger_ms)
    }
}

impl TomlConfig {
    /// Base URL of the remote REST API, including the version prefix
    ///
    /// ```
    /// use compmon_common::config::TomlConfig;
    ///
    /// let config = TomlConfig::default();
    /// assert_eq!(config.base_url(), "http://127.0.0.1:8080/api/v1");
    /// ```
    pub fn base_url(&self) -> String {
        let prefix = self.api_prefix.trim_end_matches('/');
        let prefix = if prefix.is_empty() || prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{}", prefix)
        };
        format!("http://{}:{}{}", self.host.trim(), self.port, prefix)
    }

    /// Interval between update cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Interval between scheduled rediscoveries, if enabled
    pub fn rediscover_interval(&self) -> Option<Duration> {
        self.rediscover_interval_secs.map(Duration::from_secs)
    }

    /// Apply command-line overrides (highest priority)
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(listen_addr) = &overrides.listen_addr {
            self.listen_addr = listen_addr.clone();
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.rediscover_interval_secs == Some(0) {
            return Err(Error::Config(
                "rediscover_interval_secs must be at least 1 when set".to_string(),
            ));
        }
        let timeouts = [
            ("composition_ms", self.timeouts.composition_ms),
            ("layer_ms", self.timeouts.layer_ms),
            ("clip_ms", self.timeouts.clip_ms),
            ("trigger_ms", self.timeouts.trigger_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::Config(format!("timeouts.{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub listen_addr: Option<String>,
}

/// Default config file location for the platform
///
/// `~/.config/compmon/config.toml` on Linux, the platform config directory
/// elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("compmon").join("config.toml"))
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
}

/// Where [`load_config`] found its settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` argument
    CommandLine(PathBuf),
    /// `COMPMON_CONFIG` environment variable
    Environment(PathBuf),
    /// Platform default location
    DefaultPath(PathBuf),
    /// No file; `searched` is the default location that was missing
    BuiltInDefaults { searched: Option<PathBuf> },
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CommandLine(path) => write!(f, "{:?} (command line)", path),
            ConfigSource::Environment(path) => write!(f, "{:?} ({})", path, CONFIG_ENV_VAR),
            ConfigSource::DefaultPath(path) => write!(f, "{:?}", path),
            ConfigSource::BuiltInDefaults { searched: Some(path) } => {
                write!(f, "built-in defaults (no file at {:?})", path)
            }
            ConfigSource::BuiltInDefaults { searched: None } => {
                write!(f, "built-in defaults (no config directory)")
            }
        }
    }
}

/// Locate and load the bootstrap configuration
///
/// `cli_path` takes priority over the `COMPMON_CONFIG` environment variable,
/// which takes priority over the platform default location. Nothing is
/// logged here since this runs before the subscriber exists; the caller logs
/// the returned [`ConfigSource`].
pub fn load_config(cli_path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = cli_path {
        let config = load_toml_config(path)?;
        return Ok((config, ConfigSource::CommandLine(path.to_path_buf())));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            let path = PathBuf::from(path);
            let config = load_toml_config(&path)?;
            return Ok((config, ConfigSource::Environment(path)));
        }
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::DefaultPath(path)))
        }
        searched => Ok((TomlConfig::default(), ConfigSource::BuiltInDefaults { searched })),
    }
}
