//! Exporter configuration.
//!
//! Configuration is read once at startup from a YAML file, layered with
//! `PLUGWATCH_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `PLUGWATCH_GLOBAL__SCRAPE_INTERVAL=30s`), and then resolved into the
//! immutable per-device settings the collectors run with.
//!
//! ```yaml
//! global:
//!   scrape_interval: 1m
//!   scrape_timeout: 10s
//! configs:
//!   - name: desk
//!     address: 192.168.1.20
//!     interval: 15s
//! ```

pub mod duration;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use ::config::{Environment, File, FileFormat, Source};
use plugwatch_types::{DeviceConfig, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use serde::Deserialize;
use thiserror::Error;

use duration::format_duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PLUGWATCH";

/// Default listen address of the metrics endpoint.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2112";

/// Default path of the metrics endpoint.
pub const DEFAULT_ENDPOINT: &str = "/metrics";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("device #{index} has no name")]
    MissingName { index: usize },

    #[error("device {name} has no address")]
    MissingAddress { name: String },

    #[error("device name {0} is configured more than once")]
    DuplicateName(String),

    #[error("global {0} must be greater than zero")]
    ZeroDefault(&'static str),

    #[error("device {name}: timeout {timeout} must be shorter than interval {interval}")]
    TimeoutNotBelowInterval {
        name: String,
        timeout: String,
        interval: String,
    },
}

/// How observations reach the metrics backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One scheduler per device pushes into the sink on its own interval.
    #[default]
    Push,
    /// Every scrape fans out to all devices and waits for the round.
    Pull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub global: GlobalConfig,
    pub log: LogConfig,
    pub server: ServerConfig,
    pub otel: Option<OtelSettings>,
    #[serde(rename = "configs")]
    pub devices: Vec<DeviceEntry>,
}

/// Defaults inherited by devices that do not override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    #[serde(deserialize_with = "duration::deserialize")]
    pub scrape_interval: Duration,
    #[serde(alias = "scape_timeout", deserialize_with = "duration::deserialize")]
    pub scrape_timeout: Duration,
    /// Accept self-signed certificates from `secure` plugs.
    pub tls_skip_verify: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scrape_interval: DEFAULT_INTERVAL,
            scrape_timeout: DEFAULT_TIMEOUT,
            tls_skip_verify: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub add_source: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub endpoint: String,
    pub namespace: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            namespace: None,
        }
    }
}

impl ServerConfig {
    /// Bindable listen address; a bare `:port` listens on all interfaces.
    pub fn socket_addr(&self) -> String {
        match self.listen_addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen_addr.clone(),
        }
    }
}

/// OTLP export settings, honoured with the `otel` feature.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtelSettings {
    pub endpoint: String,
    pub instance_id: String,
}

impl Default for OtelSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318".to_string(),
            instance_id: String::new(),
        }
    }
}

/// One entry of the `configs` list as written in the file.
///
/// Zero `interval`/`timeout` means "inherit the global default".
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceEntry {
    pub name: String,
    pub address: String,
    pub secure: bool,
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

impl fmt::Debug for DeviceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Environment source for `PLUGWATCH_*` overrides.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl Config {
    /// Load the YAML file at `path`, layered with environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).format(FileFormat::Yaml), environment())
    }

    /// Build from an arbitrary file source and environment source.
    pub fn build<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let layered = ::config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;
        Ok(layered.try_deserialize()?)
    }

    /// Parse a YAML document without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::build(
            File::from_str(yaml, FileFormat::Yaml),
            environment().source(Some(Default::default())),
        )
    }

    /// Validate the device list and apply global defaults.
    ///
    /// The returned list keeps file order. In push mode each resolved timeout
    /// must be shorter than its interval so ticks cannot overlap.
    pub fn resolve_devices(&self) -> Result<Vec<DeviceConfig>, ConfigError> {
        if self.global.scrape_interval.is_zero() {
            return Err(ConfigError::ZeroDefault("scrape_interval"));
        }
        if self.global.scrape_timeout.is_zero() {
            return Err(ConfigError::ZeroDefault("scrape_timeout"));
        }

        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());

        for (index, entry) in self.devices.iter().enumerate() {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(ConfigError::MissingName { index });
            }
            if entry.address.trim().is_empty() {
                return Err(ConfigError::MissingAddress {
                    name: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateName(name.to_string()));
            }

            let device = entry.resolve(&self.global);
            if self.mode == Mode::Push && device.timeout >= device.interval {
                return Err(ConfigError::TimeoutNotBelowInterval {
                    name: device.name,
                    timeout: format_duration(device.timeout),
                    interval: format_duration(device.interval),
                });
            }
            devices.push(device);
        }

        Ok(devices)
    }
}

impl DeviceEntry {
    fn resolve(&self, global: &GlobalConfig) -> DeviceConfig {
        let interval = if self.interval.is_zero() {
            global.scrape_interval
        } else {
            self.interval
        };
        let timeout = if self.timeout.is_zero() {
            global.scrape_timeout
        } else {
            self.timeout
        };

        DeviceConfig::new(self.name.trim(), self.address.trim())
            .with_secure(self.secure)
            .with_credentials(self.username.as_str(), self.password.as_str())
            .with_interval(interval)
            .with_timeout(timeout)
    }
}
