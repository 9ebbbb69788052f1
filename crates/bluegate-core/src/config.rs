//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults (see the `Default` impls below)
//! 2. An optional TOML file (`/etc/bluegate/config.toml` on Linux)
//! 3. Environment variables prefixed with `BLUEGATE_`, using `__` between
//!    section and key, e.g. `BLUEGATE_SCAN__DISCOVERY_WINDOW_SECS=5`
//!
//! ```toml
//! [adapter]
//! name = "hci0"
//! powered = true
//! discoverable = true
//! pairable = true
//!
//! [scan]
//! discovery_window_secs = 10
//!
//! [server]
//! bind_address = "0.0.0.0:5000"
//!
//! [logging]
//! production = false
//! level = "info"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that points at the configuration file.
pub const CONFIG_PATH_ENV: &str = "BLUEGATE_CONFIG";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "BLUEGATE";

/// Longest discovery window accepted, in seconds.
pub const MAX_DISCOVERY_WINDOW_SECS: u64 = 300;

static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC address regex is valid")
});

static ADAPTER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^hci[0-9]+$").expect("adapter name regex is valid"));

/// Returns `true` if `address` looks like `AA:BB:CC:DD:EE:FF`.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// Returns `true` if `name` is a BlueZ adapter name such as `hci0`.
#[must_use]
pub fn is_valid_adapter_name(name: &str) -> bool {
    ADAPTER_NAME_RE.is_match(name)
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The sources could not be read, parsed or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field failed validation.
    #[error("Invalid {field}: {message}")]
    ValidationError {
        /// Dotted field name, e.g. `scan.discovery_window_secs`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Sections
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local adapter settings.
    pub adapter: AdapterConfig,
    /// Discovery settings.
    pub scan: ScanConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Which adapter to drive and the flags applied to it at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// BlueZ adapter name.
    pub name: String,
    /// Power the adapter on at startup.
    pub powered: bool,
    /// Make the adapter discoverable at startup.
    pub discoverable: bool,
    /// Make the adapter pairable at startup.
    pub pairable: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: "hci0".to_string(),
            powered: true,
            discoverable: true,
            pairable: true,
        }
    }
}

/// Discovery session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long discovery stays on per scan.
    pub discovery_window_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            discovery_window_secs: 10,
        }
    }
}

impl ScanConfig {
    /// The discovery window as a [`Duration`].
    #[must_use]
    pub const fn discovery_window(&self) -> Duration {
        Duration::from_secs(self.discovery_window_secs)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSON file logs plus compact stdout instead of pretty stdout.
    pub production: bool,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            production: false,
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Loads configuration from `BLUEGATE_CONFIG` (or the default path) and
    /// the environment, then validates it.
    ///
    /// A missing file at the default path is not an error; a missing file
    /// named by `BLUEGATE_CONFIG` is.
    pub fn load() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from(Some(Path::new(&path)), ENV_PREFIX),
            None => {
                let path = default_config_path();
                let path = path.exists().then_some(path);
                Self::load_from(path.as_deref(), ENV_PREFIX)
            }
        }
    }

    /// Loads from an optional file plus environment variables with `env_prefix`.
    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if !is_valid_adapter_name(&self.adapter.name) {
            errors.push(ConfigError::ValidationError {
                field: "adapter.name".to_string(),
                message: format!("'{}' is not an adapter name like 'hci0'", self.adapter.name),
            });
        }

        let window = self.scan.discovery_window_secs;
        if window == 0 || window > MAX_DISCOVERY_WINDOW_SECS {
            errors.push(ConfigError::ValidationError {
                field: "scan.discovery_window_secs".to_string(),
                message: format!("must be between 1 and {MAX_DISCOVERY_WINDOW_SECS}, got {window}"),
            });
        }

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::ValidationError {
                field: "server.bind_address".to_string(),
                message: format!("'{}' is not a socket address", self.server.bind_address),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Default configuration file location.
///
/// On Linux: `/etc/bluegate/config.toml`.
/// Elsewhere: the platform config directory, e.g. `~/.config/bluegate/`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/bluegate/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "bluegate").map_or_else(
            || PathBuf::from("config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}
