//! Application configuration management.
//!
//! Handles loading and validating lantern configuration:
//! - Scan timing (scan window, idle intervals, expiration)
//! - Optional UUID allow-list
//! - Bluetooth adapter selection
//!
//! Values are layered: defaults, then an optional TOML file, then
//! `LANTERN_*` environment variables (`__` separates sections, e.g.
//! `LANTERN_SCAN__SCAN_TIME_MS=2000`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default idle time between scans while no beacon is tracked.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 20_000;

/// Default time a beacon stays tracked after it was last seen.
pub const DEFAULT_EXPIRATION_INTERVAL_MS: u64 = 60_000;

/// Default length of each scanning window.
pub const DEFAULT_SCAN_TIME_MS: u64 = 5_000;

/// Default idle time between scans while a beacon is tracked.
pub const DEFAULT_FAST_SCAN_INTERVAL_MS: u64 = 5_000;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "LANTERN";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Field name as written in the config file.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} configuration errors: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Scan loop settings.
///
/// All durations are stored in milliseconds, matching the config file keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Idle time between scans while no beacon is tracked.
    pub scan_interval_ms: u64,

    /// Time a beacon stays tracked after it was last seen.
    pub expiration_interval_ms: u64,

    /// Length of each scanning window.
    pub scan_time_ms: u64,

    /// Idle time between scans while at least one beacon is tracked.
    pub fast_scan_interval_ms: u64,

    /// When set, only beacons with one of these UUIDs are tracked.
    pub uuid_filter: Option<Vec<Uuid>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            expiration_interval_ms: DEFAULT_EXPIRATION_INTERVAL_MS,
            scan_time_ms: DEFAULT_SCAN_TIME_MS,
            fast_scan_interval_ms: DEFAULT_FAST_SCAN_INTERVAL_MS,
            uuid_filter: None,
        }
    }
}

impl ScanConfig {
    /// Set the idle time used while no beacon is tracked.
    #[must_use]
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval_ms = millis(interval);
        self
    }

    /// Set how long a beacon stays tracked after it was last seen.
    #[must_use]
    pub fn with_expiration_interval(mut self, interval: Duration) -> Self {
        self.expiration_interval_ms = millis(interval);
        self
    }

    /// Set the length of each scanning window.
    #[must_use]
    pub fn with_scan_time(mut self, scan_time: Duration) -> Self {
        self.scan_time_ms = millis(scan_time);
        self
    }

    /// Set the idle time used while a beacon is tracked.
    #[must_use]
    pub fn with_fast_scan_interval(mut self, interval: Duration) -> Self {
        self.fast_scan_interval_ms = millis(interval);
        self
    }

    /// Only track beacons advertising one of `uuids`.
    #[must_use]
    pub fn with_uuid_filter(mut self, uuids: impl IntoIterator<Item = Uuid>) -> Self {
        self.uuid_filter = Some(uuids.into_iter().collect());
        self
    }

    /// Idle time between scans while no beacon is tracked.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Time a beacon stays tracked after it was last seen.
    #[must_use]
    pub const fn expiration_interval(&self) -> Duration {
        Duration::from_millis(self.expiration_interval_ms)
    }

    /// Length of each scanning window.
    #[must_use]
    pub const fn scan_time(&self) -> Duration {
        Duration::from_millis(self.scan_time_ms)
    }

    /// Idle time between scans while at least one beacon is tracked.
    #[must_use]
    pub const fn fast_scan_interval(&self) -> Duration {
        Duration::from_millis(self.fast_scan_interval_ms)
    }

    /// Whether a beacon with `uuid` passes the allow-list.
    #[must_use]
    pub fn accepts(&self, uuid: &Uuid) -> bool {
        self.uuid_filter
            .as_ref()
            .map_or(true, |allowed| allowed.contains(uuid))
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::ValidationError`] for a single invalid field
    /// or [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("scan_interval_ms", self.scan_interval_ms),
            ("expiration_interval_ms", self.expiration_interval_ms),
            ("scan_time_ms", self.scan_time_ms),
            ("fast_scan_interval_ms", self.fast_scan_interval_ms),
        ] {
            if value == 0 {
                errors.push(ConfigError::ValidationError {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.uuid_filter.as_ref().is_some_and(Vec::is_empty) {
            errors.push(ConfigError::ValidationError {
                field: "uuid_filter",
                message: "must list at least one UUID; omit it to accept every beacon"
                    .to_string(),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Bluetooth adapter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter name (e.g. `hci0`). Uses the system default when unset.
    pub adapter: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan loop settings.
    pub scan: ScanConfig,

    /// Bluetooth adapter settings.
    pub bluetooth: BluetoothConfig,
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// With `path` set the file must exist. Without it, `config.toml` in the
    /// platform config directory is used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or the
    /// resulting values fail validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_env(path, env_source())
    }

    fn load_with_env(path: Option<&Path>, env: ::config::Environment) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                builder = builder.add_source(
                    ::config::File::new(&path.to_string_lossy(), ::config::FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                if let Some(default) = default_config_path() {
                    builder = builder.add_source(
                        ::config::File::new(&default.to_string_lossy(), ::config::FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.scan.validate()?;
        Ok(config)
    }
}

/// Default configuration file location.
///
/// `~/.config/lantern/config.toml` on Linux, the platform equivalent elsewhere.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "lantern").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn env_source() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("scan.uuid_filter")
        .try_parsing(true)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
