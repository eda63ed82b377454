/*!
 * Configuration types for Relay
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Relay behaviour settings, fixed for the lifetime of a relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Consecutive failures required to open the relay
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Base wait in milliseconds before probing after opening
    #[serde(default = "default_cool_down_ms")]
    pub cool_down_ms: u64,

    /// Maximum time in milliseconds an attempt may run
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,

    /// Double the cooldown for each consecutive open
    #[serde(default)]
    pub use_exponential_backoff: bool,

    /// Ceiling in milliseconds for the backoff-adjusted cooldown
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cool_down_ms: default_cool_down_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
            use_exponential_backoff: false,
            max_cooldown_ms: default_max_cooldown_ms(),
        }
    }
}

impl RelayConfig {
    /// Base cooldown as a `Duration`
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }

    /// Execution timeout as a `Duration`
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    /// Backoff ceiling as a `Duration`
    pub fn max_cooldown(&self) -> Duration {
        Duration::from_millis(self.max_cooldown_ms)
    }

    /// Check that every value is in range
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.execution_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.use_exponential_backoff && self.max_cooldown_ms < self.cool_down_ms {
            return Err(ConfigError::Invalid(format!(
                "max_cooldown_ms ({}) is below cool_down_ms ({})",
                self.max_cooldown_ms, self.cool_down_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a bare relay table
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Shorthand for level = debug
    #[serde(default)]
    pub verbose: bool,
}

/// On-disk settings document with `[relay]` and `[logging]` tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelaySettings {
    /// Parse and validate a settings document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: RelaySettings = toml::from_str(s)?;
        settings.relay.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cool_down_ms() -> u64 {
    30_000
}

fn default_execution_timeout_ms() -> u64 {
    10_000
}

fn default_max_cooldown_ms() -> u64 {
    600_000
}
