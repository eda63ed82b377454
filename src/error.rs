/*!
 * Error types for Relay
 */

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors produced by a relay-protected call
///
/// `Open` and `Timeout` are synthesized by the relay itself; `Operation`
/// carries the wrapped operation's own error untouched. All three go through
/// fallback resolution. `NoDefaultInstance` is only returned by
/// [`get_default`](crate::default_relay::get_default) and never reaches a fallback.
#[derive(Debug, Error)]
pub enum RelayError<E> {
    /// Relay is open, the operation was not invoked
    #[error("relay is open, call not attempted")]
    Open,

    /// Operation did not complete within the execution timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Failure surfaced by the wrapped operation
    #[error("{0}")]
    Operation(E),

    /// No default relay has been configured for this output/error type
    #[error("no default relay configured")]
    NoDefaultInstance,
}

/// Discriminant of a [`RelayError`], independent of the operation error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Open,
    Timeout,
    Operation,
    NoDefaultInstance,
}

impl<E> RelayError<E> {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Open => ErrorKind::Open,
            RelayError::Timeout(_) => ErrorKind::Timeout,
            RelayError::Operation(_) => ErrorKind::Operation,
            RelayError::NoDefaultInstance => ErrorKind::NoDefaultInstance,
        }
    }

    /// Check whether the relay rejected the call without running it
    pub fn is_open(&self) -> bool {
        matches!(self, RelayError::Open)
    }

    /// Check whether the operation ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Timeout(_))
    }

    /// Borrow the operation's own error, if this is one
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            RelayError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's own error, if this is one
    pub fn into_operation(self) -> Option<E> {
        match self {
            RelayError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Open => "open",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Operation => "operation",
            ErrorKind::NoDefaultInstance => "no_default_instance",
        };
        f.write_str(name)
    }
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config document is not valid TOML for the expected schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config values are out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}
