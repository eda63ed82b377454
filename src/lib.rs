//! Relay: a circuit breaker for asynchronous operations
//!
//! # Overview
//!
//! A [`Relay`] wraps fallible async operations, counts consecutive failures
//! and fails fast once a threshold is crossed. After a cooldown it lets a
//! probe through; the probe decides whether the relay closes again or stays
//! open for another (optionally longer) cooldown.
//!
//! - **State machine**: Closed → Open → HalfOpen → Closed / Open
//! - **Timeouts**: every attempt races an execution timeout; a timeout is a failure
//! - **Backoff**: optional exponential cooldown growth, capped
//! - **Fallbacks**: a default fallback and per-operation keyed fallbacks
//! - **Metrics & events**: cumulative counters and a broadcast event stream
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │ run / attempt
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Relay                             │  ← Fail-fast gate
//! │  (Open? reject : race execution_timeout)│
//! └──────┬──────────────────────┬───────────┘
//!        │ ok                   │ error / timeout / open
//!        ▼                      ▼
//!    caller            ┌──────────────────────┐
//!                      │  Keyed fallback       │
//!                      │  → default fallback   │
//!                      │  → propagate          │
//!                      └──────────────────────┘
//!
//!  Side channels:
//!   RelayEvent broadcast → open / close / half_open / success / failure
//!   RelayMetrics snapshot → successes, failures, timeouts, total
//! ```
//!
//! # Usage Example
//!
//! ## Basic Relay
//!
//! ```no_run
//! use relay::{Relay, RelayConfig, RelayError};
//!
//! # async fn example() -> Result<(), RelayError<std::io::Error>> {
//! let config = RelayConfig {
//!     failure_threshold: 5,
//!     cool_down_ms: 30_000,
//!     use_exponential_backoff: true,
//!     ..Default::default()
//! };
//!
//! let relay = Relay::new(config);
//!
//! let value = relay.run(|| async {
//!     // Your potentially failing operation
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Keyed Fallback
//!
//! ```no_run
//! use relay::{OperationKey, Relay, RelayConfig};
//!
//! # async fn example() {
//! let relay: Relay<String, std::io::Error> = Relay::new(RelayConfig::default());
//! let fetch_user: OperationKey<u64> = OperationKey::new("fetch_user");
//!
//! relay.register(&fetch_user, |_err, id| async move {
//!     Ok(format!("user-{} (cached)", id))
//! });
//!
//! let user = relay
//!     .attempt(&fetch_user, 7, |id| async move {
//!         Ok::<_, std::io::Error>(format!("user-{}", id))
//!     })
//!     .await;
//! # }
//! ```
//!
//! Relays time attempts and schedule their cooldown on tokio, so they must be
//! used from inside a tokio runtime with the time driver enabled.

pub mod backoff;
pub mod config;
pub mod default_relay;
pub mod error;
pub mod events;
pub mod fallback;
pub mod logging;
pub mod metrics;
pub mod relay;

// Re-export main types for convenience
pub use config::{LogLevel, LoggingConfig, RelayConfig, RelaySettings};
pub use default_relay::{clear_default, get_default, set_default};
pub use error::{ConfigError, ErrorKind, RelayError};
pub use events::{FailureInfo, RelayEvent};
pub use fallback::{Fallback, FallbackFuture, OperationKey};
pub use metrics::RelayMetrics;
pub use relay::{CircuitState, Relay};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use relay::prelude::*;
/// ```
pub mod prelude {
    pub use super::config::RelayConfig;
    pub use super::error::{ErrorKind, RelayError};
    pub use super::events::RelayEvent;
    pub use super::fallback::{Fallback, OperationKey};
    pub use super::relay::{CircuitState, Relay};
}
