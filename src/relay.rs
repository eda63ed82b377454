//! Relay: circuit breaker state machine
//!
//! A relay wraps asynchronous operations and fails fast once they keep
//! failing. It has three states:
//! - Closed: normal operation, attempts run
//! - Open: attempts are rejected without running until the cooldown elapses
//! - HalfOpen: the next attempt is a probe; success closes, failure reopens
//!
//! ```text
//! Closed   → Open:     failure_count reaches failure_threshold
//! Open     → HalfOpen: cooldown timer fires
//! HalfOpen → Closed:   an attempt succeeds
//! HalfOpen → Open:     an attempt fails (counts as another consecutive open)
//! ```
//!
//! The cooldown is a one-shot tokio task owned by the relay. With exponential
//! backoff enabled it doubles on every consecutive open, up to `max_cooldown`.
//!
//! Every attempt races the operation against `execution_timeout`. On timeout
//! the operation's future is dropped, so it stops at its next await point and
//! its result is never observed.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::backoff::cooldown_for;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::events::{EventBus, FailureInfo, RelayEvent};
use crate::fallback::{default_fallback, DefaultFallback, Fallback, FallbackRegistry, OperationKey};
use crate::metrics::{Counters, RelayMetrics};

/// State of the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Attempts run normally
    Closed,
    /// Attempts are rejected without running
    Open,
    /// Cooldown elapsed, the next attempt decides
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Mutable state, guarded by one mutex
#[derive(Debug)]
struct RelayState {
    circuit: CircuitState,
    /// Consecutive failures since the last success or close
    failure_count: u32,
    /// Opens since the relay was last closed
    consecutive_open_count: u32,
    /// Epoch millis of the last failure that opened the relay
    last_failure_time: u64,
    counters: Counters,
    cooldown_timer: Option<JoinHandle<()>>,
    /// Bumped on every schedule/cancel so a stale timer cannot fire
    timer_epoch: u64,
}

impl RelayState {
    fn new() -> Self {
        Self {
            circuit: CircuitState::Closed,
            failure_count: 0,
            consecutive_open_count: 0,
            last_failure_time: 0,
            counters: Counters::default(),
            cooldown_timer: None,
            timer_epoch: 0,
        }
    }

    /// Cancel the pending cooldown, returning whether there was one
    fn cancel_timer(&mut self) -> bool {
        self.timer_epoch = self.timer_epoch.wrapping_add(1);
        match self.cooldown_timer.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

struct Inner<T, E> {
    config: RelayConfig,
    state: Mutex<RelayState>,
    events: EventBus,
    default_fallback: Option<DefaultFallback<T, E>>,
    fallbacks: FallbackRegistry<T, E>,
}

impl<T, E> Drop for Inner<T, E> {
    fn drop(&mut self) {
        self.state.get_mut().cancel_timer();
    }
}

/// Circuit breaker for asynchronous operations
///
/// `T` is the success value of protected operations and `E` their error.
/// Cloning a relay yields another handle to the same state.
///
/// Attempts and the cooldown timer run on tokio: `run` and `attempt` must be
/// awaited inside a tokio runtime with the time driver enabled.
///
/// # Example
/// ```no_run
/// use relay::{Relay, RelayConfig, RelayError};
///
/// #[tokio::main]
/// async fn main() {
///     let relay: Relay<String, std::io::Error> = Relay::with_fallback(
///         RelayConfig::default(),
///         |_err| async { Ok("cached".to_string()) },
///     );
///
///     let body = relay
///         .run(|| async { Ok::<_, std::io::Error>("fresh".to_string()) })
///         .await;
///
///     println!("{:?}", body.map_err(|e: RelayError<_>| e.kind()));
/// }
/// ```
pub struct Relay<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Relay<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Relay<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.inner.config)
            .field("has_default_fallback", &self.inner.default_fallback.is_some())
            .field("fallbacks", &self.inner.fallbacks)
            .finish_non_exhaustive()
    }
}

impl<T, E> Relay<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a relay without a default fallback
    pub fn new(config: RelayConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a relay whose failures resolve through `fallback`
    ///
    /// The fallback receives the error (`Open`, `Timeout` or `Operation`) and
    /// its result is returned to the caller in place of the error.
    pub fn with_fallback<F, Fut>(config: RelayConfig, fallback: F) -> Self
    where
        F: Fn(RelayError<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RelayError<E>>> + Send + 'static,
    {
        Self::build(config, Some(default_fallback(fallback)))
    }

    fn build(config: RelayConfig, default_fallback: Option<DefaultFallback<T, E>>) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Relay created with out-of-range config");
        }
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(RelayState::new()),
                events: EventBus::new(),
                default_fallback,
                fallbacks: FallbackRegistry::new(),
            }),
        }
    }

    /// Run an operation under relay protection
    ///
    /// Failures resolve through the default fallback if one was configured,
    /// otherwise they are returned.
    pub async fn run<F, Fut>(&self, op: F) -> Result<T, RelayError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.guarded(op).await {
            Ok(value) => Ok(value),
            Err(error) => self.resolve_default(error).await,
        }
    }

    /// Run a keyed operation with `args` under relay protection
    ///
    /// On failure the fallback registered for `key` is called with the error
    /// and a copy of `args`. Without one, resolution continues as in
    /// [`run`](Self::run).
    pub async fn attempt<A, F, Fut>(
        &self,
        key: &OperationKey<A>,
        args: A,
        op: F,
    ) -> Result<T, RelayError<E>>
    where
        A: Clone + 'static,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let retained = args.clone();
        match self.guarded(move || op(args)).await {
            Ok(value) => Ok(value),
            Err(error) => match self.inner.fallbacks.get(key) {
                Some(fallback) => {
                    tracing::debug!(
                        operation = key.name(),
                        kind = %error.kind(),
                        "Using registered fallback"
                    );
                    fallback.call(error, retained).await
                }
                None => self.resolve_default(error).await,
            },
        }
    }

    /// Gate, run with timeout, and account for the outcome
    async fn guarded<F, Fut>(&self, op: F) -> Result<T, RelayError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.inner.admit().await {
            tracing::debug!("Relay open, rejecting call");
            return Err(RelayError::Open);
        }

        let limit = self.inner.config.execution_timeout();
        let outcome = match tokio::time::timeout(limit, op()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RelayError::Operation(e)),
            Err(_) => Err(RelayError::Timeout(limit)),
        };

        match outcome {
            Ok(value) => {
                self.inner.on_success().await;
                Ok(value)
            }
            Err(error) => {
                self.inner.on_failure(&error).await;
                Err(error)
            }
        }
    }

    async fn resolve_default(&self, error: RelayError<E>) -> Result<T, RelayError<E>> {
        match &self.inner.default_fallback {
            Some(fallback) => {
                tracing::debug!(kind = %error.kind(), "Using default fallback");
                fallback(error).await
            }
            None => Err(error),
        }
    }

    /// Register a fallback for attempts made under `key`
    ///
    /// Replaces any fallback previously registered under the same name.
    pub fn register<A, F, Fut>(&self, key: &OperationKey<A>, fallback: F)
    where
        A: 'static,
        F: Fn(RelayError<E>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RelayError<E>>> + Send + 'static,
    {
        self.inner.fallbacks.insert(key, Fallback::new(fallback));
    }

    /// Register each `(key, fallback)` pair
    pub fn register_all<A, I>(&self, pairs: I)
    where
        A: 'static,
        I: IntoIterator<Item = (OperationKey<A>, Fallback<T, E, A>)>,
    {
        for (key, fallback) in pairs {
            self.inner.fallbacks.insert(&key, fallback);
        }
    }

    /// Remove the fallback registered under `key`, returning whether one existed
    pub fn unregister<A>(&self, key: &OperationKey<A>) -> bool {
        self.inner.fallbacks.remove(key)
    }

    /// Cancel the pending cooldown timer
    ///
    /// Idempotent. State, counters and metrics are left as they are; an open
    /// relay stays open.
    pub async fn cleanup(&self) {
        let mut state = self.inner.state.lock().await;
        if state.cancel_timer() {
            tracing::debug!(state = %state.circuit, "Cancelled pending cooldown");
        }
    }

    /// Subscribe to relay notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the cumulative counters and current state
    pub async fn metrics(&self) -> RelayMetrics {
        let state = self.inner.state.lock().await;
        state.counters.snapshot(state.circuit)
    }

    /// Get the current state
    pub async fn state(&self) -> CircuitState {
        self.inner.state.lock().await.circuit
    }

    /// Epoch millis of the last failure that opened the relay, 0 if never opened
    pub async fn last_failure_time(&self) -> u64 {
        self.inner.state.lock().await.last_failure_time
    }

    /// Get current consecutive failure count
    pub async fn failure_count(&self) -> u32 {
        self.inner.state.lock().await.failure_count
    }

    /// Get the number of opens since the relay was last closed
    pub async fn consecutive_open_count(&self) -> u32 {
        self.inner.state.lock().await.consecutive_open_count
    }

    /// Check whether a cooldown timer is pending
    pub async fn cooldown_pending(&self) -> bool {
        self.inner.state.lock().await.cooldown_timer.is_some()
    }

    /// Configuration this relay was built with
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }
}

impl<T, E> Inner<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Whether an attempt may run now
    async fn admit(&self) -> bool {
        self.state.lock().await.circuit != CircuitState::Open
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.counters.record_success();
        state.failure_count = 0;

        if state.circuit == CircuitState::HalfOpen {
            self.close(&mut state);
        }

        tracing::debug!(state = %state.circuit, "Call succeeded");
        self.events.emit(RelayEvent::Success);
    }

    async fn on_failure(self: &Arc<Self>, error: &RelayError<E>) {
        let mut state = self.state.lock().await;
        state.counters.record_failure(error.is_timeout());
        state.failure_count = state.failure_count.saturating_add(1);

        let cause = FailureInfo::from_error(error);
        tracing::debug!(
            state = %state.circuit,
            failures = state.failure_count,
            kind = %cause.kind,
            error = %cause.message,
            "Call failed"
        );
        self.events.emit(RelayEvent::Failure {
            error: cause.clone(),
        });

        // A completion that lands after the relay opened is counted but cannot reopen it
        let should_open = match state.circuit {
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
            CircuitState::Closed => state.failure_count >= self.config.failure_threshold,
        };
        if should_open {
            self.trip(&mut state, cause);
        }
    }

    fn trip(self: &Arc<Self>, state: &mut RelayState, cause: FailureInfo) {
        state.consecutive_open_count = state.consecutive_open_count.saturating_add(1);
        state.circuit = CircuitState::Open;
        state.last_failure_time = now_millis();

        let cooldown = cooldown_for(&self.config, state.consecutive_open_count);
        tracing::warn!(
            failures = state.failure_count,
            consecutive_opens = state.consecutive_open_count,
            cooldown_ms = cooldown.as_millis() as u64,
            error = %cause.message,
            "Relay opened"
        );
        self.events.emit(RelayEvent::Open { error: cause });

        self.schedule_half_open(state, cooldown);
    }

    fn schedule_half_open(self: &Arc<Self>, state: &mut RelayState, cooldown: Duration) {
        state.cancel_timer();
        let epoch = state.timer_epoch;
        let weak = Arc::downgrade(self);

        state.cooldown_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if let Some(inner) = weak.upgrade() {
                inner.half_open(epoch).await;
            }
        }));
    }

    async fn half_open(&self, epoch: u64) {
        let mut state = self.state.lock().await;
        if state.timer_epoch != epoch || state.circuit != CircuitState::Open {
            return;
        }

        // The timer is the running task; dropping the handle just detaches it
        state.cooldown_timer = None;
        state.circuit = CircuitState::HalfOpen;
        state.failure_count = 0;

        tracing::info!(
            consecutive_opens = state.consecutive_open_count,
            "Relay half-open, next call probes"
        );
        self.events.emit(RelayEvent::HalfOpen);
    }

    fn close(&self, state: &mut RelayState) {
        state.circuit = CircuitState::Closed;
        state.consecutive_open_count = 0;
        state.failure_count = 0;
        state.cancel_timer();

        tracing::info!("Relay closed");
        self.events.emit(RelayEvent::Close);
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
