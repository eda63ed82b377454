//! Relay notifications
//!
//! Every transition and every call outcome is published as a [`RelayEvent`]
//! on a broadcast channel at the moment it happens. Subscribers that fall
//! behind lose the oldest events (see [`broadcast::error::RecvError::Lagged`]);
//! the relay itself never waits on them.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{ErrorKind, RelayError};

/// Capacity of the per-relay event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Description of the error that caused an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl FailureInfo {
    pub(crate) fn from_error<E: std::fmt::Display>(error: &RelayError<E>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Notification emitted by a relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Relay opened; carries the failure that tripped it
    Open { error: FailureInfo },
    /// Relay closed after a successful probe
    Close,
    /// Cooldown elapsed, next attempt is a probe
    HalfOpen,
    /// An attempt succeeded
    Success,
    /// An attempt failed (operation error or timeout)
    Failure { error: FailureInfo },
}

/// Sending side owned by the relay
#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }
}
