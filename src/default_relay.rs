//! Process-wide default relay
//!
//! A single slot that call sites can read instead of having a relay passed to
//! them. It holds at most one relay of any output/error type; the last
//! [`set_default`] wins. Prefer passing a [`Relay`] explicitly: the slot is
//! shared by everything in the process, so tests that touch it must clear it
//! when done and must not run concurrently with each other.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;

use crate::error::RelayError;
use crate::relay::Relay;

static DEFAULT_RELAY: Lazy<RwLock<Option<Box<dyn Any + Send + Sync>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install `relay` as the process-wide default, replacing any previous one
pub fn set_default<T, E>(relay: Relay<T, E>)
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let replaced = DEFAULT_RELAY.write().replace(Box::new(relay)).is_some();
    tracing::debug!(
        output = std::any::type_name::<T>(),
        error = std::any::type_name::<E>(),
        replaced,
        "Default relay set"
    );
}

/// Get a handle to the process-wide default relay
///
/// Fails with [`RelayError::NoDefaultInstance`] when the slot is empty or
/// holds a relay for a different output/error type.
pub fn get_default<T, E>() -> Result<Relay<T, E>, RelayError<E>>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    DEFAULT_RELAY
        .read()
        .as_ref()
        .and_then(|slot| slot.downcast_ref::<Relay<T, E>>())
        .cloned()
        .ok_or(RelayError::NoDefaultInstance)
}

/// Empty the slot, returning whether a relay was installed
///
/// Pending cooldowns of the removed relay keep running while other handles
/// to it exist.
pub fn clear_default() -> bool {
    DEFAULT_RELAY.write().take().is_some()
}
