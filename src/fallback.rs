//! Fallback resolution
//!
//! A relay can hold one default fallback, called with the error alone, and
//! any number of keyed fallbacks, each called with the error and the
//! arguments of the attempt that failed. Keys are explicit [`OperationKey`]
//! tokens: an attempt made under a key uses that key's fallback and nothing
//! else's.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::RelayError;

/// Future returned by a stored fallback
pub type FallbackFuture<T, E> = BoxFuture<'static, Result<T, RelayError<E>>>;

pub(crate) type DefaultFallback<T, E> =
    Arc<dyn Fn(RelayError<E>) -> FallbackFuture<T, E> + Send + Sync>;

pub(crate) fn default_fallback<T, E, F, Fut>(f: F) -> DefaultFallback<T, E>
where
    F: Fn(RelayError<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, RelayError<E>>> + Send + 'static,
{
    Arc::new(move |err| f(err).boxed())
}

/// Identifies one protected operation and the argument type it takes
///
/// Two keys are the same operation when their names match. The argument type
/// is part of the key's type so a fallback can only be registered for, and
/// called with, the arguments its operation actually receives.
pub struct OperationKey<A> {
    name: Arc<str>,
    _args: PhantomData<fn(A)>,
}

impl<A> OperationKey<A> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            _args: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<A> Clone for OperationKey<A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            _args: PhantomData,
        }
    }
}

impl<A> fmt::Debug for OperationKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationKey").field(&self.name).finish()
    }
}

/// Fallback for a keyed operation, called with the error and the attempt's arguments
pub struct Fallback<T, E, A> {
    f: Arc<dyn Fn(RelayError<E>, A) -> FallbackFuture<T, E> + Send + Sync>,
}

impl<T, E, A> Fallback<T, E, A> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RelayError<E>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RelayError<E>>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |err, args| f(err, args).boxed()),
        }
    }

    pub(crate) fn call(&self, err: RelayError<E>, args: A) -> FallbackFuture<T, E> {
        (self.f)(err, args)
    }
}

impl<T, E, A> Clone for Fallback<T, E, A> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<T, E, A> fmt::Debug for Fallback<T, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback").finish_non_exhaustive()
    }
}

/// Keyed fallbacks of one relay
///
/// Entries are type-erased because each key carries its own argument type.
pub(crate) struct FallbackRegistry<T, E> {
    entries: RwLock<HashMap<Arc<str>, Box<dyn Any + Send + Sync>>>,
    _types: PhantomData<fn() -> (T, E)>,
}

impl<T, E> FallbackRegistry<T, E>
where
    T: 'static,
    E: 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            _types: PhantomData,
        }
    }

    /// Store a fallback, replacing any previous one under the same name
    pub(crate) fn insert<A: 'static>(&self, key: &OperationKey<A>, fallback: Fallback<T, E, A>) {
        let replaced = self
            .entries
            .write()
            .insert(Arc::clone(&key.name), Box::new(fallback))
            .is_some();
        tracing::debug!(operation = key.name(), replaced, "Registered fallback");
    }

    pub(crate) fn remove<A>(&self, key: &OperationKey<A>) -> bool {
        self.entries.write().remove(&key.name).is_some()
    }

    /// Find the fallback for `key`; a name registered with another argument type is a miss
    pub(crate) fn get<A: 'static>(&self, key: &OperationKey<A>) -> Option<Fallback<T, E, A>> {
        let entries = self.entries.read();
        let entry = entries.get(&key.name)?;
        match entry.downcast_ref::<Fallback<T, E, A>>() {
            Some(fallback) => Some(fallback.clone()),
            None => {
                tracing::debug!(
                    operation = key.name(),
                    "Fallback registered with a different argument type, ignoring"
                );
                None
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<T, E> fmt::Debug for FallbackRegistry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut names: Vec<&str> = entries.keys().map(|k| &**k).collect();
        names.sort_unstable();
        f.debug_struct("FallbackRegistry")
            .field("operations", &names)
            .finish()
    }
}
