//! Diagnostic observers for registry traceability.
//!
//! Observers are told about every build and teardown the container performs.
//! They are called synchronously on the task doing the work, so keep them
//! lightweight.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for build and teardown events.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Container, ContainerObserver, DiError, Key};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct BuildCounter(AtomicUsize);
///
/// impl ContainerObserver for BuildCounter {
///     fn building(&self, _key: &Key) {}
///
///     fn built(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
///
///     fn build_failed(&self, _key: &Key, _error: &DiError) {}
/// }
///
/// let counter = Arc::new(BuildCounter::default());
/// let container = Container::builder().observer(counter.clone()).build();
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Called before a builder is invoked.
    fn building(&self, key: &Key);

    /// Called after a builder succeeded and its instance was cached.
    fn built(&self, key: &Key, duration: Duration);

    /// Called when a builder failed or panicked; the entry stays uninitialized.
    fn build_failed(&self, key: &Key, error: &DiError);

    /// Called after an initialized entry was closed, whether or not its closer failed.
    fn closed(&self, key: &Key, error: Option<&DiError>) {
        let _ = (key, error);
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Builds and teardowns are logged at `DEBUG`, failures at `WARN`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates a new tracing observer.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerObserver for TracingObserver {
    fn building(&self, key: &Key) {
        tracing::debug!(key = %key, "building service");
    }

    fn built(&self, key: &Key, duration: Duration) {
        tracing::debug!(key = %key, elapsed_ms = duration.as_millis() as u64, "service built");
    }

    fn build_failed(&self, key: &Key, error: &DiError) {
        tracing::warn!(key = %key, error = %error, "service build failed");
    }

    fn closed(&self, key: &Key, error: Option<&DiError>) {
        match error {
            Some(error) => tracing::warn!(key = %key, error = %error, "service close failed"),
            None => tracing::debug!(key = %key, "service closed"),
        }
    }
}

/// Collection of observers notified in registration order.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ContainerObserver>>,
}

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn ContainerObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn building(&self, key: &Key) {
        for observer in &self.observers {
            observer.building(key);
        }
    }

    pub(crate) fn built(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.built(key, duration);
        }
    }

    pub(crate) fn build_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.build_failed(key, error);
        }
    }

    pub(crate) fn closed(&self, key: &Key, error: Option<&DiError>) {
        for observer in &self.observers {
            observer.closed(key, error);
        }
    }
}
