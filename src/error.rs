//! Error types for the registry.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::key::Key;

/// Boxed error returned by builders and closers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Registry errors
///
/// Every error returned by [`Container`](crate::Container) operations is
/// wrapped in [`DiError::Service`] with the key that produced it. Because a
/// builder that fails on a nested lookup usually propagates that failure, the
/// display form of a nested failure reads as a path through the registry:
///
/// ```text
/// alloc::string::String(a): alloc::string::String(b): alloc::string::String(a): cycle
/// ```
///
/// Use [`DiError::root_cause`] to get at the innermost kind.
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::{DiError, Key};
///
/// let err = DiError::NotSet.with_key(Key::named::<u32>("port"));
/// assert_eq!(err.to_string(), "u32(port): not set");
/// assert!(err.is_not_set());
/// assert!(matches!(err.root_cause(), DiError::NotSet));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// Service not registered
    #[error("not set")]
    NotSet,
    /// Service registered twice under the same key
    #[error("already set")]
    AlreadySet,
    /// Registered instance is not of the requested type
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// The requested type
        expected: &'static str,
    },
    /// The key is already being built on the current call path
    #[error("cycle")]
    Cycle,
    /// The ambient cancellation token was cancelled
    #[error("context canceled")]
    Canceled,
    /// The ambient deadline elapsed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    /// A builder or closer panicked
    #[error(transparent)]
    Panic(#[from] PanicError),
    /// A builder reported its own failure
    #[error("{0}")]
    Builder(#[source] Arc<dyn StdError + Send + Sync>),
    /// A closer reported its own failure
    #[error("{0}")]
    Close(#[source] Arc<dyn StdError + Send + Sync>),
    /// Failure attributed to a key
    #[error("{key}: {source}")]
    Service {
        /// The key whose operation failed
        key: Key,
        /// What went wrong
        #[source]
        source: Box<DiError>,
    },
    /// Several independent failures, e.g. from closing a container
    #[error("{}", join_errors(.0))]
    Multiple(Vec<DiError>),
    /// Container options could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn join_errors(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl DiError {
    /// Wraps an arbitrary builder failure.
    ///
    /// If the error already is a `DiError` (typically a failed nested lookup
    /// propagated with `?`), it is returned unchanged so its key path survives.
    pub fn builder(err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<DiError>() {
            Ok(err) => *err,
            Err(err) => DiError::Builder(Arc::from(err)),
        }
    }

    pub(crate) fn close(err: BoxError) -> Self {
        match err.downcast::<DiError>() {
            Ok(err) => *err,
            Err(err) => DiError::Close(Arc::from(err)),
        }
    }

    /// Attributes this error to `key`.
    pub fn with_key(self, key: Key) -> Self {
        DiError::Service {
            key,
            source: Box::new(self),
        }
    }

    /// Joins errors; `Ok` when there are none.
    pub(crate) fn join(errors: Vec<DiError>) -> DiResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Multiple(errors))
        }
    }

    /// The innermost error, skipping every key attribution.
    pub fn root_cause(&self) -> &DiError {
        let mut err = self;
        while let DiError::Service { source, .. } = err {
            err = source;
        }
        err
    }

    /// The keys this error passed through, outermost first.
    pub fn key_path(&self) -> Vec<&Key> {
        let mut path = Vec::new();
        let mut err = self;
        while let DiError::Service { key, source } = err {
            path.push(key);
            err = source;
        }
        path
    }

    /// The joined errors of a [`DiError::Multiple`], or this error alone.
    pub fn errors(&self) -> &[DiError] {
        match self {
            DiError::Multiple(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }

    /// Returns true if the root cause is [`DiError::NotSet`].
    pub fn is_not_set(&self) -> bool {
        matches!(self.root_cause(), DiError::NotSet)
    }

    /// Returns true if the root cause is [`DiError::AlreadySet`].
    pub fn is_already_set(&self) -> bool {
        matches!(self.root_cause(), DiError::AlreadySet)
    }

    /// Returns true if the root cause is [`DiError::Cycle`].
    pub fn is_cycle(&self) -> bool {
        matches!(self.root_cause(), DiError::Cycle)
    }

    /// Returns true if the root cause is a cancellation or an elapsed deadline.
    pub fn is_canceled(&self) -> bool {
        matches!(
            self.root_cause(),
            DiError::Canceled | DiError::DeadlineExceeded
        )
    }

    /// The recovered panic at the root of this error, if any.
    pub fn as_panic(&self) -> Option<&PanicError> {
        match self.root_cause() {
            DiError::Panic(panic) => Some(panic),
            _ => None,
        }
    }
}

/// Result type for registry operations
pub type DiResult<T> = Result<T, DiError>;

/// A panic recovered from a builder or closer.
///
/// The panic payload is retained, so the original value can be inspected
/// with [`PanicError::downcast_payload`] or taken back with
/// [`PanicError::take_payload`]. When the payload is itself a [`DiError`] or
/// a [`BoxError`], it is also exposed as this error's `source()`.
#[derive(Clone)]
pub struct PanicError {
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
    payload: Arc<Mutex<Option<Box<dyn Any + Send>>>>,
}

impl PanicError {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else if let Some(err) = payload.downcast_ref::<DiError>() {
            err.to_string()
        } else if let Some(err) = payload.downcast_ref::<BoxError>() {
            err.to_string()
        } else {
            "Box<dyn Any>".to_string()
        };

        let cause: Option<Arc<dyn StdError + Send + Sync>> =
            if let Some(err) = payload.downcast_ref::<DiError>() {
                Some(Arc::new(err.clone()))
            } else if let Some(err) = payload.downcast_ref::<BoxError>() {
                Some(Arc::new(PanicCause(err.to_string())))
            } else {
                None
            };

        Self {
            message,
            cause,
            payload: Arc::new(Mutex::new(Some(payload))),
        }
    }

    /// The panic message, or `Box<dyn Any>` when the payload is not printable.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the payload is still present and is a `T`.
    pub fn payload_is<T: Any>(&self) -> bool {
        self.payload
            .lock()
            .as_ref()
            .is_some_and(|payload| payload.is::<T>())
    }

    /// A copy of the payload if it is a `T`.
    pub fn downcast_payload<T: Any + Clone>(&self) -> Option<T> {
        self.payload
            .lock()
            .as_ref()
            .and_then(|payload| payload.downcast_ref::<T>().cloned())
    }

    /// Takes the original payload out, e.g. to resume unwinding with it.
    ///
    /// Clones of this error share the payload; only the first call gets it.
    pub fn take_payload(&self) -> Option<Box<dyn Any + Send>> {
        self.payload.lock().take()
    }
}

impl fmt::Debug for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicError")
            .field("message", &self.message)
            .field("has_cause", &self.cause.is_some())
            .finish()
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl StdError for PanicError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

// Boxed errors cannot be cloned out of the payload; keep their rendering.
#[derive(Debug)]
struct PanicCause(String);

impl fmt::Display for PanicCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for PanicCause {}
