//! Cancellation token support.
//!
//! Every container operation that may wait for an entry lock races that wait
//! against the [`CancellationToken`] carried by its [`Context`](crate::Context).
//! Tokens form a tree: cancelling a token cancels all of its children, and a
//! child may add a deadline of its own.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{DiError, DiResult};

/// Why a token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`CancellationToken::cancel`] was called on the token or an ancestor.
    Canceled,
    /// The token's deadline elapsed.
    DeadlineExceeded,
}

impl From<CancelReason> for DiError {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Canceled => DiError::Canceled,
            CancelReason::DeadlineExceeded => DiError::DeadlineExceeded,
        }
    }
}

/// A token that can be used to signal cancellation across async operations.
///
/// Explicit cancellation and the parent/child tree come from
/// [`tokio_util::sync::CancellationToken`]; this type adds an optional
/// deadline and remembers why the token ended.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{CancellationToken, CancelReason};
///
/// let parent = CancellationToken::new();
/// let child = parent.child_token();
///
/// parent.cancel();
/// assert!(child.is_cancelled());
/// assert_eq!(child.reason(), Some(CancelReason::Canceled));
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    token: tokio_util::sync::CancellationToken,
    deadline: Option<Instant>,
    // Shared by clones; the first recorded reason wins.
    reason: Arc<Mutex<Option<CancelReason>>>,
    created_at: Instant,
}

impl CancellationToken {
    /// Creates a new root token, never cancelled unless asked to.
    pub fn new() -> Self {
        Self::from_parts(tokio_util::sync::CancellationToken::new(), None)
    }

    fn from_parts(token: tokio_util::sync::CancellationToken, deadline: Option<Instant>) -> Self {
        Self {
            token,
            deadline,
            reason: Arc::new(Mutex::new(None)),
            created_at: Instant::now(),
        }
    }

    /// Creates a child token that is cancelled whenever this token is.
    ///
    /// Cancelling the child does not affect this token.
    pub fn child_token(&self) -> Self {
        Self::from_parts(self.token.child_token(), self.deadline)
    }

    /// Creates a child token that also expires at `deadline`.
    ///
    /// The child keeps the earlier of its parent's deadline and `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self::from_parts(self.token.child_token(), Some(deadline))
    }

    /// Creates a child token that expires after `timeout`.
    ///
    /// A timeout too large to be represented as an instant adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child_token(),
        }
    }

    /// Cancels the token and all of its descendants.
    pub fn cancel(&self) {
        self.record(CancelReason::Canceled);
        self.token.cancel();
    }

    fn record(&self, reason: CancelReason) -> CancelReason {
        *self.reason.lock().get_or_insert(reason)
    }

    /// Returns true if cancellation has been requested or the deadline elapsed.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Why this token was cancelled, if it was.
    ///
    /// The first observed reason wins. An elapsed deadline takes precedence
    /// over an ancestor's cancellation observed at the same time.
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = *self.reason.lock() {
            return Some(reason);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(self.record(CancelReason::DeadlineExceeded));
        }
        if self.token.is_cancelled() {
            return Some(self.record(CancelReason::Canceled));
        }
        None
    }

    /// The cancellation as an error, if the token is cancelled.
    pub fn error(&self) -> Option<DiError> {
        self.reason().map(DiError::from)
    }

    /// Fails with [`DiError::Canceled`] or [`DiError::DeadlineExceeded`] once cancelled.
    pub fn throw_if_cancelled(&self) -> DiResult<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Completes when the token is cancelled or its deadline elapses.
    ///
    /// Safe to use as a `tokio::select!` branch; dropping it leaves no trace.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
        // Record the reason while it is still unambiguous.
        self.reason();
    }

    /// The deadline of this token, if it has one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the elapsed time since this token was created.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &*self.reason.lock())
            .field("deadline", &self.deadline)
            .finish()
    }
}
