//! Call context threaded through every registry operation.
//!
//! A [`Context`] plays the role of the ambient request context: it carries
//! the cancellation token, the chain of entry locks held by the current
//! logical call path, and the dependency collector of the build that is in
//! progress. Builders receive a context and must forward it to every nested
//! lookup so cycles and dependencies are attributed to the right build.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::cancellation::CancellationToken;
use crate::dependency::DependencyCollector;
use crate::error::DiError;
use crate::internal::LockChain;

/// Context passed to container operations and builders.
///
/// Cloning is cheap. Derived contexts never affect the context they were
/// derived from.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Container, Context, Built};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ferrous_registry::DiError> {
/// let container = Container::new();
/// container.set::<String, _, _>("greeting", |_ctx, _ctn| async {
///     Ok(Built::new("hello".to_string()))
/// })?;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// let greeting = container.get::<String>(&ctx, "greeting").await?;
/// assert_eq!(greeting.as_str(), "hello");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Context {
    token: CancellationToken,
    locks: LockChain,
    collector: Option<Arc<DependencyCollector>>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled by `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Derives a context with a child token, returned for cancelling it.
    pub fn with_cancel(&self) -> (Context, CancellationToken) {
        let token = self.token.child_token();
        (self.replace_token(token.clone()), token)
    }

    /// Derives a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.replace_token(self.token.with_timeout(timeout))
    }

    /// Derives a context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        self.replace_token(self.token.with_deadline(deadline))
    }

    fn replace_token(&self, token: CancellationToken) -> Context {
        Context {
            token,
            locks: self.locks.clone(),
            collector: self.collector.clone(),
        }
    }

    /// The cancellation token of this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The cancellation error, once the context is done.
    pub fn err(&self) -> Option<DiError> {
        self.token.error()
    }

    /// Completes when the context is cancelled or its deadline elapses.
    pub async fn done(&self) {
        self.token.cancelled().await
    }

    /// Number of entry locks held on this call path, i.e. the nesting depth
    /// of the build currently running.
    pub fn depth(&self) -> usize {
        self.locks.len()
    }

    pub(crate) fn lock_chain(&self) -> &LockChain {
        &self.locks
    }

    pub(crate) fn with_lock_chain(&self, locks: LockChain) -> Context {
        Context {
            token: self.token.clone(),
            locks,
            collector: self.collector.clone(),
        }
    }

    pub(crate) fn with_collector(&self, collector: Arc<DependencyCollector>) -> Context {
        Context {
            token: self.token.clone(),
            locks: self.locks.clone(),
            collector: Some(collector),
        }
    }

    pub(crate) fn collector(&self) -> Option<&Arc<DependencyCollector>> {
        self.collector.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("token", &self.token)
            .field("depth", &self.locks.len())
            .field("collecting", &self.collector.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_cancel_does_not_cancel_parent() {
        let parent = Context::background();
        let (child, token) = parent.with_cancel();
        token.cancel();
        assert!(matches!(child.err(), Some(DiError::Canceled)));
        assert!(parent.err().is_none());
    }

    #[test]
    fn test_derived_context_keeps_chain_and_collector() {
        let collector = Arc::new(DependencyCollector::default());
        let ctx = Context::background()
            .with_lock_chain(LockChain::default().push(7))
            .with_collector(collector.clone());
        let derived = ctx.with_timeout(Duration::from_secs(1));
        assert_eq!(derived.depth(), 1);
        assert!(derived.lock_chain().contains(7));
        assert!(Arc::ptr_eq(derived.collector().expect("collector"), &collector));
    }
}
