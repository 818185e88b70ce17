//! Cancelable, cycle-aware entry lock.
//!
//! Cycle detection does not use thread-local state: builds are futures and
//! may be resumed on any worker. Instead each [`Context`] carries an
//! immutable [`LockChain`] of the locks held on its logical call path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cancellation::CancelReason;
use crate::context::Context;
use crate::error::{DiError, DiResult};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Persistent list of the lock ids held on one call path.
///
/// `push` shares the existing links, so sibling branches started from the
/// same point never observe each other's locks.
#[derive(Clone, Default)]
pub(crate) struct LockChain {
    head: Option<Arc<Link>>,
    len: usize,
}

struct Link {
    id: u64,
    previous: Option<Arc<Link>>,
}

impl LockChain {
    pub(crate) fn push(&self, id: u64) -> LockChain {
        LockChain {
            head: Some(Arc::new(Link {
                id,
                previous: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        let mut link = self.head.as_deref();
        while let Some(current) = link {
            if current.id == id {
                return true;
            }
            link = current.previous.as_deref();
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// A binary lock owning `T`, acquired through a [`Context`].
pub(crate) struct ReentrantLock<T> {
    id: u64,
    mutex: Arc<Mutex<T>>,
}

impl<T: Send + 'static> ReentrantLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            mutex: Arc::new(Mutex::new(value)),
        }
    }

    /// Acquires the lock for the call path of `ctx`.
    ///
    /// Fails with [`DiError::Cycle`] without waiting if this lock is already
    /// held on the path. Otherwise waits until the lock is free or the
    /// context (or `wait_timeout`, which bounds only this wait) is done, in
    /// which case the cancellation error is returned as is.
    ///
    /// The returned context extends the chain with this lock and must be
    /// used for every call made while the guard is held. Dropping the guard
    /// releases the lock.
    pub(crate) async fn lock(
        &self,
        ctx: &Context,
        wait_timeout: Option<Duration>,
    ) -> DiResult<(OwnedMutexGuard<T>, Context)> {
        if ctx.lock_chain().contains(self.id) {
            return Err(DiError::Cycle);
        }

        let token = match wait_timeout {
            Some(timeout) => ctx.token().with_timeout(timeout),
            None => ctx.token().clone(),
        };

        // Biased towards the lock: a free lock is taken even by a done context.
        let guard = tokio::select! {
            biased;
            guard = self.mutex.clone().lock_owned() => guard,
            _ = token.cancelled() => {
                let reason = token.reason().unwrap_or(CancelReason::Canceled);
                tracing::trace!(lock = self.id, ?reason, "entry lock wait abandoned");
                return Err(reason.into());
            }
        };

        let ctx = ctx.with_lock_chain(ctx.lock_chain().push(self.id));
        Ok((guard, ctx))
    }
}
