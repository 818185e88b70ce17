//! Per-key lazy build state.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::container::Container;
use crate::context::Context;
use crate::dependency::{DependencyCollector, DependencyNode};
use crate::error::{DiError, DiResult, PanicError};
use crate::internal::ReentrantLock;
use crate::key::Key;
use crate::registration::{AnyArc, AnyBuilder, Built, Closer};

/// Build state of one entry, only reachable through the entry lock.
///
/// An entry is "building" while its lock is held in the `Uninitialized` state.
#[derive(Default)]
enum EntryState {
    #[default]
    Uninitialized,
    Initialized {
        instance: AnyArc,
        closer: Option<Closer>,
        dependency: Arc<DependencyNode>,
    },
}

/// Lazy singleton slot for one key.
pub(crate) struct ServiceEntry {
    key: Key,
    builder: AnyBuilder,
    state: ReentrantLock<EntryState>,
}

impl ServiceEntry {
    pub(crate) fn new(key: Key, builder: AnyBuilder) -> Self {
        Self {
            key,
            builder,
            state: ReentrantLock::new(EntryState::Uninitialized),
        }
    }

    pub(crate) fn key(&self) -> &Key {
        &self.key
    }

    /// Returns the instance, building it first if needed, and reports this
    /// entry to the build that asked for it.
    pub(crate) async fn get(&self, ctx: &Context, ctn: &Container) -> DiResult<AnyArc> {
        let (mut state, locked_ctx) = self.state.lock(ctx, ctn.options().lock_timeout).await?;
        let (instance, dependency) = self.ensure_initialized(&mut state, &locked_ctx, ctn).await?;
        if let Some(collector) = ctx.collector() {
            collector.add(dependency);
        }
        Ok(instance)
    }

    /// Returns the dependency tree, building the entry first if needed.
    pub(crate) async fn get_dependency(
        &self,
        ctx: &Context,
        ctn: &Container,
    ) -> DiResult<Arc<DependencyNode>> {
        let (mut state, locked_ctx) = self.state.lock(ctx, ctn.options().lock_timeout).await?;
        let (_, dependency) = self.ensure_initialized(&mut state, &locked_ctx, ctn).await?;
        Ok(dependency)
    }

    async fn ensure_initialized(
        &self,
        state: &mut EntryState,
        ctx: &Context,
        ctn: &Container,
    ) -> DiResult<(AnyArc, Arc<DependencyNode>)> {
        if let EntryState::Initialized {
            instance,
            dependency,
            ..
        } = state
        {
            tracing::trace!(key = %self.key, "service cache hit");
            return Ok((instance.clone(), dependency.clone()));
        }

        let collector = Arc::new(DependencyCollector::default());
        let build_ctx = ctx.with_collector(collector.clone());
        let observers = ctn.observers();
        observers.building(&self.key);
        let started = Instant::now();

        let built = match self.invoke_builder(build_ctx, ctn.clone()).await {
            Ok(built) => built,
            Err(err) => {
                observers.build_failed(&self.key, &err);
                return Err(err);
            }
        };

        let dependency = Arc::new(DependencyNode::new(&self.key, collector.take()));
        let instance = built.instance;
        *state = EntryState::Initialized {
            instance: instance.clone(),
            closer: built.closer,
            dependency: dependency.clone(),
        };
        observers.built(&self.key, started.elapsed());
        Ok((instance, dependency))
    }

    // The single boundary where user code runs during a build.
    async fn invoke_builder(
        &self,
        ctx: Context,
        ctn: Container,
    ) -> DiResult<Built<dyn Any + Send + Sync>> {
        let builder = self.builder.clone();
        let result = AssertUnwindSafe(async move { builder(ctx, ctn).await })
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(built)) => Ok(built),
            Ok(Err(err)) => Err(DiError::builder(err)),
            Err(payload) => {
                let panic = PanicError::from_payload(payload);
                tracing::warn!(key = %self.key, panic = %panic.message(), "builder panicked");
                Err(panic.into())
            }
        }
    }

    /// Runs the closer of a built entry and resets it so it can be rebuilt.
    ///
    /// Closing an entry that was never built is a no-op.
    pub(crate) async fn close(&self, ctx: &Context, ctn: &Container) -> DiResult<()> {
        let (mut state, locked_ctx) = self.state.lock(ctx, ctn.options().lock_timeout).await?;
        let closer = match std::mem::take(&mut *state) {
            EntryState::Uninitialized => return Ok(()),
            EntryState::Initialized { closer, .. } => closer,
        };

        let result = match closer {
            Some(closer) => {
                let outcome = AssertUnwindSafe(async move { closer(locked_ctx).await })
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(DiError::close(err)),
                    Err(payload) => Err(PanicError::from_payload(payload).into()),
                }
            }
            None => Ok(()),
        };
        drop(state);

        ctn.observers().closed(&self.key, result.as_ref().err());
        result
    }
}
