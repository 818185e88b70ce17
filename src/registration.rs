//! Service registration types.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::container::Container;
use crate::context::Context;
use crate::error::BoxError;
use crate::traits::AsyncDispose;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Teardown callback returned by a builder alongside its instance.
///
/// It runs at most once, when the container is closed, and receives the
/// context passed to [`Container::close`].
pub type Closer = Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Type-erased builder as stored by the container.
pub type AnyBuilder = Arc<
    dyn Fn(Context, Container) -> BoxFuture<'static, Result<Built<dyn Any + Send + Sync>, BoxError>>
        + Send
        + Sync,
>;

/// What a builder produces: the instance and an optional [`Closer`].
///
/// # Examples
///
/// ```
/// use ferrous_registry::Built;
///
/// struct Pool;
///
/// let built = Built::new(Pool).with_closer(|_ctx| async {
///     // drain connections...
///     Ok(())
/// });
/// assert!(built.has_closer());
/// ```
pub struct Built<T: ?Sized + Send + Sync + 'static> {
    pub(crate) instance: Arc<T>,
    pub(crate) closer: Option<Closer>,
}

impl<T: Send + Sync + 'static> Built<T> {
    /// Wraps a freshly built instance, without teardown.
    pub fn new(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    /// Type-erases the instance for storage.
    pub(crate) fn into_any(self) -> Built<dyn Any + Send + Sync> {
        Built {
            instance: self.instance as AnyArc,
            closer: self.closer,
        }
    }
}

impl<T: AsyncDispose> Built<T> {
    /// Wraps an instance whose [`AsyncDispose::dispose`] is its teardown.
    pub fn disposable(instance: Arc<T>) -> Self {
        let service = instance.clone();
        Self::from_arc(instance).with_closer(move |ctx| async move { service.dispose(&ctx).await })
    }
}

impl<T: ?Sized + Send + Sync + 'static> Built<T> {
    /// Wraps an already shared instance, without teardown.
    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance,
            closer: None,
        }
    }

    /// Attaches the teardown to run when the container is closed.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.closer = Some(Box::new(move |ctx| closer(ctx).boxed()));
        self
    }

    /// The built instance.
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    /// Returns true if a teardown is attached.
    pub fn has_closer(&self) -> bool {
        self.closer.is_some()
    }
}

/// Erases a typed builder closure.
pub(crate) fn erase_builder<T, F, Fut>(builder: F) -> AnyBuilder
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Built<T>, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx, ctn| builder(ctx, ctn).map(|built| built.map(Built::into_any)).boxed())
}

/// Boxes an untyped builder closure.
pub(crate) fn box_any_builder<F, Fut>(builder: F) -> AnyBuilder
where
    F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Built<dyn Any + Send + Sync>, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx, ctn| builder(ctx, ctn).boxed())
}
