//! The service registry.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ContainerOptions;
use crate::context::Context;
use crate::dependency::DependencyNode;
use crate::entry::ServiceEntry;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::observer::{ContainerObserver, Observers};
use crate::registration::{box_any_builder, erase_builder, AnyArc, AnyBuilder, Built};

/// Registry of lazily built, named, typed services.
///
/// Services are registered with a builder and built on first lookup. Each
/// key is built at most once until the container is closed; concurrent
/// lookups of a key that is being built wait for that build. Builders may
/// look up other services through the container and context they receive,
/// which records the dependency tree and detects cycles.
///
/// `Container` is a cheap handle; clones share the same registry.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Built, Container, Context};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
///
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ferrous_registry::DiError> {
/// let container = Container::new();
/// container.set::<Database, _, _>("", |_ctx, _ctn| async {
///     Ok(Built::new(Database { url: "postgres://localhost".to_string() }))
/// })?;
/// container.set::<UserService, _, _>("", |ctx, ctn| async move {
///     let db = ctn.get::<Database>(&ctx, "").await?;
///     Ok(Built::new(UserService { db }))
/// })?;
///
/// let ctx = Context::background();
/// let users = container.get::<UserService>(&ctx, "").await?;
/// assert_eq!(users.db.url, "postgres://localhost");
///
/// let tree = container.get_dependency::<UserService>(&ctx, "").await?;
/// assert!(tree.children[0].is::<Database>());
///
/// container.close(&ctx).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

#[derive(Default)]
struct ContainerInner {
    entries: Mutex<HashMap<Key, Arc<ServiceEntry>>>,
    options: ContainerOptions,
    observers: Observers,
}

impl Container {
    /// Creates an empty container with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts configuring a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// The options this container was built with.
    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    // ----- Registration -----

    /// Registers the builder of the `T` named `name` (empty for the default instance).
    ///
    /// The builder runs on the first lookup and again after each
    /// [`close`](Self::close). It must forward the context it receives to
    /// every lookup it makes.
    ///
    /// # Errors
    ///
    /// [`DiError::AlreadySet`] if the key is already registered.
    pub fn set<T, F, Fut>(&self, name: impl Into<String>, builder: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Built<T>, BoxError>> + Send + 'static,
    {
        self.insert(Key::named::<T>(name), erase_builder(builder))
    }

    /// Registers a ready-made value of `T` named `name`.
    pub fn set_value<T>(&self, name: impl Into<String>, value: T) -> DiResult<()>
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        self.set::<T, _, _>(name, move |_ctx, _ctn| {
            let value = value.clone();
            async move { Ok(Built::from_arc(value)) }
        })
    }

    /// Registers an untyped builder under an explicit key.
    ///
    /// Nothing checks that the builder produces the key's type; a mismatch
    /// surfaces as [`DiError::TypeMismatch`] on typed lookups.
    pub fn set_any<F, Fut>(&self, key: Key, builder: F) -> DiResult<()>
    where
        F: Fn(Context, Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Built<dyn Any + Send + Sync>, BoxError>> + Send + 'static,
    {
        self.insert(key, box_any_builder(builder))
    }

    fn insert(&self, key: Key, builder: AnyBuilder) -> DiResult<()> {
        let mut entries = self.inner.entries.lock();
        if entries.contains_key(&key) {
            return Err(DiError::AlreadySet.with_key(key));
        }
        tracing::trace!(key = %key, "service registered");
        let entry = Arc::new(ServiceEntry::new(key.clone(), builder));
        entries.insert(key, entry);
        Ok(())
    }

    fn entry(&self, key: &Key) -> DiResult<Arc<ServiceEntry>> {
        self.inner
            .entries
            .lock()
            .get(key)
            .cloned()
            .ok_or(DiError::NotSet)
    }

    // ----- Resolution -----

    /// Returns the `T` named `name`, building it if needed.
    ///
    /// # Errors
    ///
    /// Every error is attributed to the key: [`DiError::NotSet`],
    /// [`DiError::TypeMismatch`], [`DiError::Cycle`], the context's
    /// cancellation, a recovered builder panic or the builder's own error.
    pub async fn get<T>(&self, ctx: &Context, name: &str) -> DiResult<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let key = Key::named::<T>(name);
        let instance = self.get_any(ctx, &key).await?;
        instance
            .downcast::<T>()
            .map_err(|_| {
                DiError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                }
                .with_key(key)
            })
    }

    /// Returns the type-erased instance registered under `key`.
    pub async fn get_any(&self, ctx: &Context, key: &Key) -> DiResult<AnyArc> {
        let result = match self.entry(key) {
            Ok(entry) => entry.get(ctx, self).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| err.with_key(key.clone()))
    }

    /// Returns every registered `T`, by name, building them if needed.
    ///
    /// Entries are visited in name order. The first failure fails the call.
    pub async fn get_all<T>(&self, ctx: &Context) -> DiResult<HashMap<String, Arc<T>>>
    where
        T: Send + Sync + 'static,
    {
        let mut keys: Vec<Key> = self
            .inner
            .entries
            .lock()
            .keys()
            .filter(|key| key.is::<T>())
            .cloned()
            .collect();
        keys.sort();

        let mut services = HashMap::with_capacity(keys.len());
        for key in keys {
            let service = self.get::<T>(ctx, key.name()).await?;
            services.insert(key.name().to_string(), service);
        }
        Ok(services)
    }

    /// Returns the dependency tree of the `T` named `name`, building it if needed.
    pub async fn get_dependency<T>(&self, ctx: &Context, name: &str) -> DiResult<Arc<DependencyNode>>
    where
        T: ?Sized + 'static,
    {
        self.get_dependency_by_key(ctx, &Key::named::<T>(name)).await
    }

    /// Returns the dependency tree of `key`, building it if needed.
    pub async fn get_dependency_by_key(
        &self,
        ctx: &Context,
        key: &Key,
    ) -> DiResult<Arc<DependencyNode>> {
        let result = match self.entry(key) {
            Ok(entry) => entry.get_dependency(ctx, self).await,
            Err(err) => Err(err),
        };
        result.map_err(|err| err.with_key(key.clone()))
    }

    // ----- Teardown -----

    /// Closes every built service and resets it so it can be built again.
    ///
    /// Entries are closed in ascending [`Key`] order. Every entry is
    /// attempted even if earlier ones fail; the failures are returned
    /// together as [`DiError::Multiple`], each attributed to its key.
    /// Services handed out before the call must not be used afterwards.
    pub async fn close(&self, ctx: &Context) -> DiResult<()> {
        let mut entries: Vec<Arc<ServiceEntry>> =
            self.inner.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        tracing::debug!(entries = entries.len(), "closing container");

        let mut errors = Vec::new();
        for entry in entries {
            if let Err(err) = entry.close(ctx, self).await {
                errors.push(err.with_key(entry.key().clone()));
            }
        }
        DiError::join(errors)
    }

    // ----- Introspection -----

    /// Returns true if `key` is registered.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.inner.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.len())
            .field("options", &self.inner.options)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

/// Builder for a configured [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    options: ContainerOptions,
    observers: Observers,
}

impl ContainerBuilder {
    /// Uses `options` instead of the defaults.
    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds an observer; observers are notified in the order they were added.
    pub fn observer(mut self, observer: Arc<dyn ContainerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Creates the container.
    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(ContainerInner {
                entries: Mutex::new(HashMap::new()),
                options: self.options,
                observers: self.observers,
            }),
        }
    }
}
