//! Disposal trait for service teardown.

use crate::context::Context;
use crate::error::BoxError;

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g.,
/// flushing buffers, closing connections) and register them with
/// [`Built::disposable`](crate::Built::disposable). Disposal runs when the
/// container is closed.
///
/// # Examples
///
/// ```
/// use ferrous_registry::{AsyncDispose, BoxError, Built, Container, Context};
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self, _ctx: &Context) -> Result<(), BoxError> {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container
///     .set::<DatabaseClient, _, _>("", |_ctx, _ctn| async {
///         Ok(Built::disposable(Arc::new(DatabaseClient {
///             connection_id: "conn_123".to_string(),
///         })))
///     })
///     .unwrap();
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self, ctx: &Context) -> Result<(), BoxError>;
}
