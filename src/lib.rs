//! # ferrous-registry
//!
//! Lazy, concurrency-safe service registry for async Rust.
//!
//! ## Features
//!
//! - **Lazy singletons**: each named, typed service is built on first lookup and cached
//! - **Single build under contention**: concurrent lookups of one key wait for a single build
//! - **Cycle detection**: a build that needs itself fails fast with the full key path
//! - **Cancellation**: every wait honors the caller's [`Context`]
//! - **Dependency trees**: the services each build looked up are recorded
//! - **Ordered teardown**: [`Container::close`] runs every closer and aggregates failures
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_registry::{Built, Container, Context};
//! use std::sync::Arc;
//!
//! struct Config {
//!     dsn: String,
//! }
//!
//! struct Repository {
//!     config: Arc<Config>,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ferrous_registry::DiError> {
//! let container = Container::new();
//! container.set_value("", Config { dsn: "postgres://localhost".to_string() })?;
//! container.set::<Repository, _, _>("", |ctx, ctn| async move {
//!     let config = ctn.get::<Config>(&ctx, "").await?;
//!     Ok(Built::new(Repository { config }).with_closer(|_ctx| async {
//!         // flush, disconnect...
//!         Ok(())
//!     }))
//! })?;
//!
//! let ctx = Context::background();
//! let repo = container.get::<Repository>(&ctx, "").await?;
//! assert_eq!(repo.config.dsn, "postgres://localhost");
//!
//! container.close(&ctx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cycles
//!
//! Builders must pass the [`Context`] they receive to their own lookups. The
//! context carries the chain of entries being built on the current call
//! path, so a builder that (transitively) needs its own key gets
//! [`DiError::Cycle`] instead of deadlocking:
//!
//! ```rust
//! use ferrous_registry::{Built, Container, Context};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let container = Container::new();
//! container.set::<String, _, _>("a", |ctx, ctn| async move {
//!     let b = ctn.get::<String>(&ctx, "b").await?;
//!     Ok(Built::new(format!("a{b}")))
//! }).unwrap();
//! container.set::<String, _, _>("b", |ctx, ctn| async move {
//!     let a = ctn.get::<String>(&ctx, "a").await?;
//!     Ok(Built::new(format!("b{a}")))
//! }).unwrap();
//!
//! let err = container.get::<String>(&Context::background(), "a").await.unwrap_err();
//! assert!(err.is_cycle());
//! assert_eq!(
//!     err.to_string(),
//!     "alloc::string::String(a): alloc::string::String(b): alloc::string::String(a): cycle"
//! );
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `config`: JSON-deserializable [`ContainerOptions`]
//! - `graph-export`: serde support for [`DependencyNode`]

pub mod cancellation;
pub mod config;
pub mod container;
pub mod context;
pub mod dependency;
pub mod error;
pub mod key;
pub mod observer;
pub mod registration;
pub mod traits;

mod entry;
mod internal;

pub use cancellation::{CancelReason, CancellationToken};
pub use config::ContainerOptions;
pub use container::{Container, ContainerBuilder};
pub use context::Context;
pub use dependency::DependencyNode;
pub use error::{BoxError, DiError, DiResult, PanicError};
pub use key::{key_of_type, Key};
pub use observer::{ContainerObserver, TracingObserver};
pub use registration::{AnyBuilder, Built, Closer};
pub use traits::AsyncDispose;
