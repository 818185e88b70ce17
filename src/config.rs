//! Container configuration.
//!
//! The only tunable today is how long an operation may wait for another
//! caller's build of the same entry. Options can be set in code, read from
//! the environment, or (with the `config` feature) deserialized.

use std::env;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Environment variable read by [`ContainerOptions::from_env`].
pub const LOCK_TIMEOUT_ENV: &str = "FERROUS_REGISTRY_LOCK_TIMEOUT_MS";

/// Options for a [`Container`](crate::Container).
///
/// # Examples
///
/// ```
/// use ferrous_registry::{Container, ContainerOptions};
/// use std::time::Duration;
///
/// let options = ContainerOptions::new().lock_timeout(Duration::from_secs(2));
/// let container = Container::builder().options(options).build();
/// assert_eq!(container.options().lock_timeout, Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Upper bound for waiting on an entry lock held by another caller.
    ///
    /// Applies to `get`, `get_dependency` and `close`; an elapsed wait fails
    /// with [`DiError::DeadlineExceeded`]. Builders themselves are not bounded.
    #[cfg_attr(feature = "config", serde(rename = "lock_timeout_ms", with = "millis"))]
    pub lock_timeout: Option<Duration>,
}

impl ContainerOptions {
    /// Default options: waits are bounded only by the caller's context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry lock wait bound.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Reads options from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DiResult<Self> {
        let mut options = Self::default();
        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                DiError::InvalidConfig(format!(
                    "{LOCK_TIMEOUT_ENV} must be a number of milliseconds, got {raw:?}"
                ))
            })?;
            options.lock_timeout = Some(Duration::from_millis(millis));
        }
        Ok(options)
    }

    /// Parses options from JSON, e.g. `{"lock_timeout_ms": 500}`.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|err| DiError::InvalidConfig(err.to_string()))
    }
}

#[cfg(feature = "config")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
