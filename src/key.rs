//! Service key types for the registry.

use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A key identifies one registry slot: the declared service type plus an
/// optional name. An empty name means "the default instance of this type",
/// so the same type can be registered several times under different names.
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::Key;
///
/// let default_port = Key::of::<u16>();
/// let admin_port = Key::named::<u16>("admin");
///
/// assert_eq!(default_port.to_string(), "u16");
/// assert_eq!(admin_port.to_string(), "u16(admin)");
/// assert_ne!(default_port, admin_port);
/// assert!(default_port.is_default());
/// ```
#[derive(Debug, Clone)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
}

impl Key {
    /// Key of the default (unnamed) instance of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named::<T>(String::new())
    }

    /// Key of the instance of `T` registered under `name`.
    ///
    /// An empty `name` is the same key as [`Key::of`].
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: name.into(),
        }
    }

    /// The `TypeId` of the declared service type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The declared service type name, as given by `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The service name; empty for the default instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this key addresses the default instance of its type.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns true if the declared type of this key is `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(self.type_name)
        } else {
            write!(f, "{}({})", self.type_name, self.name)
        }
    }
}

// The type name is for display only; identity is (TypeId, name).
impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

// Ordered by display form first so teardown order reads naturally in logs.
impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

/// Helper for creating the default key of a type.
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}
