//! # Type Registry
//!
//! The catalog of property (component) types: name, byte size, default
//! value and flags, addressed by an immutable [`PropertyId`].
//!
//! Ids are handed out in registration order and never reused. A duplicate
//! name is a programmer error: [`TypeRegistry::register`] panics, while
//! [`TypeRegistry::try_register`] reports it as a [`RegistryError`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard};

use super::signature::MAX_PROPERTIES;
use crate::error::{RegistryError, RegistryResult};

/// Alignment of every column allocation. Property types must not need more.
pub const COLUMN_ALIGN: usize = 16;

/// Handle to a registered property type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Null/invalid property id.
    pub const INVALID: Self = Self(u16::MAX);

    /// Creates an id from a raw registry index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }

    /// Returns the registry index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this id is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u16::MAX
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Flags attached to a property at registration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        /// Tag-only property: presence carries the information, no column.
        const FLAG = 1 << 0;
        /// The property's value owns resources outside its bytes.
        ///
        /// Removing such a property drops the bytes without running any
        /// cleanup; the owner must release the resources first.
        const MANAGED = 1 << 1;
    }
}

/// Everything the store knows about a property type.
#[derive(Clone, Debug)]
pub struct PropertyDescription {
    id: PropertyId,
    name: Box<str>,
    byte_size: usize,
    default_value: Arc<[u8]>,
    flags: PropertyFlags,
}

impl PropertyDescription {
    /// The property's id.
    #[must_use]
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of one value in bytes. Zero for flag properties.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// The registry's private copy of the default value.
    #[must_use]
    pub fn default_value(&self) -> &[u8] {
        &self.default_value
    }

    /// Shared handle to the default value, for columns to keep.
    #[must_use]
    pub fn default_value_shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.default_value)
    }

    /// Registration flags.
    #[must_use]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// True if the property is stored without a column.
    #[must_use]
    pub fn is_flag(&self) -> bool {
        self.flags.contains(PropertyFlags::FLAG) || self.byte_size == 0
    }
}

/// A plain-old-data type that can be registered as a property.
///
/// # Example
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use strata_core::{Property, TypeRegistry};
///
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Property for Health {
///     const NAME: &'static str = "Health";
/// }
///
/// let mut registry = TypeRegistry::new();
/// let id = registry.register_type::<Health>();
/// assert_eq!(registry.size(id), 8);
/// ```
pub trait Property: Pod + Default + Send + Sync + 'static {
    /// Registry name of the property.
    const NAME: &'static str;

    /// Registration flags.
    const FLAGS: PropertyFlags = PropertyFlags::empty();
}

/// The property catalog.
pub struct TypeRegistry {
    /// Descriptions in registration order; index == id.
    descriptions: Vec<Arc<PropertyDescription>>,
    /// Name lookup.
    by_name: HashMap<Box<str>, PropertyId>,
    /// Maximum number of registrations.
    limit: usize,
}

impl TypeRegistry {
    /// Creates an empty registry using the full signature width.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_PROPERTIES)
    }

    /// Creates an empty registry accepting at most `limit` properties.
    ///
    /// # Panics
    ///
    /// Panics if `limit` exceeds [`MAX_PROPERTIES`].
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        assert!(
            limit <= MAX_PROPERTIES,
            "Registry limit {limit} exceeds the signature width {MAX_PROPERTIES}"
        );
        Self {
            descriptions: Vec::new(),
            by_name: HashMap::new(),
            limit,
        }
    }

    /// Registers a property type.
    ///
    /// `default_value` of `None` means all-zero bytes. The bytes are copied;
    /// the caller's buffer may be dropped afterwards.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub fn try_register(
        &mut self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> RegistryResult<PropertyId> {
        if let Some(&existing) = self.by_name.get(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_owned(),
                existing,
            });
        }
        if self.descriptions.len() >= self.limit {
            return Err(RegistryError::TooManyProperties { limit: self.limit });
        }
        if flags.contains(PropertyFlags::FLAG) && byte_size != 0 {
            return Err(RegistryError::FlagWithStorage {
                name: name.to_owned(),
                size: byte_size,
            });
        }

        let default_value: Arc<[u8]> = match default_value {
            Some(bytes) if bytes.len() != byte_size => {
                return Err(RegistryError::DefaultSizeMismatch {
                    name: name.to_owned(),
                    expected: byte_size,
                    actual: bytes.len(),
                });
            }
            Some(bytes) => Arc::from(bytes),
            None => Arc::from(vec![0u8; byte_size]),
        };

        let id = PropertyId::from_index(self.descriptions.len());
        self.descriptions.push(Arc::new(PropertyDescription {
            id,
            name: name.into(),
            byte_size,
            default_value,
            flags,
        }));
        self.by_name.insert(name.into(), id);

        tracing::debug!(property = %id, name, byte_size, "registered property");
        Ok(id)
    }

    /// Registers a property type.
    ///
    /// # Panics
    ///
    /// Panics on any [`RegistryError`], most notably a duplicate name.
    pub fn register(
        &mut self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> PropertyId {
        self.try_register(name, byte_size, default_value, flags)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Registers a [`Property`] type using its `Default` as default value.
    ///
    /// Zero-sized types are registered as flags.
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name or if the type needs more than
    /// [`COLUMN_ALIGN`] alignment.
    pub fn register_type<P: Property>(&mut self) -> PropertyId {
        assert!(
            std::mem::align_of::<P>() <= COLUMN_ALIGN,
            "Property '{}' needs {}-byte alignment, columns provide {COLUMN_ALIGN}",
            P::NAME,
            std::mem::align_of::<P>()
        );
        let size = std::mem::size_of::<P>();
        if size == 0 {
            return self.register(P::NAME, 0, None, P::FLAGS | PropertyFlags::FLAG);
        }
        let default = P::default();
        self.register(P::NAME, size, Some(bytemuck::bytes_of(&default)), P::FLAGS)
    }

    /// Looks up a property id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    /// Checks whether `id` was handed out by this registry.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: PropertyId) -> bool {
        id.index() < self.descriptions.len()
    }

    /// Describes a registered property.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    #[must_use]
    pub fn describe(&self, id: PropertyId) -> &Arc<PropertyDescription> {
        self.descriptions.get(id.index()).unwrap_or_else(|| {
            panic!("Property id {id} was never registered")
        })
    }

    /// Byte size of a registered property.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    #[must_use]
    pub fn size(&self, id: PropertyId) -> usize {
        self.describe(id).byte_size()
    }

    /// Flags of a registered property.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    #[must_use]
    pub fn flags(&self, id: PropertyId) -> PropertyFlags {
        self.describe(id).flags()
    }

    /// Default value of a registered property.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    #[must_use]
    pub fn default_value(&self, id: PropertyId) -> &[u8] {
        self.describe(id).default_value()
    }

    /// All descriptions, in registration order.
    pub fn descriptions(&self) -> impl Iterator<Item = &PropertyDescription> {
        self.descriptions.iter().map(|d| &**d)
    }

    /// Number of registered properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Checks if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a [`TypeRegistry`].
///
/// Worlds that share an id space share one registry. Registration takes the
/// write lock; everything else reads.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<TypeRegistry>>,
}

impl Registry {
    /// Creates a handle to a fresh registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing registry.
    #[must_use]
    pub fn from_registry(registry: TypeRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Read access to the underlying registry.
    pub fn read(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.inner.read()
    }

    /// See [`TypeRegistry::try_register`].
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub fn try_register(
        &self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> RegistryResult<PropertyId> {
        self.inner
            .write()
            .try_register(name, byte_size, default_value, flags)
    }

    /// See [`TypeRegistry::register`].
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name.
    pub fn register(
        &self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> PropertyId {
        self.inner
            .write()
            .register(name, byte_size, default_value, flags)
    }

    /// See [`TypeRegistry::register_type`].
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name.
    pub fn register_type<P: Property>(&self) -> PropertyId {
        self.inner.write().register_type::<P>()
    }

    /// Returns the id registered under `name`, registering it first if absent.
    ///
    /// Lookup and registration happen under one write lock.
    pub fn lookup_or_register(
        &self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> PropertyId {
        let mut registry = self.inner.write();
        match registry.lookup(name) {
            Some(id) => id,
            None => registry.register(name, byte_size, default_value, flags),
        }
    }

    /// See [`TypeRegistry::lookup`].
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<PropertyId> {
        self.inner.read().lookup(name)
    }

    /// Returns a shared copy of a property's description.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never registered.
    #[must_use]
    pub fn describe(&self, id: PropertyId) -> Arc<PropertyDescription> {
        Arc::clone(self.inner.read().describe(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Speed {
        value: f32,
    }

    impl Default for Speed {
        fn default() -> Self {
            Self { value: 2.5 }
        }
    }

    impl Property for Speed {
        const NAME: &'static str = "Speed";
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut registry = TypeRegistry::new();
        let a = registry.register("A", 4, None, PropertyFlags::empty());
        let b = registry.register("B", 8, None, PropertyFlags::empty());
        assert_ne!(a, b);
        assert_eq!(registry.lookup("A"), Some(a));
        assert_eq!(registry.lookup("B"), Some(b));
        assert_eq!(registry.lookup("C"), None);
    }

    #[test]
    fn test_register_copies_default() {
        let mut registry = TypeRegistry::new();
        let mut default = vec![1u8, 2, 3];
        let id = registry.register("Bytes", 3, Some(&default), PropertyFlags::empty());
        default[0] = 99;
        assert_eq!(registry.default_value(id), &[1, 2, 3]);
    }

    #[test]
    fn test_missing_default_is_zeroed() {
        let mut registry = TypeRegistry::new();
        let id = registry.register("Zeroed", 6, None, PropertyFlags::MANAGED);
        assert_eq!(registry.default_value(id), &[0; 6]);
        assert_eq!(registry.flags(id), PropertyFlags::MANAGED);
    }

    #[test]
    #[should_panic(expected = "cannot register two properties named 'A'")]
    fn test_duplicate_registration_panics() {
        let mut registry = TypeRegistry::new();
        registry.register("A", 4, None, PropertyFlags::empty());
        registry.register("A", 4, None, PropertyFlags::empty());
    }

    #[test]
    fn test_try_register_reports_errors() {
        let mut registry = TypeRegistry::with_limit(1);
        let a = registry.try_register("A", 4, None, PropertyFlags::empty()).unwrap();

        assert_eq!(
            registry.try_register("A", 4, None, PropertyFlags::empty()),
            Err(RegistryError::DuplicateName {
                name: "A".into(),
                existing: a
            })
        );
        assert_eq!(
            registry.try_register("B", 4, None, PropertyFlags::empty()),
            Err(RegistryError::TooManyProperties { limit: 1 })
        );
    }

    #[test]
    fn test_default_size_mismatch() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .try_register("Bad", 4, Some(&[0u8; 2]), PropertyFlags::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DefaultSizeMismatch {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_flag_properties() {
        let mut registry = TypeRegistry::new();
        let tag = registry.register("Tag", 0, None, PropertyFlags::FLAG);
        assert!(registry.describe(tag).is_flag());
        assert!(registry
            .try_register("BadTag", 4, None, PropertyFlags::FLAG)
            .is_err());
    }

    #[test]
    fn test_register_type_uses_default() {
        let mut registry = TypeRegistry::new();
        let id = registry.register_type::<Speed>();
        assert_eq!(registry.size(id), 4);
        assert_eq!(registry.default_value(id), bytemuck::bytes_of(&Speed::default()));
        assert_eq!(registry.describe(id).name(), "Speed");
    }

    #[test]
    fn test_descriptions_in_registration_order() {
        let mut registry = TypeRegistry::new();
        registry.register("Z", 1, None, PropertyFlags::empty());
        registry.register("A", 1, None, PropertyFlags::empty());
        registry.register("M", 1, None, PropertyFlags::empty());
        let names: Vec<_> = registry.descriptions().map(PropertyDescription::name).collect();
        assert_eq!(names, vec!["Z", "A", "M"]);
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn test_describe_unknown_panics() {
        let registry = TypeRegistry::new();
        let _ = registry.describe(PropertyId::from_index(3));
    }

    #[test]
    fn test_shared_lookup_or_register() {
        let registry = Registry::new();
        let a = registry.lookup_or_register("Owner", 4, None, PropertyFlags::empty());
        let b = registry.lookup_or_register("Owner", 4, None, PropertyFlags::empty());
        assert_eq!(a, b);
        assert_eq!(registry.read().len(), 1);
    }
}
