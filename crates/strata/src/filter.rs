//! # Filters
//!
//! A filter is a compiled property query: the properties a system needs
//! (with read/write intent), and the properties a table must not have.
//! Build one from a [`FilterDesc`] once and reuse it every frame.
//!
//! Access modes are not enforced here. They are metadata for a scheduler,
//! which can use [`World::filters_conflict`] to decide what may run in
//! parallel.

use strata_core::{PoolHandle, PropertyId, TableSignature};

use crate::world::World;

/// Maximum number of inclusive properties in one filter.
pub const MAX_FILTER_PROPERTIES: usize = 16;

/// Declared intent on one filter property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read-only access.
    Read,
    /// Read-write access.
    Write,
}

impl AccessMode {
    /// Two accesses to the same data conflict unless both only read.
    #[inline]
    #[must_use]
    pub fn conflicts_with(self, other: Self) -> bool {
        self == Self::Write || other == Self::Write
    }
}

/// Builder for a filter.
///
/// ```rust
/// use strata::{AccessMode, FilterDesc, PropertyFlags, World};
///
/// let mut world = World::default();
/// let pos = world.register_property("Position", 12, None, PropertyFlags::empty());
/// let vel = world.register_property("Velocity", 12, None, PropertyFlags::empty());
/// let frozen = world.register_property("Frozen", 0, None, PropertyFlags::FLAG);
///
/// let filter = world.create_filter(&FilterDesc::new().write(pos).read(vel).without(frozen));
/// assert_eq!(world.filter_properties(filter), &[pos, vel]);
/// assert_eq!(world.access_modes(filter), &[AccessMode::Write, AccessMode::Read]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterDesc {
    inclusive: Vec<PropertyId>,
    access: Vec<AccessMode>,
    exclusive: Vec<PropertyId>,
}

impl FilterDesc {
    /// An empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a description from parallel lists.
    ///
    /// # Panics
    ///
    /// Panics if `inclusive` and `access` differ in length.
    #[must_use]
    pub fn from_parts(
        inclusive: &[PropertyId],
        exclusive: &[PropertyId],
        access: &[AccessMode],
    ) -> Self {
        assert_eq!(
            inclusive.len(),
            access.len(),
            "Every inclusive property needs an access mode"
        );
        Self {
            inclusive: inclusive.to_vec(),
            access: access.to_vec(),
            exclusive: exclusive.to_vec(),
        }
    }

    /// Requires `property` with the given access.
    #[must_use]
    pub fn with(mut self, property: PropertyId, mode: AccessMode) -> Self {
        self.inclusive.push(property);
        self.access.push(mode);
        self
    }

    /// Requires `property`, read-only.
    #[must_use]
    pub fn read(self, property: PropertyId) -> Self {
        self.with(property, AccessMode::Read)
    }

    /// Requires `property`, read-write.
    #[must_use]
    pub fn write(self, property: PropertyId) -> Self {
        self.with(property, AccessMode::Write)
    }

    /// Rejects tables that have `property`.
    #[must_use]
    pub fn without(mut self, property: PropertyId) -> Self {
        self.exclusive.push(property);
        self
    }

    /// Inclusive properties in declaration order.
    #[must_use]
    pub fn inclusive(&self) -> &[PropertyId] {
        &self.inclusive
    }

    /// Exclusive properties.
    #[must_use]
    pub fn exclusive(&self) -> &[PropertyId] {
        &self.exclusive
    }
}

/// Handle to a compiled filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Filter(PoolHandle);

pub(crate) struct FilterData {
    pub(crate) inclusive: TableSignature,
    pub(crate) exclusive: TableSignature,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) access: Vec<AccessMode>,
}

impl World {
    /// Compiles a filter.
    ///
    /// # Panics
    ///
    /// Panics if the description has no inclusive property, more than
    /// [`MAX_FILTER_PROPERTIES`], an unregistered or repeated property, or a
    /// property that is both required and rejected. Write access to the
    /// owner column also panics.
    pub fn create_filter(&mut self, desc: &FilterDesc) -> Filter {
        assert!(
            !desc.inclusive.is_empty(),
            "A filter needs at least one inclusive property"
        );
        assert!(
            desc.inclusive.len() <= MAX_FILTER_PROPERTIES,
            "A filter takes at most {MAX_FILTER_PROPERTIES} inclusive properties, got {}",
            desc.inclusive.len()
        );
        {
            let registry = self.registry.read();
            for &property in desc.inclusive.iter().chain(&desc.exclusive) {
                assert!(
                    registry.contains(property),
                    "Property id {property} was never registered"
                );
            }
        }

        let inclusive = TableSignature::from_properties(&desc.inclusive);
        let exclusive = TableSignature::from_properties(&desc.exclusive);
        assert_eq!(
            inclusive.count(),
            desc.inclusive.len(),
            "A filter property is listed twice"
        );
        assert!(
            inclusive.is_disjoint(&exclusive),
            "A filter property is both required and rejected"
        );
        for (&property, &mode) in desc.inclusive.iter().zip(&desc.access) {
            if mode == AccessMode::Write {
                self.assert_not_owner(property);
            }
        }

        let handle = self.filters.allocate(FilterData {
            inclusive,
            exclusive,
            properties: desc.inclusive.clone(),
            access: desc.access.clone(),
        });
        tracing::debug!(
            inclusive = desc.inclusive.len(),
            exclusive = desc.exclusive.len(),
            "created filter"
        );
        Filter(handle)
    }

    /// Destroys a filter. Stale handles are ignored.
    pub fn destroy_filter(&mut self, filter: Filter) {
        self.filters.free(filter.0);
    }

    pub(crate) fn filter_data(&self, filter: Filter) -> &FilterData {
        self.filters
            .get(filter.0)
            .unwrap_or_else(|| panic!("Filter {:?} is not live", filter.0))
    }

    /// Signature every matching table must contain.
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn inclusive_mask(&self, filter: Filter) -> TableSignature {
        self.filter_data(filter).inclusive
    }

    /// Signature no matching table may intersect.
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn exclusive_mask(&self, filter: Filter) -> TableSignature {
        self.filter_data(filter).exclusive
    }

    /// Inclusive properties in declaration order. Dataset buffers follow
    /// this order.
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn filter_properties(&self, filter: Filter) -> &[PropertyId] {
        &self.filter_data(filter).properties
    }

    /// Access modes, parallel to [`World::filter_properties`].
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn access_modes(&self, filter: Filter) -> &[AccessMode] {
        &self.filter_data(filter).access
    }

    /// Checks whether two systems using these filters could touch the same
    /// column with at least one of them writing.
    ///
    /// Filters that can never match the same table do not conflict.
    ///
    /// # Panics
    ///
    /// Panics if either filter was destroyed.
    #[must_use]
    pub fn filters_conflict(&self, a: Filter, b: Filter) -> bool {
        let (a, b) = (self.filter_data(a), self.filter_data(b));
        if !a.inclusive.is_disjoint(&b.exclusive) || !b.inclusive.is_disjoint(&a.exclusive) {
            return false;
        }
        a.properties.iter().zip(&a.access).any(|(property, &mode)| {
            b.properties
                .iter()
                .zip(&b.access)
                .any(|(other, &other_mode)| property == other && mode.conflicts_with(other_mode))
        })
    }
}
