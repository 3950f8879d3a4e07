//! # World
//!
//! One independent entity store: identity pool, table store, entity
//! mapping, filters, op buffers and the per-frame arenas.
//!
//! Every table the world creates carries a built-in `Owner` column holding
//! the [`EntityId`] of each row. After a swap-remove the world reads the
//! owner of the moved row to fix its mapping.
//!
//! # Example
//!
//! ```rust
//! use strata::{PropertyFlags, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default());
//! let full = 100u32.to_le_bytes();
//! let health = world.register_property("Health", 4, Some(&full), PropertyFlags::empty());
//!
//! let entity = world.create_entity();
//! world.instantiate(entity, &[health]);
//!
//! assert_eq!(world.get_property::<u32>(entity, health), Some(100));
//! ```

use parking_lot::Mutex;
use strata_core::{
    Arena, Database, PoolAllocator, Property, PropertyFlags, PropertyId, Registry, TableId,
    TableSignature,
};

use crate::config::WorldConfig;
use crate::dataset::TableView;
use crate::entity::EntityId;
use crate::filter::FilterData;
use crate::identity::IdentityPool;
use crate::ops::OpQueues;

/// Registry name of the built-in owner column.
pub const OWNER_PROPERTY: &str = "Owner";

/// Where an instantiated entity's row lives.
///
/// Only valid until the next structural change to that table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityMapping {
    /// Table holding the row.
    pub table: TableId,
    /// Row index inside the table.
    pub row: usize,
}

/// An independent entity store.
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) registry: Registry,
    pub(crate) db: Database,
    pool: IdentityPool,
    /// Indexed by entity index. `None` until instantiated.
    pub(crate) entity_map: Vec<Option<EntityMapping>>,
    pub(crate) owner: PropertyId,
    pub(crate) filters: PoolAllocator<FilterData>,
    pub(crate) op_buffers: Mutex<PoolAllocator<OpQueues>>,
    /// Op payload bytes, reset by [`World::release_scratch`].
    pub(crate) scratch: Mutex<Arena<u8>>,
    /// Dataset views, reset by [`World::release_datasets`]. Stored unbound;
    /// `query` rebinds them to the `&self` borrow it hands out.
    pub(crate) views: Mutex<Arena<TableView<'static>>>,
}

impl World {
    /// Creates a world with its own registry.
    ///
    /// # Panics
    ///
    /// Panics if `config` does not validate.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self::with_registry(config, Registry::new())
    }

    /// Creates a world over a shared registry.
    ///
    /// Worlds that share a registry share property ids; give each one its own
    /// partition to keep their entity ids apart.
    ///
    /// # Panics
    ///
    /// Panics if `config` does not validate, or if `Owner` is already
    /// registered with a size other than an entity id.
    #[must_use]
    pub fn with_registry(config: WorldConfig, registry: Registry) -> Self {
        if let Err(e) = config.validate() {
            panic!("{e}");
        }

        let owner = registry.lookup_or_register(
            OWNER_PROPERTY,
            std::mem::size_of::<EntityId>(),
            Some(bytemuck::bytes_of(&EntityId::INVALID)),
            PropertyFlags::empty(),
        );
        assert_eq!(
            registry.describe(owner).byte_size(),
            std::mem::size_of::<EntityId>(),
            "'{OWNER_PROPERTY}' is registered with the wrong size"
        );

        let mut pool = IdentityPool::new(config.partition, config.min_free_before_reuse);
        pool.reserve(config.initial_entity_capacity);

        tracing::info!(
            partition = config.partition,
            initial_entities = config.initial_entity_capacity,
            min_free_before_reuse = config.min_free_before_reuse,
            "created world"
        );

        Self {
            db: Database::with_table_rows(registry.clone(), config.initial_table_rows),
            entity_map: Vec::with_capacity(config.initial_entity_capacity),
            scratch: Mutex::new(Arena::new(config.scratch_chunk_bytes)),
            views: Mutex::new(Arena::new(config.view_chunk_len)),
            filters: PoolAllocator::new(),
            op_buffers: Mutex::new(PoolAllocator::new()),
            registry,
            pool,
            owner,
            config,
        }
    }

    /// The configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The registry handle.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The table store, for direct inspection.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Id of the built-in owner column.
    #[must_use]
    pub fn owner_property(&self) -> PropertyId {
        self.owner
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Creates an entity. It has no row until instantiated.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.pool.allocate();
        let index = entity.index() as usize;
        if index >= self.entity_map.len() {
            self.entity_map.resize(index + 1, None);
        }
        self.entity_map[index] = None;
        entity
    }

    /// Deletes an entity, removing its row if it has one.
    ///
    /// Properties flagged [`PropertyFlags::MANAGED`] get no cleanup; release
    /// their resources before deleting.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn delete_entity(&mut self, entity: EntityId) {
        self.assert_valid(entity);
        let index = entity.index() as usize;
        if let Some(mapping) = self.entity_map[index].take() {
            self.remove_row_and_fix(mapping.table, mapping.row);
        }
        self.pool.deallocate(entity);
    }

    /// Checks whether `entity` is live in this world.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, entity: EntityId) -> bool {
        self.pool.is_valid(entity)
    }

    /// Checks whether `entity` has a row.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn is_instantiated(&self, entity: EntityId) -> bool {
        self.try_entity_mapping(entity).is_some()
    }

    /// Row location of an instantiated entity.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or not instantiated.
    #[must_use]
    pub fn entity_mapping(&self, entity: EntityId) -> EntityMapping {
        self.try_entity_mapping(entity)
            .unwrap_or_else(|| panic!("Entity {entity} is not instantiated"))
    }

    /// Row location, or `None` if the entity is not instantiated.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn try_entity_mapping(&self, entity: EntityId) -> Option<EntityMapping> {
        self.assert_valid(entity);
        self.entity_map[entity.index() as usize]
    }

    /// Number of live entities, instantiated or not.
    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub(crate) fn assert_valid(&self, entity: EntityId) {
        assert!(self.is_valid(entity), "Invalid entity {entity}");
    }

    /// The owner column is the only record of which entity holds a row, so
    /// only the world writes it.
    #[inline]
    pub(crate) fn assert_not_owner(&self, property: PropertyId) {
        assert_ne!(property, self.owner, "The owner column is written only by the world");
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Registers a property type. See [`strata_core::TypeRegistry::register`].
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register_property(
        &self,
        name: &str,
        byte_size: usize,
        default_value: Option<&[u8]>,
        flags: PropertyFlags,
    ) -> PropertyId {
        self.registry.register(name, byte_size, default_value, flags)
    }

    /// Registers a [`Property`] type.
    ///
    /// # Panics
    ///
    /// Panics if its name is already registered.
    pub fn register_type<P: Property>(&self) -> PropertyId {
        self.registry.register_type::<P>()
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property_id(&self, name: &str) -> Option<PropertyId> {
        self.registry.lookup(name)
    }

    // =========================================================================
    // Property access
    // =========================================================================

    /// Checks whether an entity currently has `property`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn has_property(&self, entity: EntityId, property: PropertyId) -> bool {
        self.try_entity_mapping(entity)
            .is_some_and(|m| self.db.has_property(m.table, property))
    }

    /// Raw bytes of a property, or `None` if the entity lacks it or it is a
    /// flag.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn property_bytes(&self, entity: EntityId, property: PropertyId) -> Option<&[u8]> {
        let mapping = self.try_entity_mapping(entity)?;
        self.db.table(mapping.table).value(property, mapping.row)
    }

    /// Mutable raw bytes of a property.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or `property` is the owner column.
    pub fn property_bytes_mut(
        &mut self,
        entity: EntityId,
        property: PropertyId,
    ) -> Option<&mut [u8]> {
        self.assert_not_owner(property);
        let mapping = self.try_entity_mapping(entity)?;
        self.db
            .table_mut(mapping.table)
            .value_mut(property, mapping.row)
    }

    /// Reads a property as `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or `T` does not have the property's
    /// registered size.
    #[must_use]
    pub fn get_property<T: bytemuck::Pod>(
        &self,
        entity: EntityId,
        property: PropertyId,
    ) -> Option<T> {
        let bytes = self.property_bytes(entity, property)?;
        assert_eq!(
            bytes.len(),
            std::mem::size_of::<T>(),
            "Property {property} is {} bytes, read as {}",
            bytes.len(),
            std::any::type_name::<T>()
        );
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Writes a property from `T`. Returns false if the entity lacks it.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid, `property` is the owner column, or
    /// `T` does not have the property's registered size.
    pub fn set_property<T: bytemuck::Pod>(
        &mut self,
        entity: EntityId,
        property: PropertyId,
        value: T,
    ) -> bool {
        let Some(bytes) = self.property_bytes_mut(entity, property) else {
            return false;
        };
        assert_eq!(
            bytes.len(),
            std::mem::size_of::<T>(),
            "Property {property} is {} bytes, written as {}",
            bytes.len(),
            std::any::type_name::<T>()
        );
        bytes.copy_from_slice(bytemuck::bytes_of(&value));
        true
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Finds or creates the world table for `properties` (plus `Owner`).
    ///
    /// # Panics
    ///
    /// Panics if a property is unregistered.
    pub fn find_or_create_table(&mut self, properties: &[PropertyId]) -> TableId {
        let mut signature = TableSignature::from_properties(properties);
        signature.set(self.owner);
        self.db.find_or_create_table(signature)
    }

    /// Gives an entity its first row, in the table for `properties`.
    /// Every column starts at its default value.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or is already instantiated.
    pub fn instantiate(&mut self, entity: EntityId, properties: &[PropertyId]) -> EntityMapping {
        assert!(
            !self.is_instantiated(entity),
            "Entity {entity} is already instantiated"
        );
        let table = self.find_or_create_table(properties);
        let row = self.migrate(entity, table);
        EntityMapping { table, row }
    }

    /// Column base pointer, or `None` if the property has no column there.
    ///
    /// # Panics
    ///
    /// Panics if `table` is not a live table.
    #[must_use]
    pub fn column_buffer(
        &self,
        table: TableId,
        property: PropertyId,
    ) -> Option<std::ptr::NonNull<u8>> {
        self.db.column_buffer(table, property)
    }

    /// Row count of a table.
    ///
    /// # Panics
    ///
    /// Panics if `table` is not a live table.
    #[must_use]
    pub fn num_rows(&self, table: TableId) -> usize {
        self.db.num_rows(table)
    }

    /// Deletes an empty table. Its id may be handed to a later table.
    ///
    /// # Panics
    ///
    /// Panics if the table is invalid or still has rows.
    pub fn delete_table(&mut self, table: TableId) {
        self.db.delete_table(table);
    }

    /// Deletes every empty table. Returns how many were deleted.
    ///
    /// Cached table lists from [`World::query_cached`] prune themselves on
    /// their next use.
    pub fn prune_empty_tables(&mut self) -> usize {
        let empty: Vec<TableId> = self
            .db
            .tables()
            .filter(|t| t.is_empty())
            .map(strata_core::Table::id)
            .collect();
        for &table in &empty {
            self.db.delete_table(table);
        }
        if !empty.is_empty() {
            tracing::debug!(deleted = empty.len(), "pruned empty tables");
        }
        empty.len()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}
