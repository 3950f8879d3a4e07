//! # Migration
//!
//! Moving an entity's row between tables when its property set changes.
//!
//! ```text
//! src {Owner, A, B}        dst {Owner, A, C}
//!   row r: [e, a, b]  -->    new: [e, a, default(C)]
//!   row r <- last row (swap-remove), moved owner remapped to r
//! ```
//!
//! Properties only the source has are dropped without any cleanup. For
//! [`PropertyFlags::MANAGED`](strata_core::PropertyFlags::MANAGED) properties
//! the caller must release whatever the value owns before removing it.

use strata_core::{PropertyId, TableId};

use crate::entity::EntityId;
use crate::world::{EntityMapping, World};

impl World {
    /// Moves an entity's row into `destination` and returns the new row.
    ///
    /// An entity without a row gets a fresh default-filled one. Shared
    /// columns are copied, columns only the destination has keep their
    /// defaults. The source row is swap-removed and whichever entity moved
    /// into it is remapped.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid, `destination` is not a live table, or
    /// the destination has no owner column.
    pub fn migrate(&mut self, entity: EntityId, destination: TableId) -> usize {
        self.assert_valid(entity);
        assert!(
            self.db.has_property(destination, self.owner),
            "Table {} is not a world table (no owner column)",
            destination.index()
        );

        let index = entity.index() as usize;
        let current = self.entity_map[index];
        let row = match current {
            None => self.db.append_row(destination),
            Some(mapping) if mapping.table == destination => return mapping.row,
            Some(mapping) => {
                let row = self.db.transfer_row(mapping.table, mapping.row, destination);
                self.remove_row_and_fix(mapping.table, mapping.row);
                tracing::trace!(
                    %entity,
                    from = mapping.table.index(),
                    to = destination.index(),
                    "migrated entity"
                );
                row
            }
        };

        self.write_owner(destination, row, entity);
        self.entity_map[index] = Some(EntityMapping {
            table: destination,
            row,
        });
        row
    }

    /// Swap-removes a row and remaps the entity that moved into it.
    pub(crate) fn remove_row_and_fix(&mut self, table: TableId, row: usize) {
        if self.db.remove_row(table, row).is_some() {
            let moved = self.read_owner(table, row);
            self.entity_map[moved.index() as usize] = Some(EntityMapping { table, row });
        }
    }

    fn write_owner(&mut self, table: TableId, row: usize, entity: EntityId) {
        if let Some(bytes) = self.db.table_mut(table).value_mut(self.owner, row) {
            bytes.copy_from_slice(bytemuck::bytes_of(&entity));
        }
    }

    fn read_owner(&self, table: TableId, row: usize) -> EntityId {
        self.db
            .table(table)
            .value(self.owner, row)
            .map_or(EntityId::INVALID, bytemuck::pod_read_unaligned)
    }

    /// Adds `property` to an entity now, migrating its row.
    ///
    /// An entity without a row is instantiated into `{Owner, property}`. If
    /// the entity already has the property, only the value (if any) is
    /// written. A value for a flag property is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid, the property is unregistered or is
    /// the owner column, or the value size does not match.
    pub(crate) fn execute_add(
        &mut self,
        entity: EntityId,
        property: PropertyId,
        value: Option<&[u8]>,
    ) {
        self.assert_valid(entity);
        self.assert_not_owner(property);
        let description = self.registry.describe(property);
        if let Some(bytes) = value {
            assert_eq!(
                bytes.len(),
                description.byte_size(),
                "Value for '{}' is {} bytes, expected {}",
                description.name(),
                bytes.len(),
                description.byte_size()
            );
        }

        let current = self.entity_map[entity.index() as usize];
        let mapping = match current {
            None => self.instantiate(entity, &[property]),
            Some(mapping) if self.db.has_property(mapping.table, property) => {
                if value.is_none() {
                    tracing::warn!(
                        %entity,
                        property = %property,
                        "add of a property already present"
                    );
                }
                mapping
            }
            Some(mapping) => {
                let mut signature = *self.db.signature(mapping.table);
                signature.flip(property);
                let destination = self.db.find_or_create_table(signature);
                let row = self.migrate(entity, destination);
                EntityMapping {
                    table: destination,
                    row,
                }
            }
        };

        if let Some(bytes) = value {
            if let Some(slot) = self
                .db
                .table_mut(mapping.table)
                .value_mut(property, mapping.row)
            {
                slot.copy_from_slice(bytes);
            }
        }
    }

    /// Removes `property` from an entity now, migrating its row.
    ///
    /// Removing a property the entity lacks is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or `property` is the owner column.
    pub(crate) fn execute_remove(&mut self, entity: EntityId, property: PropertyId) {
        self.assert_valid(entity);
        assert_ne!(property, self.owner, "The owner column cannot be removed");

        let Some(mapping) = self.entity_map[entity.index() as usize] else {
            tracing::warn!(%entity, property = %property, "remove from an entity without a row");
            return;
        };
        if !self.db.has_property(mapping.table, property) {
            tracing::warn!(%entity, property = %property, "remove of an absent property");
            return;
        }

        let mut signature = *self.db.signature(mapping.table);
        signature.flip(property);
        let destination = self.db.find_or_create_table(signature);
        self.migrate(entity, destination);
    }
}
