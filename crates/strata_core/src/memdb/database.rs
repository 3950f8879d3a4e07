//! # Table Store
//!
//! Owns every table, indexed by signature. At most one table exists per
//! signature; callers check [`Database::find_table`] before
//! [`Database::create_table`].
//!
//! The store does not know which entity owns which row. Callers that remove
//! rows must fix up whatever moved into the vacated slot.

use std::collections::HashMap;
use std::ptr::NonNull;

use super::registry::{PropertyId, Registry};
use super::signature::TableSignature;
use super::table::{Table, TableId};

/// Default initial row capacity of a new table.
pub const DEFAULT_TABLE_ROWS: usize = 64;

/// The table store.
pub struct Database {
    registry: Registry,
    /// Table slots. `None` marks a deleted table awaiting reuse.
    tables: Vec<Option<Table>>,
    /// Deleted slots, reused before the vector grows.
    free_slots: Vec<TableId>,
    /// Signature -> table.
    index: HashMap<TableSignature, TableId>,
    initial_table_rows: usize,
}

impl Database {
    /// Creates an empty store over `registry`.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self::with_table_rows(registry, DEFAULT_TABLE_ROWS)
    }

    /// Creates an empty store whose tables start with room for `initial_rows`.
    #[must_use]
    pub fn with_table_rows(registry: Registry, initial_rows: usize) -> Self {
        Self {
            registry,
            tables: Vec::new(),
            free_slots: Vec::new(),
            index: HashMap::new(),
            initial_table_rows: initial_rows,
        }
    }

    /// The registry this store resolves property layouts against.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Looks up the table for a signature.
    #[inline]
    #[must_use]
    pub fn find_table(&self, signature: &TableSignature) -> Option<TableId> {
        self.index.get(signature).copied()
    }

    /// Creates a table holding exactly `properties`. Input order is
    /// irrelevant; duplicates are ignored.
    ///
    /// # Panics
    ///
    /// Panics if a property is unregistered. In debug builds, also panics if a
    /// table with this signature already exists.
    pub fn create_table(&mut self, properties: &[PropertyId]) -> TableId {
        self.create_table_with_signature(TableSignature::from_properties(properties))
    }

    /// Creates a table for `signature`. See [`Database::create_table`].
    pub fn create_table_with_signature(&mut self, signature: TableSignature) -> TableId {
        debug_assert!(
            !self.index.contains_key(&signature),
            "Table for {signature:?} already exists"
        );

        let id = self
            .free_slots
            .pop()
            .unwrap_or_else(|| TableId::from_index(self.tables.len()));

        let table = {
            let registry = self.registry.read();
            for property in signature.iter() {
                assert!(
                    registry.contains(property),
                    "Property id {property} was never registered"
                );
            }
            Table::new(id, signature, &registry, self.initial_table_rows)
        };

        tracing::debug!(
            table = id.index(),
            properties = table.properties().len(),
            columns = table.num_columns(),
            "created table"
        );

        if id.index() == self.tables.len() {
            self.tables.push(Some(table));
        } else {
            self.tables[id.index()] = Some(table);
        }
        self.index.insert(signature, id);
        id
    }

    /// Looks up the table for `signature`, creating it if absent.
    pub fn find_or_create_table(&mut self, signature: TableSignature) -> TableId {
        match self.find_table(&signature) {
            Some(id) => id,
            None => self.create_table_with_signature(signature),
        }
    }

    /// Deletes an empty table. Its slot (and id) will be reused.
    ///
    /// # Panics
    ///
    /// Panics if the table is invalid or still has rows.
    pub fn delete_table(&mut self, id: TableId) {
        let table = self.table(id);
        assert!(
            table.is_empty(),
            "Cannot delete table {} with {} rows",
            id.index(),
            table.num_rows()
        );
        let signature = *table.signature();
        self.index.remove(&signature);
        self.tables[id.index()] = None;
        self.free_slots.push(id);
        tracing::debug!(table = id.index(), "deleted table");
    }

    /// Checks whether `id` refers to a live table.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, id: TableId) -> bool {
        self.get_table(id).is_some()
    }

    /// Returns the table, or `None` if `id` is stale or invalid.
    #[inline]
    #[must_use]
    pub fn get_table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the table.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live table.
    #[inline]
    #[must_use]
    pub fn table(&self, id: TableId) -> &Table {
        self.get_table(id)
            .unwrap_or_else(|| panic!("Table {} does not exist", id.index()))
    }

    /// Returns the table mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a live table.
    #[inline]
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        self.tables
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("Table {} does not exist", id.index()))
    }

    /// Signature of a live table.
    #[inline]
    #[must_use]
    pub fn signature(&self, id: TableId) -> &TableSignature {
        self.table(id).signature()
    }

    /// Row count of a live table.
    #[inline]
    #[must_use]
    pub fn num_rows(&self, id: TableId) -> usize {
        self.table(id).num_rows()
    }

    /// Checks whether a live table contains `property`.
    #[inline]
    #[must_use]
    pub fn has_property(&self, id: TableId, property: PropertyId) -> bool {
        self.table(id).has_property(property)
    }

    /// Appends a default-filled row. See [`Table::append_row`].
    pub fn append_row(&mut self, id: TableId) -> usize {
        self.table_mut(id).append_row()
    }

    /// Swap-removes a row. See [`Table::remove_row`].
    pub fn remove_row(&mut self, id: TableId, row: usize) -> Option<usize> {
        self.table_mut(id).remove_row(row)
    }

    /// Column base pointer, or `None` if the property has no column there.
    #[inline]
    #[must_use]
    pub fn column_buffer(&self, id: TableId, property: PropertyId) -> Option<NonNull<u8>> {
        self.table(id).column_buffer(property)
    }

    /// Appends a row to `dst` and copies every column it shares with
    /// `src[row]`. Columns only `dst` has keep their defaults. The source row
    /// is left in place; the caller removes it.
    ///
    /// # Panics
    ///
    /// Panics if `src == dst` or either table is invalid.
    pub fn transfer_row(&mut self, src: TableId, row: usize, dst: TableId) -> usize {
        assert_ne!(src, dst, "Cannot transfer a row into its own table");
        let (source, destination) = self.pair_mut(src, dst);
        let new_row = destination.append_row();
        destination.copy_shared_from(new_row, source, row);
        new_row
    }

    fn pair_mut(&mut self, src: TableId, dst: TableId) -> (&Table, &mut Table) {
        let (s, d) = (src.index(), dst.index());
        let (source, destination) = if s < d {
            let (left, right) = self.tables.split_at_mut(d);
            (&left[s], &mut right[0])
        } else {
            let (left, right) = self.tables.split_at_mut(s);
            (&right[0], &mut left[d])
        };
        let source = source
            .as_ref()
            .unwrap_or_else(|| panic!("Table {s} does not exist"));
        let destination = destination
            .as_mut()
            .unwrap_or_else(|| panic!("Table {d} does not exist"));
        (source, destination)
    }

    /// Every table whose signature includes `inclusive` and avoids
    /// `exclusive`, in ascending id order.
    #[must_use]
    pub fn query_tables(
        &self,
        inclusive: &TableSignature,
        exclusive: &TableSignature,
    ) -> Vec<TableId> {
        let mut out = Vec::new();
        self.query_tables_into(inclusive, exclusive, &mut out);
        out
    }

    /// Like [`Database::query_tables`], appending into `out`.
    pub fn query_tables_into(
        &self,
        inclusive: &TableSignature,
        exclusive: &TableSignature,
        out: &mut Vec<TableId>,
    ) {
        out.extend(
            self.tables()
                .filter(|t| t.signature().matches(inclusive, exclusive))
                .map(Table::id),
        );
    }

    /// Iterates over live tables in ascending id order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter_map(Option::as_ref)
    }

    /// Number of live tables.
    #[inline]
    #[must_use]
    pub fn num_tables(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdb::registry::PropertyFlags;

    fn setup() -> (Database, PropertyId, PropertyId, PropertyId) {
        let registry = Registry::new();
        let a = registry.register("A", 4, Some(&1u32.to_le_bytes()), PropertyFlags::empty());
        let b = registry.register("B", 4, Some(&2u32.to_le_bytes()), PropertyFlags::empty());
        let c = registry.register("C", 4, Some(&3u32.to_le_bytes()), PropertyFlags::empty());
        (Database::with_table_rows(registry, 4), a, b, c)
    }

    #[test]
    fn test_find_table_is_order_independent() {
        let (mut db, a, b, _) = setup();
        let ab = db.create_table(&[a, b]);
        let sig_ba = TableSignature::from_properties(&[b, a]);
        assert_eq!(db.find_table(&sig_ba), Some(ab));
        assert_eq!(db.find_or_create_table(sig_ba), ab);
        assert_eq!(db.num_tables(), 1);
    }

    #[test]
    fn test_query_tables_inclusive_exclusive() {
        let (mut db, a, b, c) = setup();
        let t_a = db.create_table(&[a]);
        let t_ab = db.create_table(&[a, b]);
        let t_abc = db.create_table(&[a, b, c]);

        let inc = TableSignature::from_properties(&[a, b]);
        let exc = TableSignature::from_properties(&[c]);
        assert_eq!(db.query_tables(&inc, &exc), vec![t_ab]);

        let inc = TableSignature::from_properties(&[a]);
        assert_eq!(
            db.query_tables(&inc, &TableSignature::EMPTY),
            vec![t_a, t_ab, t_abc]
        );
    }

    #[test]
    fn test_transfer_row_preserves_shared_columns() {
        let (mut db, a, b, c) = setup();
        let src = db.create_table(&[a, b]);
        let dst = db.create_table(&[a, c]);

        let row = db.append_row(src);
        db.table_mut(src)
            .value_mut(a, row)
            .unwrap()
            .copy_from_slice(&5u32.to_le_bytes());

        let new_row = db.transfer_row(src, row, dst);
        let table = db.table(dst);
        assert_eq!(table.value(a, new_row), Some(&5u32.to_le_bytes()[..]));
        assert_eq!(table.value(c, new_row), Some(&3u32.to_le_bytes()[..]));
        assert_eq!(table.value(b, new_row), None);
        // Source row stays until the caller removes it.
        assert_eq!(db.num_rows(src), 1);
    }

    #[test]
    fn test_transfer_row_to_lower_id() {
        let (mut db, a, b, _) = setup();
        let low = db.create_table(&[a]);
        let high = db.create_table(&[a, b]);
        let row = db.append_row(high);
        db.table_mut(high)
            .value_mut(a, row)
            .unwrap()
            .copy_from_slice(&9u32.to_le_bytes());
        let new_row = db.transfer_row(high, row, low);
        assert_eq!(db.table(low).value(a, new_row), Some(&9u32.to_le_bytes()[..]));
    }

    #[test]
    fn test_delete_table_recycles_slot() {
        let (mut db, a, b, _) = setup();
        let t_a = db.create_table(&[a]);
        db.delete_table(t_a);
        assert!(!db.is_valid(t_a));
        assert_eq!(db.find_table(&TableSignature::from_properties(&[a])), None);

        let t_b = db.create_table(&[b]);
        assert_eq!(t_b, t_a);
        assert!(db.has_property(t_b, b));
    }

    #[test]
    #[should_panic(expected = "with 1 rows")]
    fn test_delete_non_empty_table_panics() {
        let (mut db, a, _, _) = setup();
        let t = db.create_table(&[a]);
        db.append_row(t);
        db.delete_table(t);
    }

    #[test]
    fn test_column_buffer_absent_property() {
        let (mut db, a, b, _) = setup();
        let t = db.create_table(&[a]);
        assert!(db.column_buffer(t, a).is_some());
        assert!(db.column_buffer(t, b).is_none());
    }
}
