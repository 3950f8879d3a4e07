//! # Archetype Tables
//!
//! A table holds every row whose property set is exactly its signature.
//! Storage is one [`Column`] per non-flag property (structure of arrays):
//!
//! ```text
//! Table {Position, Velocity, Tag}:
//!   Position[]: [P0, P1, P2, ...]
//!   Velocity[]: [V0, V1, V2, ...]
//!   Tag:        (no column, presence only)
//! ```
//!
//! Rows are removed with swap-remove, so a row index is only meaningful until
//! the next removal from the same table.

use std::collections::HashMap;
use std::ptr::NonNull;

use super::column::Column;
use super::registry::{PropertyId, TypeRegistry};
use super::signature::TableSignature;

/// Handle to a table inside a [`Database`](super::Database).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId {
    /// Null/invalid table id.
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates an id from a raw slot index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this id is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

/// A single archetype table.
pub struct Table {
    id: TableId,
    signature: TableSignature,
    /// All properties, ascending by id (flags included).
    properties: Vec<PropertyId>,
    /// Non-flag properties only.
    columns: Vec<Column>,
    /// Property -> index into `columns`.
    column_lookup: HashMap<PropertyId, usize>,
    rows: usize,
}

impl Table {
    /// Builds an empty table for `signature`.
    ///
    /// Every property in the signature must be registered in `registry`.
    #[must_use]
    pub fn new(
        id: TableId,
        signature: TableSignature,
        registry: &TypeRegistry,
        initial_rows: usize,
    ) -> Self {
        let properties: Vec<PropertyId> = signature.iter().collect();
        let mut columns = Vec::new();
        let mut column_lookup = HashMap::new();

        for &property in &properties {
            let description = registry.describe(property);
            if description.is_flag() {
                continue;
            }
            column_lookup.insert(property, columns.len());
            columns.push(Column::new(description, initial_rows));
        }

        Self {
            id,
            signature,
            properties,
            columns,
            column_lookup,
            rows: 0,
        }
    }

    /// This table's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// This table's signature.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &TableSignature {
        &self.signature
    }

    /// Every property in the table, ascending by id.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Checks if the table has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of properties that have column storage.
    #[inline]
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Checks whether `property` is part of the signature (column or flag).
    #[inline]
    #[must_use]
    pub fn has_property(&self, property: PropertyId) -> bool {
        self.signature.is_set(property)
    }

    /// The column for `property`, if it has one in this table.
    #[inline]
    #[must_use]
    pub fn column(&self, property: PropertyId) -> Option<&Column> {
        self.column_lookup.get(&property).map(|&i| &self.columns[i])
    }

    fn column_mut(&mut self, property: PropertyId) -> Option<&mut Column> {
        self.column_lookup
            .get(&property)
            .map(|&i| &mut self.columns[i])
    }

    /// Base pointer of the column for `property`, or `None` if the property
    /// is absent or stored as a flag.
    ///
    /// The pointer is invalidated by the next append that grows the table.
    #[inline]
    #[must_use]
    pub fn column_buffer(&self, property: PropertyId) -> Option<NonNull<u8>> {
        self.column(property).map(Column::as_ptr)
    }

    /// Appends a row filled with every property's default value.
    ///
    /// Always use the returned index.
    pub fn append_row(&mut self) -> usize {
        let row = self.rows;
        let needed = row + 1;
        for column in &mut self.columns {
            column.reserve(needed, row);
            column.write_default(row);
        }
        self.rows = needed;
        tracing::trace!(table = self.id.index(), row, "appended row");
        row
    }

    /// Removes `row` by moving the last row into its place.
    ///
    /// Returns the index the moved row came from, or `None` when `row` was
    /// the last row and nothing moved. The caller owns the bookkeeping for
    /// whichever entity lived in the moved row.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn remove_row(&mut self, row: usize) -> Option<usize> {
        assert!(
            row < self.rows,
            "Row {row} out of range for table {} with {} rows",
            self.id.index(),
            self.rows
        );
        let last = self.rows - 1;
        for column in &mut self.columns {
            column.copy_within(last, row);
        }
        self.rows = last;
        tracing::trace!(table = self.id.index(), row, "removed row");
        (row != last).then_some(last)
    }

    /// Bytes of `property` at `row`, if the table stores it in a column.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    #[must_use]
    pub fn value(&self, property: PropertyId, row: usize) -> Option<&[u8]> {
        self.check_row(row);
        self.column(property).map(|c| c.row(row))
    }

    /// Mutable bytes of `property` at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn value_mut(&mut self, property: PropertyId, row: usize) -> Option<&mut [u8]> {
        self.check_row(row);
        self.column_mut(property).map(|c| c.row_mut(row))
    }

    /// Copies every column both tables share from `src[src_row]` into
    /// `self[dst_row]`. Columns only `self` has are left untouched.
    pub fn copy_shared_from(&mut self, dst_row: usize, src: &Table, src_row: usize) {
        self.check_row(dst_row);
        src.check_row(src_row);
        for column in &mut self.columns {
            if let Some(source) = src.column(column.property()) {
                column.row_mut(dst_row).copy_from_slice(source.row(src_row));
            }
        }
    }

    #[inline]
    fn check_row(&self, row: usize) {
        assert!(
            row < self.rows,
            "Row {row} out of range for table {} with {} rows",
            self.id.index(),
            self.rows
        );
    }
}
