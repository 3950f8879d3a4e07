//! # Datasets
//!
//! The result of a query: one [`TableView`] per matching non-empty table,
//! each holding a column pointer per filter property plus the row count.
//!
//! Views live in the world's view arena and stay valid until
//! [`World::release_datasets`](crate::World::release_datasets), which needs
//! `&mut World` and so cannot run while a dataset is borrowed. Every view,
//! copies included, carries the `'w` borrow of the world it points into.

// SAFETY: Views carry raw column pointers so systems can iterate columns
// directly. Typed access checks size and alignment before building slices.
#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::ptr::NonNull;

use strata_core::{PropertyId, TableId};

use crate::filter::MAX_FILTER_PROPERTIES;
use crate::world::World;

/// Columns of one table, in filter property order.
///
/// Borrows the world for `'w`, so no structural change or release can
/// happen while a view (or a copy of one) is alive:
///
/// ```compile_fail
/// use strata::{FilterDesc, PropertyFlags, World};
///
/// let mut world = World::default();
/// let a = world.register_property("A", 4, None, PropertyFlags::empty());
/// let e = world.create_entity();
/// world.instantiate(e, &[a]);
/// let filter = world.create_filter(&FilterDesc::new().read(a));
///
/// let view = world.query(filter).views()[0];
/// world.release_datasets();
/// let _ = view.column::<u32>(0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TableView<'w> {
    table: TableId,
    rows: usize,
    buffers: [Option<NonNull<u8>>; MAX_FILTER_PROPERTIES],
    item_sizes: [usize; MAX_FILTER_PROPERTIES],
    len: usize,
    world: PhantomData<&'w World>,
}

// SAFETY: A view is a snapshot of pointers into world-owned columns. Shared
// access only reads; writers go through `column_mut`, whose contract puts
// exclusivity on the caller (the scheduler's access modes).
unsafe impl Send for TableView<'_> {}
unsafe impl Sync for TableView<'_> {}

impl TableView<'_> {
    pub(crate) fn new(table: TableId, rows: usize) -> Self {
        Self {
            table,
            rows,
            buffers: [None; MAX_FILTER_PROPERTIES],
            item_sizes: [0; MAX_FILTER_PROPERTIES],
            len: 0,
            world: PhantomData,
        }
    }

    pub(crate) fn push(&mut self, buffer: Option<NonNull<u8>>, item_size: usize) {
        self.buffers[self.len] = buffer;
        self.item_sizes[self.len] = item_size;
        self.len += 1;
    }

    /// Table this view covers.
    #[inline]
    #[must_use]
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Number of rows. Never zero.
    #[inline]
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Column pointers in filter property order. `None` for flag properties.
    #[inline]
    #[must_use]
    pub fn buffers(&self) -> &[Option<NonNull<u8>>] {
        &self.buffers[..self.len]
    }

    /// Column pointer for the `index`-th filter property.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[inline]
    #[must_use]
    pub fn buffer(&self, index: usize) -> Option<NonNull<u8>> {
        self.buffers()[index]
    }

    /// Raw bytes of the `index`-th filter property's column.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn column_bytes(&self, index: usize) -> Option<&[u8]> {
        let ptr = self.buffer(index)?;
        // SAFETY: the column holds at least `rows * item_size` initialized
        // bytes and outlives the view (see module docs).
        Some(unsafe {
            std::slice::from_raw_parts(ptr.as_ptr(), self.rows * self.item_sizes[index])
        })
    }

    /// Typed column of the `index`-th filter property.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or `T` has the wrong size.
    #[must_use]
    pub fn column<T: bytemuck::Pod>(&self, index: usize) -> Option<&[T]> {
        let bytes = self.column_bytes(index)?;
        self.check_item::<T>(index);
        Some(bytemuck::cast_slice(bytes))
    }

    /// Mutable typed column of the `index`-th filter property.
    ///
    /// # Safety
    ///
    /// The caller must hold write access to this column, declared with
    /// [`AccessMode::Write`](crate::AccessMode::Write) in the filter: no other
    /// reference to it (from any view or [`World`] accessor) may be live
    /// while the returned slice is.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or `T` has the wrong size.
    #[must_use]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn column_mut<T: bytemuck::Pod>(&self, index: usize) -> Option<&mut [T]> {
        let ptr = self.buffer(index)?;
        self.check_item::<T>(index);
        // SAFETY: in bounds as in `column_bytes`, exclusivity is the
        // caller's contract, and columns are 16-byte aligned.
        let bytes =
            std::slice::from_raw_parts_mut(ptr.as_ptr(), self.rows * self.item_sizes[index]);
        Some(bytemuck::cast_slice_mut(bytes))
    }

    fn check_item<T>(&self, index: usize) {
        assert_eq!(
            self.item_sizes[index],
            std::mem::size_of::<T>(),
            "Column {index} holds {}-byte items, viewed as {}",
            self.item_sizes[index],
            std::any::type_name::<T>()
        );
    }
}

/// A query result.
#[derive(Clone, Copy, Debug)]
pub struct Dataset<'w> {
    views: &'w [TableView<'w>],
    properties: &'w [PropertyId],
}

impl<'w> Dataset<'w> {
    pub(crate) fn new(views: &'w [TableView<'w>], properties: &'w [PropertyId]) -> Self {
        Self { views, properties }
    }

    /// One view per matching non-empty table.
    #[inline]
    #[must_use]
    pub fn views(&self) -> &'w [TableView<'w>] {
        self.views
    }

    /// Filter properties, the order of every view's buffers.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &'w [PropertyId] {
        self.properties
    }

    /// Number of views.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Checks if no table matched.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Total rows across every view.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.views.iter().map(TableView::num_rows).sum()
    }

    /// Iterates over the views.
    pub fn iter(&self) -> std::slice::Iter<'w, TableView<'w>> {
        self.views.iter()
    }
}

impl<'w> IntoIterator for Dataset<'w> {
    type Item = &'w TableView<'w>;
    type IntoIter = std::slice::Iter<'w, TableView<'w>>;

    fn into_iter(self) -> Self::IntoIter {
        self.views.iter()
    }
}
