//! # Column Storage
//!
//! One contiguous, untyped buffer per (table, property). Rows are
//! `item_size` bytes wide and laid out back to back.

// SAFETY: Columns manage raw allocations so queries can hand out plain
// pointers. Every unsafe block below stays within `capacity * item_size`.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

use super::registry::{PropertyDescription, PropertyId, COLUMN_ALIGN};

/// Smallest capacity a column is ever allocated with.
const MIN_CAPACITY: usize = 4;

/// Raw storage for one property inside one table.
pub struct Column {
    /// Property stored in this column.
    property: PropertyId,
    /// Bytes per row.
    item_size: usize,
    /// Default value written into fresh rows.
    default_value: Arc<[u8]>,
    /// Column data.
    storage: NonNull<u8>,
    /// Layout of the storage allocation.
    layout: Layout,
    /// Rows that fit before the next grow.
    capacity: usize,
}

impl Column {
    /// Allocates a column for `description` with room for `capacity` rows.
    ///
    /// # Panics
    ///
    /// Panics if the property is a flag (flags have no storage).
    #[must_use]
    pub fn new(description: &PropertyDescription, capacity: usize) -> Self {
        assert!(
            !description.is_flag(),
            "Flag property '{}' has no column storage",
            description.name()
        );
        let capacity = capacity.max(MIN_CAPACITY);
        let item_size = description.byte_size();
        let layout = Self::layout_for(item_size, capacity);

        Self {
            property: description.id(),
            item_size,
            default_value: description.default_value_shared(),
            storage: Self::allocate(layout),
            layout,
            capacity,
        }
    }

    fn layout_for(item_size: usize, capacity: usize) -> Layout {
        let bytes = item_size
            .checked_mul(capacity)
            .unwrap_or_else(|| panic!("Column of {capacity} x {item_size} bytes overflows"));
        Layout::from_size_align(bytes, COLUMN_ALIGN)
            .unwrap_or_else(|e| panic!("Invalid column layout: {e}"))
    }

    fn allocate(layout: Layout) -> NonNull<u8> {
        // SAFETY: `layout` has a non-zero size (item_size > 0, capacity >= 1).
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
    }

    /// Property stored in this column.
    #[inline]
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Bytes per row.
    #[inline]
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Rows that fit without reallocating.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Base pointer of the column. Invalidated by [`Column::reserve`].
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.storage
    }

    /// Makes room for at least `min_capacity` rows, keeping the first `len`.
    pub fn reserve(&mut self, min_capacity: usize, len: usize) {
        if min_capacity <= self.capacity {
            return;
        }
        debug_assert!(len <= self.capacity);

        let new_capacity = min_capacity.max(self.capacity * 2);
        let new_layout = Self::layout_for(self.item_size, new_capacity);
        let new_storage = Self::allocate(new_layout);

        // SAFETY: both allocations hold at least `len * item_size` bytes and
        // are distinct, so the copy is in bounds and non-overlapping.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.storage.as_ptr(),
                new_storage.as_ptr(),
                len * self.item_size,
            );
            dealloc(self.storage.as_ptr(), self.layout);
        }

        self.storage = new_storage;
        self.layout = new_layout;
        self.capacity = new_capacity;
    }

    /// Bytes of one row.
    #[inline]
    #[must_use]
    pub fn row(&self, row: usize) -> &[u8] {
        assert!(row < self.capacity, "Row {row} outside column capacity");
        // SAFETY: row < capacity keeps the range inside the allocation.
        unsafe {
            std::slice::from_raw_parts(
                self.storage.as_ptr().add(row * self.item_size),
                self.item_size,
            )
        }
    }

    /// Mutable bytes of one row.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        assert!(row < self.capacity, "Row {row} outside column capacity");
        // SAFETY: row < capacity keeps the range inside the allocation, and
        // `&mut self` guarantees exclusive access.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.storage.as_ptr().add(row * self.item_size),
                self.item_size,
            )
        }
    }

    /// Writes the registered default value into `row`.
    #[inline]
    pub fn write_default(&mut self, row: usize) {
        let default = Arc::clone(&self.default_value);
        self.row_mut(row).copy_from_slice(&default);
    }

    /// Copies `src` into `dst` within this column.
    #[inline]
    pub fn copy_within(&mut self, src: usize, dst: usize) {
        if src == dst {
            return;
        }
        assert!(
            src < self.capacity && dst < self.capacity,
            "Row copy {src} -> {dst} outside column capacity"
        );
        // SAFETY: both rows are in bounds and distinct, so the ranges do not
        // overlap.
        unsafe {
            let base = self.storage.as_ptr();
            std::ptr::copy_nonoverlapping(
                base.add(src * self.item_size),
                base.add(dst * self.item_size),
                self.item_size,
            );
        }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        // SAFETY: `storage` was allocated with exactly `layout`.
        unsafe {
            dealloc(self.storage.as_ptr(), self.layout);
        }
    }
}

// SAFETY: Column owns its allocation exclusively; shared access only reads.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}
