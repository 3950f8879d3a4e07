//! # Queries
//!
//! Resolving a [`Filter`] against the table store into a [`Dataset`].
//!
//! ```text
//! tables:  {A}  {A,B}  {A,B,C}  {B}
//! filter:  +A +B -C
//! dataset: [ view({A,B}) ]
//! ```
//!
//! Empty tables never produce a view.

// SAFETY: Dataset slices point into the view arena, whose chunks never
// reallocate and are only reset through `&mut World`.
#![allow(unsafe_code)]

use strata_core::TableId;

use crate::dataset::{Dataset, TableView};
use crate::filter::{Filter, FilterData};
use crate::world::World;

impl World {
    /// Runs a filter over every table.
    ///
    /// Views are in ascending table id order and stay valid until
    /// [`World::release_datasets`].
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn query(&self, filter: Filter) -> Dataset<'_> {
        let data = self.filter_data(filter);
        let tables = self.db.query_tables(&data.inclusive, &data.exclusive);
        self.build_dataset(data, &tables)
    }

    /// Runs a filter over a caller-cached table list.
    ///
    /// Ids that no longer name a matching table (deleted, or reused by a
    /// table with another signature) are swap-removed from `tables` and the
    /// same position is checked again. Tables created since the list was
    /// built are not picked up; refill it with [`World::matching_tables`].
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn query_cached(&self, tables: &mut Vec<TableId>, filter: Filter) -> Dataset<'_> {
        let data = self.filter_data(filter);
        let mut i = 0;
        while i < tables.len() {
            let matches = self
                .db
                .get_table(tables[i])
                .is_some_and(|t| t.signature().matches(&data.inclusive, &data.exclusive));
            if matches {
                i += 1;
            } else {
                tracing::trace!(table = tables[i].index(), "dropped stale cached table");
                tables.swap_remove(i);
            }
        }
        self.build_dataset(data, tables)
    }

    /// Ids of every table a filter matches, empty or not.
    ///
    /// # Panics
    ///
    /// Panics if `filter` was destroyed.
    #[must_use]
    pub fn matching_tables(&self, filter: Filter) -> Vec<TableId> {
        let data = self.filter_data(filter);
        self.db.query_tables(&data.inclusive, &data.exclusive)
    }

    fn build_dataset<'w>(&'w self, data: &'w FilterData, tables: &[TableId]) -> Dataset<'w> {
        let registry = self.registry.read();
        let sizes: Vec<usize> = data
            .properties
            .iter()
            .map(|&p| registry.describe(p).byte_size())
            .collect();
        drop(registry);

        let views = tables.iter().filter_map(|&id| -> Option<TableView<'static>> {
            let table = self.db.table(id);
            if table.is_empty() {
                return None;
            }
            let mut view = TableView::new(id, table.num_rows());
            for (&property, &size) in data.properties.iter().zip(&sizes) {
                view.push(table.column_buffer(property), size);
            }
            Some(view)
        });

        let mut arena = self.views.lock();
        let slice = arena.alloc_iter(tables.len(), views);
        let stored = arena.get(slice);
        let (ptr, len) = (stored.as_ptr(), stored.len());
        drop(arena);

        // SAFETY: arena chunks never move their elements, later allocations
        // only append past `len`, and `reset` needs `&mut self`, which cannot
        // coexist with the `&'w self` borrow this slice is tied to. The views
        // are rebound from `'static` to `'w`, so copies of them hold the same
        // borrow and cannot outlive a release or a column reallocation.
        let views: &'w [TableView<'w>] =
            unsafe { std::slice::from_raw_parts(ptr.cast::<TableView<'w>>(), len) };
        Dataset::new(views, &data.properties)
    }

    /// Frees every dataset view handed out since the last release.
    pub fn release_datasets(&mut self) {
        self.views.get_mut().reset();
    }
}

#[cfg(test)]
mod tests {
    use strata_core::{PropertyFlags, PropertyId};

    use super::*;
    use crate::filter::FilterDesc;

    fn setup() -> (World, PropertyId, PropertyId, PropertyId) {
        let world = World::default();
        let a = world.register_property("A", 4, None, PropertyFlags::empty());
        let b = world.register_property("B", 4, None, PropertyFlags::empty());
        let c = world.register_property("C", 0, None, PropertyFlags::FLAG);
        (world, a, b, c)
    }

    fn spawn(world: &mut World, properties: &[PropertyId]) {
        let e = world.create_entity();
        world.instantiate(e, properties);
    }

    #[test]
    fn test_query_include_exclude() {
        let (mut world, a, b, c) = setup();
        spawn(&mut world, &[a]);
        spawn(&mut world, &[a, b]);
        spawn(&mut world, &[a, b, c]);

        let filter = world.create_filter(&FilterDesc::new().read(a).read(b).without(c));
        let ab = world.find_or_create_table(&[a, b]);
        let dataset = world.query(filter);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.views()[0].table(), ab);
        assert_eq!(dataset.num_rows(), 1);
    }

    #[test]
    fn test_query_skips_empty_tables() {
        let (mut world, a, b, _) = setup();
        spawn(&mut world, &[a]);
        world.find_or_create_table(&[a, b]);

        let filter = world.create_filter(&FilterDesc::new().read(a));
        let dataset = world.query(filter);
        assert_eq!(dataset.len(), 1);
        assert!(dataset.iter().all(|v| v.num_rows() > 0));
    }

    #[test]
    fn test_flag_property_has_no_buffer() {
        let (mut world, a, _, c) = setup();
        spawn(&mut world, &[a, c]);
        let filter = world.create_filter(&FilterDesc::new().read(c).write(a));
        let dataset = world.query(filter);
        let view = &dataset.views()[0];
        assert!(view.buffer(0).is_none());
        assert!(view.buffer(1).is_some());
        assert_eq!(view.column::<u32>(1), Some(&[0u32][..]));
    }

    #[test]
    fn test_column_mut_writes_through() {
        let (mut world, a, _, _) = setup();
        let e = world.create_entity();
        world.instantiate(e, &[a]);
        let filter = world.create_filter(&FilterDesc::new().write(a));
        {
            let dataset = world.query(filter);
            for view in dataset {
                // SAFETY: this test holds the only access to the column.
                let column = unsafe { view.column_mut::<u32>(0) }.unwrap();
                column[0] = 99;
            }
        }
        world.release_datasets();
        assert_eq!(world.get_property::<u32>(e, a), Some(99));
    }

    #[test]
    fn test_copied_view_reads_live_column() {
        let (mut world, a, _, _) = setup();
        let e = world.create_entity();
        world.instantiate(e, &[a]);
        world.set_property(e, a, 7u32);
        let filter = world.create_filter(&FilterDesc::new().read(a));

        let view = world.query(filter).views()[0];
        let _ = world.query(filter);
        assert_eq!(view.column::<u32>(0), Some(&[7u32][..]));
        world.release_datasets();
        assert_eq!(world.views.lock().used(), 0);
    }

    #[test]
    fn test_query_cached_prunes_stale_ids() {
        let (mut world, a, b, _) = setup();
        spawn(&mut world, &[a]);
        world.find_or_create_table(&[a, b]);

        let filter = world.create_filter(&FilterDesc::new().read(a));
        let mut cached = world.matching_tables(filter);
        assert_eq!(cached.len(), 2);

        world.prune_empty_tables();
        // The freed slot now holds a table the filter does not match.
        world.find_or_create_table(&[b]);

        let dataset = world.query_cached(&mut cached, filter);
        assert_eq!(dataset.len(), 1);
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn test_many_datasets_until_release() {
        let (mut world, a, _, _) = setup();
        spawn(&mut world, &[a]);
        let filter = world.create_filter(&FilterDesc::new().read(a));
        let first = world.query(filter);
        for _ in 0..1000 {
            let _ = world.query(filter);
        }
        assert_eq!(first.len(), 1);
        assert_eq!(first.views()[0].num_rows(), 1);
        world.release_datasets();
        assert_eq!(world.views.lock().used(), 0);
    }
}
