//! # Identity Pool
//!
//! Hands out entity ids and recycles their indices. Every reuse bumps the
//! slot's generation, so ids kept past a delete stop validating.

use std::collections::VecDeque;

use crate::entity::{EntityId, MAX_INDEX};

/// Allocator of entity ids for one partition.
pub struct IdentityPool {
    /// Current generation per index.
    generations: Vec<u8>,
    /// Liveness per index.
    alive: Vec<bool>,
    /// Freed indices, oldest first.
    free: VecDeque<u32>,
    partition: u8,
    min_free_before_reuse: usize,
    live: usize,
}

impl IdentityPool {
    /// Creates a pool for `partition`.
    ///
    /// An index is only recycled once more than `min_free_before_reuse`
    /// indices are waiting, which spreads generation bumps over more slots.
    #[must_use]
    pub fn new(partition: u8, min_free_before_reuse: usize) -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free: VecDeque::new(),
            partition,
            min_free_before_reuse,
            live: 0,
        }
    }

    /// Reserves room for `additional` more indices.
    pub fn reserve(&mut self, additional: usize) {
        self.generations.reserve(additional);
        self.alive.reserve(additional);
    }

    /// Partition stamped into every id.
    #[inline]
    #[must_use]
    pub fn partition(&self) -> u8 {
        self.partition
    }

    /// Number of live ids.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Checks if no id is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of indices ever handed out (live or free).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Allocates an id, recycling the oldest freed index when allowed.
    ///
    /// # Panics
    ///
    /// Panics if the 22-bit index space is exhausted.
    pub fn allocate(&mut self) -> EntityId {
        self.live += 1;

        if self.free.len() > self.min_free_before_reuse {
            if let Some(index) = self.free.pop_front() {
                let slot = index as usize;
                let generation = self.generations[slot].wrapping_add(1);
                self.generations[slot] = generation;
                self.alive[slot] = true;
                return EntityId::new(index, generation, self.partition);
            }
        }

        let index = self.generations.len() as u32;
        assert!(
            index < MAX_INDEX,
            "Entity index space exhausted ({MAX_INDEX} ids)"
        );
        self.generations.push(0);
        self.alive.push(true);
        EntityId::new(index, 0, self.partition)
    }

    /// Returns an id's index to the free list.
    ///
    /// The generation is bumped when the index is next allocated.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not valid.
    pub fn deallocate(&mut self, id: EntityId) {
        assert!(self.is_valid(id), "Cannot deallocate invalid entity {id}");
        self.alive[id.index() as usize] = false;
        self.free.push_back(id.index());
        self.live -= 1;
    }

    /// Checks partition, index range, liveness and generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, id: EntityId) -> bool {
        if id.partition() != self.partition {
            return false;
        }
        let slot = id.index() as usize;
        slot < self.generations.len()
            && self.alive[slot]
            && self.generations[slot] == id.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sequential() {
        let mut pool = IdentityPool::new(0, 0);
        let a = pool.allocate();
        let b = pool.allocate();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut pool = IdentityPool::new(0, 0);
        let old = pool.allocate();
        pool.deallocate(old);
        let new = pool.allocate();

        assert_eq!(new.index(), old.index());
        assert!(new.generation() > old.generation());
        assert!(!pool.is_valid(old));
        assert!(pool.is_valid(new));
    }

    #[test]
    fn test_deallocated_id_is_invalid_immediately() {
        let mut pool = IdentityPool::new(0, 0);
        let id = pool.allocate();
        pool.deallocate(id);
        assert!(!pool.is_valid(id));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_min_free_delays_reuse() {
        let mut pool = IdentityPool::new(0, 2);
        let ids: Vec<_> = (0..3).map(|_| pool.allocate()).collect();
        pool.deallocate(ids[0]);
        pool.deallocate(ids[1]);

        // Two queued, threshold two: grow instead.
        assert_eq!(pool.allocate().index(), 3);

        pool.deallocate(ids[2]);
        // Three queued: the oldest comes back first.
        assert_eq!(pool.allocate().index(), ids[0].index());
    }

    #[test]
    fn test_generation_wraps() {
        let mut pool = IdentityPool::new(0, 0);
        let mut id = pool.allocate();
        for _ in 0..256 {
            pool.deallocate(id);
            id = pool.allocate();
        }
        assert_eq!(id.index(), 0);
        assert_eq!(id.generation(), 0);
    }

    #[test]
    fn test_foreign_partition_is_invalid() {
        let mut pool = IdentityPool::new(1, 0);
        let id = pool.allocate();
        assert_eq!(id.partition(), 1);
        assert!(!pool.is_valid(EntityId::new(id.index(), id.generation(), 0)));
    }

    #[test]
    #[should_panic(expected = "Cannot deallocate invalid entity")]
    fn test_double_deallocate_panics() {
        let mut pool = IdentityPool::new(0, 0);
        let id = pool.allocate();
        pool.deallocate(id);
        pool.deallocate(id);
    }
}
