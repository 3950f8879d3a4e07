//! # Pool Allocator
//!
//! Slot allocator with generation-checked handles, for objects that are
//! frequently created and released (op buffers, filters).

/// A pool allocator for objects of one type.
///
/// Freed slots are recycled. Every free bumps the slot's generation, so a
/// handle kept past its release no longer resolves.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust
/// use strata_core::PoolAllocator;
///
/// let mut pool: PoolAllocator<u32> = PoolAllocator::new();
///
/// let handle = pool.allocate(7);
/// assert_eq!(pool.get(handle), Some(&7));
///
/// pool.free(handle);
/// assert!(pool.get(handle).is_none());
/// ```
pub struct PoolAllocator<T> {
    /// The slot array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of allocated objects.
    allocated_count: usize,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Handle to an allocated object in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: u32,
    /// Generation of the slot when the handle was issued.
    generation: u32,
}

impl PoolHandle {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> PoolAllocator<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a pool with room for `capacity` objects before it grows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            allocated_count: 0,
        }
    }

    /// Returns the number of currently allocated objects.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots waiting to be recycled.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Allocates a slot and stores the object.
    ///
    /// Recycles a freed slot when one is available, otherwise grows the pool.
    pub fn allocate(&mut self, value: T) -> PoolHandle {
        self.allocated_count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return PoolHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("Pool exhausted: more than {} live slots", u32::MAX)
        });
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });

        PoolHandle {
            index,
            generation: 0,
        }
    }

    /// Frees an allocated object.
    ///
    /// # Returns
    ///
    /// The freed object, or None if the handle was stale or foreign.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        self.free_list.push(handle.index);
        self.allocated_count -= 1;

        Some(value)
    }

    /// Checks whether a handle still refers to a live object.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to an allocated object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to an allocated object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    /// Iterates over all allocated objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    PoolHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    fn slot_mut(&mut self, handle: PoolHandle) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation).then_some(slot)
    }
}

impl<T> Default for PoolAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocate_free() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new();

        let h1 = pool.allocate(42);
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.allocated_count(), 1);

        let freed = pool.free(h1).unwrap();
        assert_eq!(freed, 42);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_pool_reuse_bumps_generation() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::with_capacity(1);

        let h1 = pool.allocate(1);
        pool.free(h1);

        let h2 = pool.allocate(2);
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(pool.get(h1).is_none());
        assert_eq!(*pool.get(h2).unwrap(), 2);
    }

    #[test]
    fn test_pool_double_free() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new();
        let h = pool.allocate(3);
        assert_eq!(pool.free(h), Some(3));
        assert_eq!(pool.free(h), None);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_pool_iter_skips_freed() {
        let mut pool: PoolAllocator<&str> = PoolAllocator::new();
        let a = pool.allocate("a");
        let _b = pool.allocate("b");
        pool.free(a);

        let live: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec!["b"]);
    }
}
