//! # Arena Allocator
//!
//! A chunked bump allocator for per-frame allocations that are freed all at once.

/// Handle to a run of elements allocated from an [`Arena`].
///
/// Only meaningful for the arena that produced it, and only until that
/// arena is reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaSlice {
    chunk: u32,
    start: u32,
    len: u32,
}

impl ArenaSlice {
    /// Number of elements in the slice.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    /// Checks if the slice is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// A bump-pointer arena allocator.
///
/// Allocations bump an offset inside the current chunk. When a chunk runs
/// out of room a new one is appended; existing chunks are never reallocated,
/// so everything handed out stays at the same address until [`Arena::reset`].
///
/// There is no per-allocation free. Memory is released all at once by
/// `reset`, which keeps the chunks around for the next frame.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Wrap it in a mutex to share it.
///
/// # Example
///
/// ```rust
/// use strata_core::Arena;
///
/// let mut arena: Arena<u8> = Arena::new(1024);
/// let slice = arena.alloc_slice(&[1, 2, 3]);
/// assert_eq!(arena.get(slice), &[1, 2, 3]);
///
/// // Free everything at once
/// arena.reset();
/// assert_eq!(arena.used(), 0);
/// ```
pub struct Arena<T> {
    /// Backing chunks. A chunk never grows past its initial capacity.
    chunks: Vec<Vec<T>>,
    /// Chunk that receives the next allocation.
    current: usize,
    /// Capacity of a freshly created chunk, in elements.
    chunk_len: usize,
    /// Elements handed out since the last reset.
    used: usize,
}

impl<T: Copy> Arena<T> {
    /// Creates a new arena whose chunks hold `chunk_len` elements.
    ///
    /// No memory is reserved until the first allocation.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_len` is zero.
    #[must_use]
    pub fn new(chunk_len: usize) -> Self {
        assert!(chunk_len > 0, "Arena chunk length must be greater than zero");
        Self {
            chunks: Vec::new(),
            current: 0,
            chunk_len,
            used: 0,
        }
    }

    /// Returns the number of elements allocated since the last reset.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Returns the total number of elements the arena can hold without
    /// creating another chunk.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.iter().map(Vec::capacity).sum()
    }

    /// Copies `items` into the arena.
    pub fn alloc_slice(&mut self, items: &[T]) -> ArenaSlice {
        self.alloc_iter(items.len(), items.iter().copied())
    }

    /// Moves up to `max_len` items into one contiguous run.
    ///
    /// `max_len` room is reserved up front; the returned slice covers only
    /// the items actually produced.
    ///
    /// # Panics
    ///
    /// Panics if `items` yields more than `max_len` elements.
    pub fn alloc_iter<I>(&mut self, max_len: usize, items: I) -> ArenaSlice
    where
        I: IntoIterator<Item = T>,
    {
        let chunk_index = self.reserve(max_len);
        let chunk = &mut self.chunks[chunk_index];
        let start = chunk.len();

        for item in items {
            assert!(
                chunk.len() - start < max_len,
                "Arena allocation produced more than the {max_len} reserved elements"
            );
            chunk.push(item);
        }

        let len = chunk.len() - start;
        self.used += len;

        ArenaSlice {
            chunk: chunk_index as u32,
            start: start as u32,
            len: len as u32,
        }
    }

    /// Returns the elements behind `slice`.
    ///
    /// # Panics
    ///
    /// Panics if `slice` does not belong to the current arena frame.
    #[inline]
    #[must_use]
    pub fn get(&self, slice: ArenaSlice) -> &[T] {
        let start = slice.start as usize;
        &self.chunks[slice.chunk as usize][start..start + slice.len()]
    }

    /// Returns the elements behind `slice` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `slice` does not belong to the current arena frame.
    #[inline]
    pub fn get_mut(&mut self, slice: ArenaSlice) -> &mut [T] {
        let start = slice.start as usize;
        &mut self.chunks[slice.chunk as usize][start..start + slice.len()]
    }

    /// Resets the arena, invalidating all previous allocations.
    ///
    /// Chunks keep their capacity, so a steady-state frame does not allocate.
    pub fn reset(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
        self.current = 0;
        self.used = 0;
    }

    /// Finds a chunk with room for `len` more elements, creating one if needed.
    fn reserve(&mut self, len: usize) -> usize {
        while let Some(chunk) = self.chunks.get(self.current) {
            if chunk.capacity() - chunk.len() >= len {
                return self.current;
            }
            self.current += 1;
        }

        self.chunks.push(Vec::with_capacity(self.chunk_len.max(len)));
        self.current = self.chunks.len() - 1;
        self.current
    }
}
