//! # Entity Identifiers
//!
//! An entity id packs three fields into 32 bits:
//!
//! ```text
//!  31  30 29          22 21                          0
//! +------+--------------+-----------------------------+
//! | part |  generation  |            index            |
//! +------+--------------+-----------------------------+
//! ```
//!
//! - `index` addresses a slot in the identity pool
//! - `generation` invalidates handles kept past a slot's reuse
//! - `partition` separates worlds sharing the id space

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Bits used by the index field.
pub const INDEX_BITS: u32 = 22;
/// Bits used by the generation field.
pub const GENERATION_BITS: u32 = 8;
/// Bits used by the partition field.
pub const PARTITION_BITS: u32 = 2;

/// Largest index an id can carry.
pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;
/// Largest partition id.
pub const MAX_PARTITION: u8 = (1 << PARTITION_BITS) - 1;

const INDEX_MASK: u32 = MAX_INDEX;
const GENERATION_SHIFT: u32 = INDEX_BITS;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;
const PARTITION_SHIFT: u32 = INDEX_BITS + GENERATION_BITS;

/// Unique identifier for an entity.
///
/// Equality and ordering compare the packed bits. The id is plain data and
/// is stored as-is in every table's owner column.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Null/invalid entity id.
    pub const INVALID: Self = Self(u32::MAX);

    /// Packs an id.
    ///
    /// # Panics
    ///
    /// Panics if `index` or `partition` does not fit its field.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u8, partition: u8) -> Self {
        assert!(index <= MAX_INDEX, "Entity index does not fit in 22 bits");
        assert!(partition <= MAX_PARTITION, "Partition does not fit in 2 bits");
        Self(
            ((partition as u32) << PARTITION_SHIFT)
                | ((generation as u32) << GENERATION_SHIFT)
                | index,
        )
    }

    /// Reinterprets raw packed bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The packed bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Slot index in the identity pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Generation of the slot when this id was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u8 {
        ((self.0 >> GENERATION_SHIFT) & GENERATION_MASK) as u8
    }

    /// Partition (world) the id belongs to.
    #[inline]
    #[must_use]
    pub const fn partition(self) -> u8 {
        (self.0 >> PARTITION_SHIFT) as u8
    }

    /// Checks if this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            return f.write_str("EntityId(INVALID)");
        }
        write!(
            f,
            "EntityId({}v{}p{})",
            self.index(),
            self.generation(),
            self.partition()
        )
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
