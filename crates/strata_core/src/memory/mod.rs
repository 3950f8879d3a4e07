//! # Memory Management
//!
//! Arenas and pools backing the per-frame parts of the store.
//!
//! ## Design Philosophy
//!
//! Anything that lives for exactly one frame comes from an arena:
//! - Op payloads copied at enqueue time
//! - Dataset views returned by queries
//!
//! Arenas are reset in bulk, never freed per allocation. Handles that are
//! created and released individually (op buffers, filters) come from a pool
//! with generation-checked handles.

mod arena;
mod pool;

pub use arena::{Arena, ArenaSlice};
pub use pool::{PoolAllocator, PoolHandle};
