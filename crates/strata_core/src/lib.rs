//! # STRATA Core
//!
//! The table store underneath the STRATA entity-component layer:
//! - A type registry describing every property once
//! - Archetype tables keyed by the exact set of properties a row owns
//! - Raw column buffers for branch-free batch iteration
//! - Bump arenas and generational pools for per-frame scratch data
//!
//! ## Architecture Rules
//!
//! 1. **One table per signature** - callers look up before they create
//! 2. **Rows are not stable** - removal is swap-with-last
//! 3. **Misuse aborts** - invalid ids are contract violations, absence is `None`
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{Database, PropertyFlags, Registry, TableSignature};
//!
//! let registry = Registry::new();
//! let full = 100u32.to_le_bytes();
//! let health = registry.register("Health", 4, Some(&full), PropertyFlags::empty());
//!
//! let mut db = Database::new(registry);
//! let table = db.create_table(&[health]);
//! let row = db.append_row(table);
//!
//! assert_eq!(db.table(table).value(health, row), Some(&100u32.to_le_bytes()[..]));
//! assert_eq!(db.find_table(&TableSignature::from_properties(&[health])), Some(table));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memdb;
pub mod memory;

pub use error::{RegistryError, RegistryResult};
pub use memdb::{
    Column, Database, Property, PropertyDescription, PropertyFlags, PropertyId, Registry,
    Table, TableId, TableSignature, TypeRegistry, MAX_PROPERTIES,
};
pub use memory::{Arena, ArenaSlice, PoolAllocator, PoolHandle};
