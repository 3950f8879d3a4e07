//! # Memory Database
//!
//! Columnar storage of property values, grouped into archetype tables.
//!
//! ## Layers
//!
//! - [`TypeRegistry`]: property names, sizes, defaults and flags
//! - [`TableSignature`]: bitset identity of a property set
//! - [`Table`]: one column per non-flag property, swap-remove rows
//! - [`Database`]: every table, indexed by signature

mod column;
mod database;
mod registry;
mod signature;
mod table;

pub use column::Column;
pub use database::{Database, DEFAULT_TABLE_ROWS};
pub use registry::{
    Property, PropertyDescription, PropertyFlags, PropertyId, Registry, TypeRegistry,
    COLUMN_ALIGN,
};
pub use signature::{TableSignature, MAX_PROPERTIES, SIGNATURE_WORDS};
pub use table::{Table, TableId};
