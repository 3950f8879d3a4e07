//! # STRATA
//!
//! An in-process entity-component store organized as archetype tables:
//! - Entity ids with generations, safe to keep across deletes
//! - One table per exact property set, one column per property
//! - Structural changes buffered and applied at dispatch points
//! - Filters resolved into datasets of raw column views
//!
//! ## Frame Discipline
//!
//! 1. **Query** - systems read and write columns through datasets
//! 2. **Queue** - structural changes go into op buffers, never applied mid-iteration
//! 3. **Dispatch** - buffers are applied, rows migrate between tables
//! 4. **Release** - dataset views and op scratch are freed in bulk
//!
//! ## Example
//!
//! ```rust
//! use strata::{AddProperty, FilterDesc, PropertyFlags, World};
//!
//! let mut world = World::default();
//! let position = world.register_property("Position", 12, None, PropertyFlags::empty());
//! let velocity = world.register_property("Velocity", 12, None, PropertyFlags::empty());
//!
//! let entity = world.create_entity();
//! world.instantiate(entity, &[position]);
//!
//! let buffer = world.create_op_buffer();
//! world.add_op(&buffer, AddProperty::new(entity, velocity).with_pod(&[1.0f32, 2.0, 3.0]));
//! world.dispatch(buffer);
//!
//! let moving = world.create_filter(&FilterDesc::new().write(position).read(velocity));
//! assert_eq!(world.query(moving).num_rows(), 1);
//!
//! world.release_datasets();
//! world.release_scratch();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dataset;
pub mod entity;
pub mod error;
pub mod filter;
pub mod identity;
mod migration;
pub mod ops;
mod query;
pub mod world;

pub use config::WorldConfig;
pub use dataset::{Dataset, TableView};
pub use entity::EntityId;
pub use error::{ConfigError, ConfigResult};
pub use filter::{AccessMode, Filter, FilterDesc, MAX_FILTER_PROPERTIES};
pub use identity::IdentityPool;
pub use ops::{AddProperty, OpBuffer, RemoveProperty, StructuralOp};
pub use world::{EntityMapping, World, OWNER_PROPERTY};

pub use strata_core::{
    Property, PropertyDescription, PropertyFlags, PropertyId, Registry, RegistryError, TableId,
    TableSignature, TypeRegistry,
};
