//! # Registry Error Types
//!
//! Failures that can occur while registering property types.
//!
//! Everything else in the store treats misuse as a contract violation and
//! panics. Registration is the one place where a caller (for example a
//! tooling layer loading property declarations) may want to inspect the
//! failure instead of aborting.

use thiserror::Error;

use crate::memdb::PropertyId;

/// Errors that can occur when registering a property type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A property with this name is already registered.
    #[error("cannot register two properties named '{name}' (existing id {existing})")]
    DuplicateName {
        /// The offending name.
        name: String,
        /// Id of the property already registered under that name.
        existing: PropertyId,
    },

    /// The registry has handed out every id its signatures can address.
    #[error("property limit reached: {limit} properties already registered")]
    TooManyProperties {
        /// Maximum number of properties.
        limit: usize,
    },

    /// The default value does not match the declared byte size.
    #[error("default value for '{name}' is {actual} bytes, expected {expected}")]
    DefaultSizeMismatch {
        /// The property name.
        name: String,
        /// Declared byte size.
        expected: usize,
        /// Length of the supplied default value.
        actual: usize,
    },

    /// A flag-only property was declared with storage.
    #[error("flag property '{name}' cannot carry {size} bytes of storage")]
    FlagWithStorage {
        /// The property name.
        name: String,
        /// Declared byte size.
        size: usize,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
