//! # World Configuration
//!
//! Sizing knobs for a [`World`](crate::World), loaded once at startup from
//! TOML. Every field has a default, so an empty file is a valid config.
//!
//! ```toml
//! partition = 1
//! initial_entity_capacity = 4096
//! min_free_before_reuse = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entity::MAX_PARTITION;
use crate::error::{ConfigError, ConfigResult};

/// Configuration of one world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Partition id stamped into every entity id (0..=3).
    pub partition: u8,
    /// Entity slots reserved up front.
    pub initial_entity_capacity: usize,
    /// Freed indices kept queued before one is recycled.
    pub min_free_before_reuse: usize,
    /// Chunk size of the op payload scratch arena, in bytes.
    pub scratch_chunk_bytes: usize,
    /// Chunk length of the dataset view arena, in views.
    pub view_chunk_len: usize,
    /// Row capacity of a freshly created table.
    pub initial_table_rows: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            partition: 0,
            initial_entity_capacity: 1024,
            min_free_before_reuse: 0,
            scratch_chunk_bytes: 64 * 1024,
            view_chunk_len: 256,
            initial_table_rows: strata_core::memdb::DEFAULT_TABLE_ROWS,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`WorldConfig::from_toml_str`].
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.partition > MAX_PARTITION {
            return Err(ConfigError::Invalid(format!(
                "partition {} exceeds {MAX_PARTITION}",
                self.partition
            )));
        }
        if self.scratch_chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "scratch_chunk_bytes must be greater than zero".into(),
            ));
        }
        if self.view_chunk_len == 0 {
            return Err(ConfigError::Invalid(
                "view_chunk_len must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
