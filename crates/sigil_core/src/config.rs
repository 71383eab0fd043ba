//! # Store Configuration
//!
//! Capacities are fixed when a store is created. They can be given in
//! code or loaded once at startup from a TOML file:
//!
//! ```toml
//! max_entities = 100000
//! max_component_types = 64
//! dense_capacity_hint = 4096
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::MAX_COMPONENT_TYPES;
use crate::error::{StoreError, StoreResult};

/// Default entity capacity.
pub const DEFAULT_MAX_ENTITIES: u32 = 1024;

/// Fixed capacities of a [`Store`](crate::Store).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Upper bound on entity ids; also the length of every sparse array.
    pub max_entities: u32,
    /// Upper bound on distinct component types (at most 512).
    pub max_component_types: u16,
    /// Dense slots reserved up front in every new pool.
    pub dense_capacity_hint: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            // 512 fits u16
            max_component_types: MAX_COMPONENT_TYPES as u16,
            dense_capacity_hint: 0,
        }
    }
}

impl StoreConfig {
    /// Creates a config with the given entity capacity and defaults elsewhere.
    #[must_use]
    pub fn with_max_entities(max_entities: u32) -> Self {
        Self {
            max_entities,
            ..Self::default()
        }
    }

    /// Checks the capacities.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the entity capacity is zero
    /// or the component type limit is outside `1..=512`.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_entities == 0 {
            return Err(StoreError::InvalidConfig(
                "max_entities must be greater than zero".to_string(),
            ));
        }
        if self.max_entities == u32::MAX {
            // u32::MAX is the pools' absent marker
            return Err(StoreError::InvalidConfig(format!(
                "max_entities must be below {}",
                u32::MAX
            )));
        }
        if self.max_component_types == 0 || usize::from(self.max_component_types) > MAX_COMPONENT_TYPES {
            return Err(StoreError::InvalidConfig(format!(
                "max_component_types must be in 1..={MAX_COMPONENT_TYPES}, got {}",
                self.max_component_types
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] on malformed TOML, unknown
    /// keys, or invalid values.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the file cannot be read or
    /// its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert_eq!(config.max_entities, 1024);
        assert_eq!(config.max_component_types, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StoreConfig::from_toml_str("max_entities = 50000\n").unwrap();
        assert_eq!(config.max_entities, 50_000);
        assert_eq!(config.max_component_types, 512);
        assert_eq!(config.dense_capacity_hint, 0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            StoreConfig::from_toml_str("max_entities = 0"),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("max_component_types = 513"),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("max_entitys = 10"),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("max_entities = \"many\""),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("sigil_store_config_{id}.toml"));
        std::fs::write(&path, "max_entities = 64\nmax_component_types = 8\n").unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config, StoreConfig {
            max_entities: 64,
            max_component_types: 8,
            dense_capacity_hint: 0,
        });

        std::fs::remove_file(&path).ok();
        assert!(StoreConfig::from_file(&path).is_err());
    }
}
