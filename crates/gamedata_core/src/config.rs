//! # Storage Configuration
//!
//! Sizing parameters for slot tables and allocators, loaded once at startup
//! from TOML.
//!
//! ```toml
//! initial_capacity = 4096
//! page_size = 256
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

/// Default number of rows per slot table page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Sizing configuration shared by slot tables and allocators.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Rows reserved up front (rounded up to whole pages).
    pub initial_capacity: usize,
    /// Number of rows per slot table page.
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorageConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the text is not valid TOML,
    /// contains unknown keys, or fails [`StorageConfig::validate`].
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StorageError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the file cannot be read or
    /// its content is rejected by [`StorageConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if `page_size` is zero.
    pub fn validate(&self) -> StorageResult<()> {
        if self.page_size == 0 {
            return Err(StorageError::InvalidConfig(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = StorageConfig::from_toml_str("initial_capacity = 64").unwrap();
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);

        let empty = StorageConfig::from_toml_str("").unwrap();
        assert_eq!(empty, StorageConfig::default());
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = StorageConfig::from_toml_str("page_size = 0").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(StorageConfig::from_toml_str("pages = 4").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StorageConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }
}
