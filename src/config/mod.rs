//! Configuration management for depfetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use depfetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Fetching with up to {} workers", config.resolver.max_concurrency);
//! ```
//!
//! # Environment Variables
//!
//! Settings can be overridden using environment variables with the pattern
//! `DEPFETCH__<section>__<key>`, e.g.:
//! - `DEPFETCH__RESOLVER__MAX_CONCURRENCY=8`
//! - `DEPFETCH__STORAGE__PROVIDER=s3`
//! - `DEPFETCH__STORAGE__POINTER_THRESHOLD=2KB`
//!
//! The artifact bucket is read from `S3_BUCKET`, and credentials from
//! `S3_ACCESS_KEY`/`S3_SECRET_KEY` (or the `AWS_*` equivalents).
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/depfetch.toml`.
//! This can be overridden using the `DEPFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, HttpConfig, ResolverConfig, StorageConfig, StorageProvider};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation (zero limits, a blank bucket).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[resolver]\nmax_concurrency = 2\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.resolver.max_concurrency, 2);
        assert_eq!(config.storage.provider, StorageProvider::S3);
    }

    #[test]
    fn test_validation_catches_blank_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[storage]\nprovider = \"s3\"\nbucket = \"\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::EmptyBucket)
        ));
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[resolver]\nmax_concurrency = \"many\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::LoadError(_)));
    }
}
