use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DEPFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/depfetch.toml";
const ENV_PREFIX: &str = "DEPFETCH";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_environment(&mut config);

    Ok(config)
}

/// Bucket and credentials only ever come from the environment
fn load_environment(config: &mut Config) {
    if let Ok(bucket) = env::var("S3_BUCKET")
        && !bucket.is_empty()
    {
        config.storage.bucket = Some(bucket);
    }

    config.storage.access_key = env::var("S3_ACCESS_KEY")
        .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
        .ok();
    config.storage.secret_key = env::var("S3_SECRET_KEY")
        .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
        .ok();
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // DEPFETCH__RESOLVER__MAX_CONCURRENCY -> resolver.max_concurrency
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.prefix, "clangci");
        assert_eq!(config.resolver.max_concurrency, 4);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
provider = "s3"
bucket = "s3://llvm-ci-artifacts"
region = "us-west-2"
pointer_threshold = "2KB"

[http]
max_retries = 5

[resolver]
max_concurrency = 8
fetch_timeout_secs = 120
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.provider, StorageProvider::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("s3://llvm-ci-artifacts"));
        assert_eq!(config.storage.pointer_threshold.as_u64(), 2048);
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.resolver.max_concurrency, 8);
        assert_eq!(config.resolver.fetch_timeout_secs, 120);
    }
}
