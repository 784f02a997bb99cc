use super::models::{Config, StorageProvider};
use thiserror::Error;

/// Upper bound for `http.max_retries`; with a capped backoff this is already
/// several minutes of waiting per download
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Storage bucket is set but empty")]
    EmptyBucket,

    #[error("pointer_threshold must be positive")]
    InvalidPointerThreshold,

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_storage(config)?;
    validate_http(config)?;
    validate_resolver(config)?;
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    // An S3 provider without any bucket only disables the artifact handler
    let bucket_blank = config
        .storage
        .bucket
        .as_deref()
        .is_some_and(|bucket| bucket.trim().is_empty());
    if config.storage.provider == StorageProvider::S3 && bucket_blank {
        return Err(ValidationError::EmptyBucket);
    }

    if config.storage.pointer_threshold.as_u64() == 0 {
        return Err(ValidationError::InvalidPointerThreshold);
    }

    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.max_retries == 0 {
        return Err(ValidationError::NotPositive { field: "http.max_retries" });
    }
    if config.http.max_retries > MAX_RETRIES {
        return Err(ValidationError::TooLarge {
            field: "http.max_retries",
            max: MAX_RETRIES.into(),
        });
    }
    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "http.request_timeout_secs",
        });
    }
    Ok(())
}

fn validate_resolver(config: &Config) -> Result<(), ValidationError> {
    if config.resolver.max_concurrency == 0 {
        return Err(ValidationError::NotPositive {
            field: "resolver.max_concurrency",
        });
    }
    if config.resolver.fetch_timeout_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "resolver.fetch_timeout_secs",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_s3_bucket() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::S3;
        assert!(validate(&config).is_ok());

        config.storage.bucket = Some("  ".to_string());
        assert!(matches!(validate(&config), Err(ValidationError::EmptyBucket)));

        config.storage.bucket = Some("llvm-ci".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_pointer_threshold() {
        let mut config = Config::default();
        config.storage.pointer_threshold = ByteSize(0);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidPointerThreshold)
        ));
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.resolver.max_concurrency = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NotPositive {
                field: "resolver.max_concurrency"
            })
        ));
    }

    #[test]
    fn test_zero_retries() {
        let mut config = Config::default();
        config.http.max_retries = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NotPositive { .. })
        ));
    }

    #[test]
    fn test_too_many_retries() {
        let mut config = Config::default();
        config.http.max_retries = MAX_RETRIES;
        assert!(validate(&config).is_ok());

        config.http.max_retries = 40;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooLarge {
                field: "http.max_retries",
                max: 10
            })
        ));
    }
}
