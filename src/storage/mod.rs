//! Object storage access for packaged build artifacts
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, PutPayload, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage client wrapping object_store, rooted at a key prefix
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    bucket: String,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
            bucket,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), "memory".to_string(), prefix)
    }

    /// Build the backend selected by the storage settings.
    ///
    /// The bucket may be given as `s3://name/extra/prefix`; path segments after
    /// the bucket name are prepended to the configured key prefix.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::S3 => {
                let raw = config.bucket.as_deref().ok_or_else(|| {
                    StorageError::Misconfigured("no bucket configured".to_string())
                })?;
                let (bucket, prefix) = split_bucket(raw, &config.prefix);
                if bucket.is_empty() {
                    return Err(StorageError::Misconfigured(format!("invalid bucket '{raw}'")));
                }

                let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }
                if let (Some(access_key), Some(secret_key)) =
                    (&config.access_key, &config.secret_key)
                {
                    builder = builder
                        .with_access_key_id(access_key)
                        .with_secret_access_key(secret_key);
                }

                Ok(Self::new(Arc::new(builder.build()?), bucket, prefix))
            }
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root).map_err(|source| StorageError::Io {
                    path: config.root.display().to_string(),
                    source,
                })?;
                let store = LocalFileSystem::new_with_prefix(&config.root)?;
                let bucket = config
                    .bucket
                    .clone()
                    .unwrap_or_else(|| config.root.display().to_string());
                Ok(Self::new(Arc::new(store), bucket, config.prefix.clone()))
            }
            StorageProvider::Memory => Ok(Self::in_memory(config.prefix.clone())),
        }
    }

    /// Full object key for an artifact path relative to the prefix
    pub fn key(&self, artifact: &str) -> String {
        let artifact = artifact.trim().trim_start_matches('/');
        if self.prefix.is_empty() {
            artifact.to_string()
        } else {
            format!("{}/{}", self.prefix, artifact)
        }
    }

    /// Store bytes under an artifact path
    pub async fn upload(&self, artifact: &str, data: impl Into<Bytes>) -> Result<()> {
        let key = self.key(artifact);
        let data = data.into();
        let size = data.len();

        self.store
            .put(&StoragePath::from(key.as_str()), PutPayload::from(data))
            .await?;

        tracing::info!(key, size, "Uploaded to storage");
        Ok(())
    }

    /// Stream an artifact into a local file, replacing it if present.
    ///
    /// Returns the number of bytes written.
    pub async fn download_to(&self, artifact: &str, dest: &Path) -> Result<u64> {
        let key = self.key(artifact);

        let result = match self.store.get(&StoragePath::from(key.as_str())).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Err(StorageError::NotFound(key)),
            Err(e) => return Err(e.into()),
        };

        let io_err = |source| StorageError::Io {
            path: dest.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut stream = result.into_stream();
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;

        tracing::info!(key, size, dest = %dest.display(), "Downloaded from storage");
        Ok(size)
    }
}

fn split_bucket(raw: &str, prefix: &str) -> (String, String) {
    let trimmed = raw.trim().trim_start_matches("s3://").trim_matches('/');
    let (bucket, extra) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    let prefix = [extra.trim_matches('/'), prefix.trim_matches('/')]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    (bucket.to_string(), prefix)
}
