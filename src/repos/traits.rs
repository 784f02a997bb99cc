use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::types::{DependencyConfig, ReproFragment};
use crate::fetch::{ArchiveError, CommandError, DownloadError};
use crate::storage::StorageError;

/// Handler errors
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("could not resolve latest revision: {0}")]
    Resolve(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("invalid artifact pointer: {0}")]
    InvalidPointer(String),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("download: {0}")]
    Download(#[from] DownloadError),

    #[error("extract: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl HandlerError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn missing_key(key: &str) -> Self {
        Self::Config(format!("No '{key}' specified"))
    }
}

/// Contract every dependency-source backend implements.
///
/// Handlers hold no per-dependency state: the config and destination are
/// passed to every call, so one instance serves concurrent resolutions.
#[async_trait]
pub trait RepoHandler: Send + Sync {
    /// Check required keys. Must not perform I/O.
    fn verify(&self, config: &DependencyConfig) -> Result<(), HandlerError>;

    /// Pin volatile references (e.g. a branch name) to a stable identifier.
    /// Concrete configs come back unchanged.
    async fn resolve_latest(
        &self,
        config: DependencyConfig,
    ) -> Result<DependencyConfig, HandlerError>;

    /// Materialize the dependency under `dest_dir`. Running it twice leaves
    /// the same content as running it once.
    async fn get_artifact(
        &self,
        config: &DependencyConfig,
        dest_dir: &Path,
    ) -> Result<(), HandlerError>;

    /// Describe how to fetch exactly this state again. Never fails; returns
    /// [`ReproFragment::Unknown`] when the state cannot be classified.
    async fn repro_arg(&self, config: &DependencyConfig, dest_dir: &Path) -> ReproFragment;
}

/// Shared `verify` for handlers keyed by a `url` field
pub(crate) fn require_url(config: &DependencyConfig) -> Result<&str, HandlerError> {
    match config.url() {
        Some(url) if !url.trim().is_empty() => Ok(url),
        Some(_) => Err(HandlerError::Config("'url' is empty".to_string())),
        None => Err(HandlerError::missing_key("url")),
    }
}
