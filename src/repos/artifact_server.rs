//! Packaged artifact from the artifact store
//!
//! The `url` is a path relative to the store prefix:
//!
//! ```json
//! "compiler": {"type": "artifact_server", "url": "clang-stage1/latest.tar.gz"}
//! ```
//!
//! A stored object smaller than the pointer threshold is not an archive but a
//! pointer: its content names the object to fetch instead. Pointers are
//! followed exactly one hop, so a pointer to a pointer is never chased.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::traits::{HandlerError, RepoHandler, require_url};
use super::types::{DependencyConfig, ReproFragment};
use crate::config::StorageConfig;
use crate::fetch::{archive, staging_file};
use crate::storage::StorageClient;

#[derive(Debug, Clone)]
pub struct ArtifactServerHandler {
    storage: StorageClient,
    pointer_threshold: u64,
}

impl ArtifactServerHandler {
    pub fn new(storage: StorageClient, pointer_threshold: u64) -> Self {
        Self {
            storage,
            pointer_threshold,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, HandlerError> {
        let storage = StorageClient::from_config(config)?;
        Ok(Self::new(storage, config.pointer_threshold.as_u64()))
    }

    /// Download `url` to `local`, replacing it with the pointer target when
    /// the object is a pointer.
    async fn fetch_object(&self, url: &str, local: &Path) -> Result<(), HandlerError> {
        let size = self.storage.download_to(url, local).await?;
        if size >= self.pointer_threshold {
            return Ok(());
        }

        let content = tokio::fs::read(local)
            .await
            .map_err(|e| HandlerError::io(local, e))?;
        let target = std::str::from_utf8(&content)
            .map(str::trim)
            .map_err(|_| HandlerError::InvalidPointer(format!("'{url}' is not valid UTF-8")))?;
        if target.is_empty() {
            return Err(HandlerError::InvalidPointer(format!("'{url}' is empty")));
        }

        info!(url, target, size, "Following artifact pointer");
        let size = self.storage.download_to(target, local).await?;
        debug!(target, size, "Fetched pointer target");
        Ok(())
    }
}

#[async_trait]
impl RepoHandler for ArtifactServerHandler {
    fn verify(&self, config: &DependencyConfig) -> Result<(), HandlerError> {
        require_url(config).map(|_| ())
    }

    async fn resolve_latest(
        &self,
        config: DependencyConfig,
    ) -> Result<DependencyConfig, HandlerError> {
        Ok(config)
    }

    async fn get_artifact(
        &self,
        config: &DependencyConfig,
        dest_dir: &Path,
    ) -> Result<(), HandlerError> {
        let url = require_url(config)?;

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| HandlerError::io(dest_dir, e))?;

        let local = staging_file(dest_dir).map_err(|e| HandlerError::io(dest_dir, e))?;
        self.fetch_object(url, &local).await?;
        archive::unpack_blocking(local.to_path_buf(), dest_dir.to_path_buf()).await?;

        local.close().map_err(|e| HandlerError::io(dest_dir, e))
    }

    /// Always the configured url, never the pointer target, so replaying it
    /// follows whatever the pointer names at that time.
    async fn repro_arg(&self, config: &DependencyConfig, dest_dir: &Path) -> ReproFragment {
        match config.url() {
            Some(url) => ReproFragment::artifact(dest_dir, url),
            None => ReproFragment::unknown(dest_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::archive::tests::tarball;
    use tempfile::TempDir;

    async fn store_with(objects: &[(&str, Vec<u8>)]) -> StorageClient {
        let storage = StorageClient::in_memory("clangci");
        for (name, data) in objects {
            storage.upload(name, data.clone()).await.unwrap();
        }
        storage
    }

    fn config(url: &str) -> DependencyConfig {
        DependencyConfig::new("s3").with("url", url)
    }

    #[test]
    fn test_verify_requires_url() {
        let handler = ArtifactServerHandler::new(StorageClient::in_memory("clangci"), 1000);
        assert!(matches!(
            handler.verify(&DependencyConfig::new("s3")),
            Err(HandlerError::Config(_))
        ));
        assert!(handler.verify(&config("foo.tgz")).is_ok());
    }

    #[tokio::test]
    async fn test_direct_archive() {
        let storage = store_with(&[("foo.tgz", tarball(&[("foo.txt", "foo")], true))]).await;
        let handler = ArtifactServerHandler::new(storage, 20);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("dep");

        handler.get_artifact(&config("foo.tgz"), &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("foo.txt")).unwrap(), "foo");
        // only the extracted content remains
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_pointer_is_followed_once() {
        let storage = store_with(&[
            ("foo.tgz", b"bar.tgz\n".to_vec()),
            ("bar.tgz", tarball(&[("bar.txt", "bar")], true)),
        ])
        .await;
        let handler = ArtifactServerHandler::new(storage, 1000);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("dep");

        handler.get_artifact(&config("foo.tgz"), &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("bar.txt")).unwrap(), "bar");

        let fragment = handler.repro_arg(&config("foo.tgz"), &dest).await;
        assert_eq!(fragment, ReproFragment::artifact(&dest, "foo.tgz"));
    }

    #[tokio::test]
    async fn test_pointer_to_pointer_is_not_chased() {
        let storage = store_with(&[
            ("a.tgz", b"b.tgz".to_vec()),
            ("b.tgz", b"c.tgz".to_vec()),
            ("c.tgz", tarball(&[("c.txt", "c")], true)),
        ])
        .await;
        let handler = ArtifactServerHandler::new(storage, 1000);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("dep");

        // b.tgz is taken as final content, which is not an archive
        let result = handler.get_artifact(&config("a.tgz"), &dest).await;
        assert!(matches!(result, Err(HandlerError::Archive(_))));
        assert!(!dest.join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_dangling_pointer() {
        let storage = store_with(&[("foo.tgz", b"gone.tgz".to_vec())]).await;
        let handler = ArtifactServerHandler::new(storage, 1000);
        let dir = TempDir::new().unwrap();

        let result = handler.get_artifact(&config("foo.tgz"), dir.path()).await;
        assert!(matches!(result, Err(HandlerError::Storage(_))));
        // The downloaded pointer does not outlive the failed fetch
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_pointer() {
        let storage = store_with(&[("foo.tgz", b"  \n".to_vec())]).await;
        let handler = ArtifactServerHandler::new(storage, 1000);
        let dir = TempDir::new().unwrap();

        let result = handler.get_artifact(&config("foo.tgz"), dir.path()).await;
        assert!(matches!(result, Err(HandlerError::InvalidPointer(_))));
    }

    #[tokio::test]
    async fn test_get_artifact_is_idempotent() {
        let storage = store_with(&[(
            "foo.tgz",
            tarball(&[("include/a.h", "a"), ("lib/liba.a", "lib")], true),
        )])
        .await;
        let handler = ArtifactServerHandler::new(storage, 20);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("dep");

        handler.get_artifact(&config("foo.tgz"), &dest).await.unwrap();
        handler.get_artifact(&config("foo.tgz"), &dest).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("include/a.h")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dest.join("lib/liba.a")).unwrap(), "lib");
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 2);
    }
}
