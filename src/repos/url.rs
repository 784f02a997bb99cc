//! Tarball fetched from an arbitrary URL
//!
//! ```json
//! "llvm-src": {"type": "url", "url": "https://example.com/llvm-src.tar.gz"}
//! ```

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::traits::{HandlerError, RepoHandler, require_url};
use super::types::{DependencyConfig, ReproFragment};
use crate::fetch::{HttpClient, archive, staging_file};

#[derive(Debug, Clone)]
pub struct UrlHandler {
    client: HttpClient,
}

impl UrlHandler {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RepoHandler for UrlHandler {
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

        let staged = staging_file(dest_dir).map_err(|e| HandlerError::io(dest_dir, e))?;
        let size = self.client.download_to(url, &staged).await?;
        info!(url, size, dest = %dest_dir.display(), "Fetched archive");
        archive::unpack_blocking(staged.to_path_buf(), dest_dir.to_path_buf()).await?;

        staged.close().map_err(|e| HandlerError::io(dest_dir, e))
    }

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
    use crate::config::HttpConfig;

    fn handler() -> UrlHandler {
        UrlHandler::new(HttpClient::new(&HttpConfig::default()).unwrap())
    }

    #[test]
    fn test_verify_requires_url() {
        let handler = handler();

        assert!(handler.verify(&DependencyConfig::new("url")).is_err());
        assert!(
            handler
                .verify(&DependencyConfig::new("url").with("url", "http://x/pkg.tgz"))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_resolve_latest_is_identity() {
        let config = DependencyConfig::new("url").with("url", "http://x/pkg.tgz");
        let resolved = handler().resolve_latest(config.clone()).await.unwrap();
        assert_eq!(resolved, config);
    }

    #[tokio::test]
    async fn test_repro_arg() {
        let config = DependencyConfig::new("url").with("url", "http://x/pkg.tgz");
        let fragment = handler().repro_arg(&config, Path::new("/tmp/dep1")).await;
        assert_eq!(fragment.to_string(), "-a /tmp/dep1=http://x/pkg.tgz");
    }

    #[tokio::test]
    async fn test_repro_arg_without_url_degrades() {
        let fragment = handler()
            .repro_arg(&DependencyConfig::new("url"), Path::new("/tmp/dep1"))
            .await;
        assert!(!fragment.is_reproducible());
    }

    #[tokio::test]
    async fn test_get_artifact_unreachable_host() {
        let mut http = HttpConfig::default();
        http.max_retries = 1;
        http.connect_timeout_secs = 1;
        let handler = UrlHandler::new(HttpClient::new(&http).unwrap());
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("dep");

        let config = DependencyConfig::new("url").with("url", "http://127.0.0.1:9/pkg.tgz");
        let result = handler.get_artifact(&config, &dest).await;

        assert!(matches!(result, Err(HandlerError::Download(_))));
        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }
}
