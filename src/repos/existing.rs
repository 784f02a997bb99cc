//! Dependency already present on disk (e.g. checked out by the CI system)

use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

use super::traits::{HandlerError, RepoHandler};
use super::types::{DependencyConfig, ReproFragment};
use crate::fetch::command;

#[derive(Debug, Clone, Default)]
pub struct ExistingHandler;

#[async_trait]
impl RepoHandler for ExistingHandler {
    fn verify(&self, _config: &DependencyConfig) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn resolve_latest(
        &self,
        config: DependencyConfig,
    ) -> Result<DependencyConfig, HandlerError> {
        Ok(config)
    }

    async fn get_artifact(
        &self,
        _config: &DependencyConfig,
        dest_dir: &Path,
    ) -> Result<(), HandlerError> {
        match tokio::fs::metadata(dest_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(HandlerError::Precondition(format!(
                "Expected directory '{}' is missing",
                dest_dir.display()
            ))),
        }
    }

    async fn repro_arg(&self, _config: &DependencyConfig, dest_dir: &Path) -> ReproFragment {
        let git_dir = dest_dir.join(".git");
        if !git_dir.exists() {
            return ReproFragment::unknown(dest_dir);
        }

        let git_dir_arg = format!("--git-dir={}", git_dir.display());
        let args = [git_dir_arg.as_str(), "rev-parse", "HEAD"];
        match command::check_output("git", args, None).await {
            Ok(out) if !out.trim().is_empty() => ReproFragment::revision(dest_dir, out.trim()),
            Ok(_) => ReproFragment::unknown(dest_dir),
            Err(e) => {
                warn!(dest = %dest_dir.display(), error = %e, "Could not read checkout revision");
                ReproFragment::unknown(dest_dir)
            }
        }
    }
}
