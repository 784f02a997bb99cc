//! Git repository checked out at a pinned revision
//!
//! ```json
//! "llvm": {"type": "git", "url": "https://github.com/llvm/llvm-project.git",
//!          "default_rev": "refs/heads/main"}
//! ```
//!
//! Without a `rev`, [`RepoHandler::resolve_latest`] pins the head of
//! `default_rev` (default `refs/heads/master`) via `git ls-remote`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::traits::{HandlerError, RepoHandler, require_url};
use super::types::{DependencyConfig, ReproFragment};
use crate::fetch::command;

const DEFAULT_REV: &str = "refs/heads/master";

#[derive(Debug, Clone, Default)]
pub struct GitHandler;

/// Parse `git ls-remote` output into ref name -> hash
fn parse_ls_remote(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (rev, name) = line.trim().split_once('\t')?;
            Some((name.trim().to_string(), rev.trim().to_string()))
        })
        .collect()
}

/// Pick the hash for `wanted`: an exact ref match, else the only match.
fn select_rev(
    refs: &BTreeMap<String, String>,
    wanted: &str,
    url: &str,
) -> Result<String, HandlerError> {
    if let Some(rev) = refs.get(wanted) {
        return Ok(rev.clone());
    }

    let mut revs = refs.values();
    match (revs.next(), revs.next()) {
        (Some(rev), None) => Ok(rev.clone()),
        (None, _) => Err(HandlerError::Resolve(format!(
            "No refs matching '{wanted}' found for repository '{url}'"
        ))),
        (Some(_), Some(_)) => Err(HandlerError::Resolve(format!(
            "Found multiple refs matching '{wanted}' for repository '{url}': {}",
            refs.keys().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn is_local(url: &str) -> bool {
    url.starts_with("file://") || Path::new(url).is_absolute()
}

#[async_trait]
impl RepoHandler for GitHandler {
    fn verify(&self, config: &DependencyConfig) -> Result<(), HandlerError> {
        require_url(config)?;
        if config.get("rev").is_some_and(|rev| !rev.is_string()) {
            return Err(HandlerError::Config("'rev' must be a string".to_string()));
        }
        Ok(())
    }

    async fn resolve_latest(
        &self,
        mut config: DependencyConfig,
    ) -> Result<DependencyConfig, HandlerError> {
        let default_rev = config
            .remove("default_rev")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_REV.to_string());

        if config.get_str("rev").is_some() {
            return Ok(config);
        }

        let url = require_url(&config)?.to_string();
        let args = ["ls-remote", url.as_str(), default_rev.as_str()];
        let output = command::check_output("git", args, None)
            .await
            .map_err(|e| HandlerError::Resolve(e.to_string()))?;
        let rev = select_rev(&parse_ls_remote(&output), &default_rev, &url)?;

        info!(url, default_rev, rev, "Pinned latest revision");
        config.set("rev", rev);
        Ok(config)
    }

    async fn get_artifact(
        &self,
        config: &DependencyConfig,
        dest_dir: &Path,
    ) -> Result<(), HandlerError> {
        let url = require_url(config)?;
        let rev = config.get_str("rev").ok_or_else(|| {
            HandlerError::Config("No 'rev' pinned (resolve_latest was not run)".to_string())
        })?;

        let git_dir = format!("--git-dir={}", dest_dir.join(".git").display());
        let work_tree = format!("--work-tree={}", dest_dir.display());

        if dest_dir.join(".git").is_dir() {
            // Re-run on an existing clone: the revision may not be local yet
            if let Err(e) =
                command::check_call("git", [git_dir.as_str(), "fetch", "-q", "origin"], None).await
            {
                warn!(url, error = %e, "git fetch failed, trying checkout with local objects");
            }
        } else {
            let dest = dest_dir.display().to_string();
            let mut args = vec!["clone", "-q", "-n"];
            if is_local(url) {
                args.push("-s");
            }
            args.extend([url, dest.as_str()]);
            command::check_call("git", args, None).await?;
        }

        command::check_call(
            "git",
            [git_dir.as_str(), work_tree.as_str(), "checkout", "-q", "-f", rev],
            None,
        )
        .await?;

        info!(url, rev, dest = %dest_dir.display(), "Checked out repository");
        Ok(())
    }

    async fn repro_arg(&self, config: &DependencyConfig, dest_dir: &Path) -> ReproFragment {
        match config.get_str("rev") {
            Some(rev) => ReproFragment::revision(dest_dir, rev),
            None => ReproFragment::unknown(dest_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS_REMOTE: &str = "\
1111111111111111111111111111111111111111\trefs/heads/master
2222222222222222222222222222222222222222\trefs/heads/release/17.x
";

    #[test]
    fn test_parse_ls_remote() {
        let refs = parse_ls_remote(LS_REMOTE);
        assert_eq!(refs.len(), 2);
        assert_eq!(
            refs["refs/heads/release/17.x"],
            "2222222222222222222222222222222222222222"
        );
        assert!(parse_ls_remote("\n\n").is_empty());
    }

    #[test]
    fn test_select_exact_match() {
        let refs = parse_ls_remote(LS_REMOTE);
        let rev = select_rev(&refs, "refs/heads/master", "u").unwrap();
        assert_eq!(rev, "1111111111111111111111111111111111111111");
    }

    #[test]
    fn test_select_single_pattern_match() {
        let refs = parse_ls_remote("3333\trefs/tags/llvmorg-17.0.0\n");
        assert_eq!(select_rev(&refs, "llvmorg-17.0.0", "u").unwrap(), "3333");
    }

    #[test]
    fn test_select_ambiguous_or_empty() {
        let refs = parse_ls_remote(LS_REMOTE);
        assert!(matches!(
            select_rev(&refs, "heads", "u"),
            Err(HandlerError::Resolve(msg)) if msg.contains("multiple")
        ));
        assert!(matches!(
            select_rev(&BTreeMap::new(), "refs/heads/main", "u"),
            Err(HandlerError::Resolve(msg)) if msg.contains("No refs")
        ));
    }

    #[test]
    fn test_verify() {
        assert!(GitHandler.verify(&DependencyConfig::new("git")).is_err());
        assert!(
            GitHandler
                .verify(&DependencyConfig::new("git").with("url", "https://x/llvm.git"))
                .is_ok()
        );

        let bad_rev: DependencyConfig = serde_json::from_value(serde_json::json!({
            "type": "git", "url": "https://x/llvm.git", "rev": 7
        }))
        .unwrap();
        assert!(GitHandler.verify(&bad_rev).is_err());
    }

    #[tokio::test]
    async fn test_resolve_latest_keeps_pinned_rev() {
        let config = DependencyConfig::new("git")
            .with("url", "https://x/llvm.git")
            .with("rev", "abc123")
            .with("default_rev", "refs/heads/main");

        let resolved = GitHandler.resolve_latest(config).await.unwrap();

        assert_eq!(resolved.get_str("rev"), Some("abc123"));
        assert!(resolved.get("default_rev").is_none());

        let again = GitHandler.resolve_latest(resolved.clone()).await.unwrap();
        assert_eq!(again, resolved);
    }

    #[tokio::test]
    async fn test_get_artifact_requires_rev() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DependencyConfig::new("git").with("url", "https://x/llvm.git");

        let result = GitHandler.get_artifact(&config, dir.path()).await;
        assert!(matches!(result, Err(HandlerError::Config(_))));
    }

    #[tokio::test]
    async fn test_repro_arg() {
        let config = DependencyConfig::new("git")
            .with("url", "https://x/llvm.git")
            .with("rev", "abc123");
        let fragment = GitHandler.repro_arg(&config, Path::new("llvm")).await;
        assert_eq!(fragment.to_string(), "-r llvm=abc123");
    }
}
