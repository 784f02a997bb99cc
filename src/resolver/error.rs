use thiserror::Error;

use crate::repos::{HandlerError, RegistryError, Stage};

/// Error class reported to the caller, independent of which handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A dependency config is missing or has a malformed field
    Config,
    /// The dependency `type` has no registered handler
    UnknownHandler,
    /// Network, storage, version control or extraction failure
    Fetch,
    /// Something the dependency needs to exist beforehand is missing
    Precondition,
}

/// A fatal failure that aborted resolution of the whole build
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("dependency '{dependency}': name must be a single path component")]
    InvalidName { dependency: String },

    #[error("dependency '{dependency}': no 'type' specified")]
    MissingType { dependency: String },

    #[error("dependency '{dependency}': {source}")]
    UnknownHandler {
        dependency: String,
        #[source]
        source: RegistryError,
    },

    #[error("dependency '{dependency}' failed in {stage}: {source}")]
    Handler {
        dependency: String,
        stage: Stage,
        #[source]
        source: HandlerError,
    },

    #[error("No config for '{0}'")]
    NoSuchDependency(String),
}

impl ResolveError {
    pub(crate) fn handler(dependency: &str, stage: Stage, source: HandlerError) -> Self {
        Self::Handler {
            dependency: dependency.to_string(),
            stage,
            source,
        }
    }

    /// Name of the dependency that failed
    pub fn dependency(&self) -> &str {
        match self {
            Self::MissingType { dependency }
            | Self::InvalidName { dependency }
            | Self::UnknownHandler { dependency, .. }
            | Self::Handler { dependency, .. } => dependency,
            Self::NoSuchDependency(name) => name,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Handler { stage, .. } => *stage,
            _ => Stage::Lookup,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingType { .. } | Self::InvalidName { .. } | Self::NoSuchDependency(_) => {
                ErrorKind::Config
            }
            Self::UnknownHandler { .. } => ErrorKind::UnknownHandler,
            Self::Handler { source, .. } => match source {
                HandlerError::Config(_) => ErrorKind::Config,
                HandlerError::Precondition(_) => ErrorKind::Precondition,
                _ => ErrorKind::Fetch,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_classification() {
        let err = ResolveError::handler(
            "llvm",
            Stage::GetArtifact,
            HandlerError::Timeout(Duration::from_secs(5)),
        );
        assert_eq!(err.dependency(), "llvm");
        assert_eq!(err.stage(), Stage::GetArtifact);
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(
            err.to_string(),
            "dependency 'llvm' failed in get_artifact: timed out after 5s"
        );

        let err = ResolveError::UnknownHandler {
            dependency: "x".to_string(),
            source: RegistryError::NotFound("bogus".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::UnknownHandler);
        assert_eq!(err.stage(), Stage::Lookup);
        assert_eq!(err.to_string(), "dependency 'x': Unknown repository type 'bogus'");
    }

    #[test]
    fn test_precondition_and_config_kinds() {
        let err = ResolveError::handler(
            "src",
            Stage::GetArtifact,
            HandlerError::Precondition("Expected directory 'src' is missing".to_string()),
        );
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let config_error = HandlerError::Config("x".to_string());
        let err = ResolveError::handler("src", Stage::Verify, config_error);
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
