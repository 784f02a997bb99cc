use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::artifact_server::ArtifactServerHandler;
use super::existing::ExistingHandler;
use super::git::GitHandler;
use super::traits::RepoHandler;
use super::url::UrlHandler;
use crate::config::Config;
use crate::fetch::HttpClient;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown repository type '{0}'")]
    NotFound(String),

    #[error("invalid handler name '{0}'")]
    InvalidName(String),

    #[error("handler '{0}' is already registered")]
    Duplicate(String),

    #[error("handler '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },
}

type Factory = Box<dyn FnOnce() -> Result<Arc<dyn RepoHandler>, String> + Send>;

/// A handler offered to the registry under a type name.
///
/// Construction is deferred to discovery so a backend that cannot be set up
/// (missing bucket, bad client settings) is skipped instead of failing startup.
pub struct Candidate {
    name: String,
    factory: Factory,
}

impl Candidate {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn RepoHandler>, String> + Send + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
        }
    }

    /// Candidate wrapping an already constructed handler
    pub fn ready(name: impl Into<String>, handler: Arc<dyn RepoHandler>) -> Self {
        Self::new(name, move || Ok(handler))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("name", &self.name).finish()
    }
}

/// Built-in handlers for the given settings.
///
/// The object-store handler is offered both as `artifact_server` and `s3`.
pub fn default_candidates(config: &Config) -> Vec<Candidate> {
    let artifact_server = ArtifactServerHandler::from_config(&config.storage)
        .map(|handler| Arc::new(handler) as Arc<dyn RepoHandler>)
        .map_err(|e| e.to_string());
    let artifact_alias = artifact_server.clone();
    let http = config.http.clone();

    vec![
        Candidate::new("artifact_server", move || artifact_server),
        Candidate::new("s3", move || artifact_alias),
        Candidate::new("existing", || Ok(Arc::new(ExistingHandler) as Arc<dyn RepoHandler>)),
        Candidate::new("git", || Ok(Arc::new(GitHandler) as Arc<dyn RepoHandler>)),
        Candidate::new("url", move || {
            let client = HttpClient::new(&http).map_err(|e| e.to_string())?;
            Ok(Arc::new(UrlHandler::new(client)) as Arc<dyn RepoHandler>)
        }),
    ]
}

/// Immutable mapping from dependency `type` to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn RepoHandler>>,
}

impl HandlerRegistry {
    /// Build the registry from candidates. Invalid candidates are logged and
    /// excluded; the remaining ones are registered regardless.
    pub fn discover(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let mut handlers = BTreeMap::new();

        for candidate in candidates {
            match Self::admit(&handlers, candidate) {
                Ok((name, handler)) => {
                    debug!(handler = %name, "Registered repository handler");
                    handlers.insert(name, handler);
                }
                Err(e) => warn!(error = %e, "Ignoring repository handler"),
            }
        }

        Self { handlers }
    }

    fn admit(
        registered: &BTreeMap<String, Arc<dyn RepoHandler>>,
        candidate: Candidate,
    ) -> Result<(String, Arc<dyn RepoHandler>), RegistryError> {
        let Candidate { name, factory } = candidate;

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid_name {
            return Err(RegistryError::InvalidName(name));
        }
        if registered.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        match factory() {
            Ok(handler) => Ok((name, handler)),
            Err(reason) => Err(RegistryError::Unavailable { name, reason }),
        }
    }

    /// Create default registry with built-in handlers
    pub fn with_defaults(config: &Config) -> Self {
        Self::discover(default_candidates(config))
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn RepoHandler>, RegistryError> {
        self.handlers
            .get(kind)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(kind.to_string()))
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}
