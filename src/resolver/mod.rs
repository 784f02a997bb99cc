//! Dependency resolution for one build
//!
//! A [`BuildConfig`] lists dependencies (object entries) and build parameters
//! (scalar entries) in declaration order. [`DependencyResolver::resolve`]
//! checks every dependency against its handler before touching the network,
//! then fetches them concurrently and joins the reproduction fragments back in
//! declaration order:
//!
//! ```text
//! -a compiler=clang-stage1/latest -r llvm=9f1c2e... -D CMAKE_BUILD_TYPE=Release
//! ```

mod buildconfig;
mod error;

pub use buildconfig::{BuildConfig, BuildConfigError, Entry};
pub use error::{ErrorKind, ResolveError};

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};

use crate::config::ResolverConfig;
use crate::observability::Metrics;
use crate::repos::{
    DependencyConfig, HandlerError, HandlerRegistry, RepoHandler, ReproFragment, Stage,
};
use buildconfig::is_plain_name;

/// Knobs for one resolver instance
#[derive(Debug, Clone, bon::Builder)]
pub struct ResolveOptions {
    /// Dependencies fetched at the same time
    #[builder(default = 4)]
    pub max_concurrency: usize,

    /// Upper bound for a single `get_artifact`
    #[builder(default = Duration::from_secs(30 * 60))]
    pub fetch_timeout: Duration,

    /// Directory the dependency destinations live in. Empty means the
    /// current directory, which keeps fragments relative (`-a llvm=...`).
    #[builder(default, into)]
    pub workdir: PathBuf,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&ResolverConfig> for ResolveOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self::builder()
            .max_concurrency(config.max_concurrency)
            .fetch_timeout(config.fetch_timeout())
            .build()
    }
}

/// Outcome of a successful [`DependencyResolver::resolve`]
#[derive(Debug, Clone)]
pub struct Resolution {
    /// One fragment per entry, in declaration order
    pub fragments: Vec<ReproFragment>,
    /// The build config with every volatile reference pinned
    pub pinned: BuildConfig,
}

impl Resolution {
    /// Space-joined reproduction command line
    pub fn repro_string(&self) -> String {
        join(&self.fragments)
    }

    pub fn is_reproducible(&self) -> bool {
        self.fragments.iter().all(ReproFragment::is_reproducible)
    }
}

/// A dependency that passed lookup and verify
struct Planned {
    index: usize,
    name: String,
    handler: Arc<dyn RepoHandler>,
    config: DependencyConfig,
}

/// Drives the handler contract for every dependency of a build
pub struct DependencyResolver {
    registry: Arc<HandlerRegistry>,
    options: ResolveOptions,
    metrics: Arc<Metrics>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<HandlerRegistry>, options: ResolveOptions) -> Self {
        Self {
            registry,
            options,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Destination directory owned by dependency `name`
    pub fn dest_dir(&self, name: &str) -> PathBuf {
        self.options.workdir.join(name)
    }

    /// Fetch every dependency and build the reproduction command line.
    ///
    /// Lookup and verify run for all dependencies first; a bad config fails
    /// the build before any download starts. The first fetch failure cancels
    /// dependencies that have not started yet.
    pub async fn resolve(&self, build: &BuildConfig) -> Result<Resolution, ResolveError> {
        let mut fragments: Vec<Option<ReproFragment>> = vec![None; build.len()];
        let mut planned = Vec::new();

        for (index, (name, entry)) in build.entries().enumerate() {
            match entry {
                Entry::Dependency(config) => {
                    let handler = self.check(name, config).inspect_err(|_| {
                        self.metrics.dependency_failed();
                    })?;
                    planned.push(Planned {
                        index,
                        name: name.to_string(),
                        handler,
                        config: config.clone(),
                    });
                }
                Entry::Parameter(value) => {
                    fragments[index] = Some(ReproFragment::Define {
                        name: name.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }

        info!(
            dependencies = planned.len(),
            max_concurrency = self.options.max_concurrency,
            "Resolving dependencies"
        );

        let mut pinned = build.clone();
        let mut results = stream::iter(planned)
            .map(|plan| {
                let span = info_span!("dependency", name = %plan.name);
                async move {
                    let index = plan.index;
                    let name = plan.name.clone();
                    (index, name, self.materialize(plan).await)
                }
                .instrument(span)
            })
            .buffer_unordered(self.options.max_concurrency.max(1));

        while let Some((index, name, result)) = results.next().await {
            match result {
                Ok((config, fragment)) => {
                    pinned.push(name, Entry::Dependency(config));
                    fragments[index] = Some(fragment);
                }
                Err(e) => {
                    warn!(dependency = %name, stage = %e.stage(), error = %e, "Resolution failed");
                    self.metrics.dependency_failed();
                    return Err(e);
                }
            }
        }

        Ok(Resolution {
            fragments: fragments.into_iter().flatten().collect(),
            pinned,
        })
    }

    /// Fetch a single dependency by name
    pub async fn get(
        &self,
        build: &BuildConfig,
        name: &str,
    ) -> Result<ReproFragment, ResolveError> {
        let config = build
            .dependency(name)
            .ok_or_else(|| ResolveError::NoSuchDependency(name.to_string()))?;
        let handler = self.check(name, config)?;

        let plan = Planned {
            index: 0,
            name: name.to_string(),
            handler,
            config: config.clone(),
        };
        let span = info_span!("dependency", name = %name);
        match self.materialize(plan).instrument(span).await {
            Ok((_, fragment)) => Ok(fragment),
            Err(e) => {
                self.metrics.dependency_failed();
                Err(e)
            }
        }
    }

    /// Reproduction fragments for what is on disk now, without fetching
    pub async fn repro_args(&self, build: &BuildConfig) -> Result<String, ResolveError> {
        let mut fragments = Vec::with_capacity(build.len());
        for (name, entry) in build.entries() {
            let fragment = match entry {
                Entry::Dependency(config) => {
                    let handler = self.lookup(name, config)?;
                    handler.repro_arg(config, &self.dest_dir(name)).await
                }
                Entry::Parameter(value) => ReproFragment::Define {
                    name: name.to_string(),
                    value: value.clone(),
                },
            };
            fragments.push(fragment);
        }
        Ok(join(&fragments))
    }

    fn lookup(
        &self,
        name: &str,
        config: &DependencyConfig,
    ) -> Result<Arc<dyn RepoHandler>, ResolveError> {
        if !is_plain_name(name) {
            return Err(ResolveError::InvalidName {
                dependency: name.to_string(),
            });
        }
        let kind = config.kind().ok_or_else(|| ResolveError::MissingType {
            dependency: name.to_string(),
        })?;
        self.registry
            .get(kind)
            .map_err(|source| ResolveError::UnknownHandler {
                dependency: name.to_string(),
                source,
            })
    }

    /// Lookup and verify: no I/O
    fn check(
        &self,
        name: &str,
        config: &DependencyConfig,
    ) -> Result<Arc<dyn RepoHandler>, ResolveError> {
        let handler = self.lookup(name, config)?;
        handler
            .verify(config)
            .map_err(|e| ResolveError::handler(name, Stage::Verify, e))?;
        Ok(handler)
    }

    async fn materialize(
        &self,
        plan: Planned,
    ) -> Result<(DependencyConfig, ReproFragment), ResolveError> {
        let Planned {
            name,
            handler,
            config,
            ..
        } = plan;
        let dest = self.dest_dir(&name);

        let config = handler
            .resolve_latest(config)
            .await
            .map_err(|e| ResolveError::handler(&name, Stage::ResolveLatest, e))?;

        info!(dest = %dest.display(), "Fetching");
        let timeout = self.options.fetch_timeout;
        tokio::time::timeout(timeout, handler.get_artifact(&config, &dest))
            .await
            .unwrap_or(Err(HandlerError::Timeout(timeout)))
            .map_err(|e| ResolveError::handler(&name, Stage::GetArtifact, e))?;

        let fragment = handler.repro_arg(&config, &dest).await;
        if !fragment.is_reproducible() {
            warn!(dest = %dest.display(), "Dependency state cannot be reproduced");
            self.metrics.dependency_unreproducible();
        }
        self.metrics.dependency_resolved();

        Ok((config, fragment))
    }
}

fn join(fragments: &[ReproFragment]) -> String {
    fragments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
