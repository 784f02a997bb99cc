//! Repository handlers: one backend per dependency `type`
//!
//! ## Key Components
//!
//! - [`RepoHandler`] - The contract every backend implements
//! - [`HandlerRegistry`] - Type name to handler lookup, built once at startup
//! - [`DependencyConfig`] - Settings of one dependency
//! - [`ReproFragment`] - How to fetch the same input again
//!
//! Built-in handlers:
//!
//! | type                      | handler                   |
//! |---------------------------|---------------------------|
//! | `artifact_server`, `s3`   | [`ArtifactServerHandler`] |
//! | `url`                     | [`UrlHandler`]            |
//! | `existing`                | [`ExistingHandler`]       |
//! | `git`                     | [`GitHandler`]            |
//!
//! ## Example
//!
//! ```rust,ignore
//! use depfetch::repos::{DependencyConfig, HandlerRegistry};
//!
//! let registry = HandlerRegistry::with_defaults(&config);
//! let handler = registry.get("url")?;
//!
//! let dep = DependencyConfig::new("url").with("url", "http://x/pkg.tgz");
//! handler.verify(&dep)?;
//! handler.get_artifact(&dep, Path::new("pkg")).await?;
//! println!("{}", handler.repro_arg(&dep, Path::new("pkg")).await);
//! ```

mod artifact_server;
mod existing;
mod git;
mod registry;
mod traits;
mod types;
mod url;

pub use artifact_server::ArtifactServerHandler;
pub use existing::ExistingHandler;
pub use git::GitHandler;
pub use registry::{Candidate, HandlerRegistry, RegistryError, default_candidates};
pub use traits::{HandlerError, RepoHandler};
pub use types::{DependencyConfig, ReproFragment, Stage};
pub use url::UrlHandler;
