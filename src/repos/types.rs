use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::fetch::quote;

/// Per-dependency settings: a `type` discriminator plus handler-specific keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyConfig(Map<String, Value>);

impl DependencyConfig {
    pub fn new(kind: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(kind.to_string()));
        Self(map)
    }

    /// Builder-style setter for string fields
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.get_str("type")
    }

    pub fn url(&self) -> Option<&str> {
        self.get_str("url")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`; non-string values read as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), Value::String(value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for DependencyConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The registry lookup and the contract operations that can fail. Used to
/// report where a resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lookup,
    Verify,
    ResolveLatest,
    GetArtifact,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lookup => "lookup",
            Stage::Verify => "verify",
            Stage::ResolveLatest => "resolve_latest",
            Stage::GetArtifact => "get_artifact",
        };
        f.write_str(name)
    }
}

/// How to re-obtain one input of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReproFragment {
    /// `-a <dest>=<url>`: archive fetched from a URL or the artifact store
    Artifact { dest: PathBuf, url: String },
    /// `-r <dest>=<rev>`: checkout pinned to a revision
    Revision { dest: PathBuf, rev: String },
    /// `-D <name>=<value>`: plain build parameter
    Define { name: String, value: String },
    /// Dependency whose state cannot be captured
    Unknown { dest: PathBuf },
}

impl ReproFragment {
    pub fn artifact(dest: &Path, url: impl Into<String>) -> Self {
        Self::Artifact {
            dest: dest.to_path_buf(),
            url: url.into(),
        }
    }

    pub fn revision(dest: &Path, rev: impl Into<String>) -> Self {
        Self::Revision {
            dest: dest.to_path_buf(),
            rev: rev.into(),
        }
    }

    pub fn unknown(dest: &Path) -> Self {
        Self::Unknown {
            dest: dest.to_path_buf(),
        }
    }

    pub fn is_reproducible(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

impl fmt::Display for ReproFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact { dest, url } => write!(f, "-a {}={}", dest.display(), quote(url)),
            Self::Revision { dest, rev } => write!(f, "-r {}={}", dest.display(), rev),
            Self::Define { name, value } => write!(f, "-D {}={}", name, quote(value)),
            Self::Unknown { dest } => {
                write!(f, "!Unknown repository type in '{}'", dest.display())
            }
        }
    }
}
