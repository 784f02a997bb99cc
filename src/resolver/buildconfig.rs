use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::repos::DependencyConfig;

/// File names `clean` never removes
const RESERVED: &[&str] = &["config", "buildconfig.json", "run.sh"];

#[derive(Debug, Error)]
pub enum BuildConfigError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse build config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("build config must be a JSON object")]
    NotAnObject,

    #[error("entry '{0}' must be an object or a scalar value")]
    InvalidEntry(String),

    #[error("dependency name '{0}' must be a single path component")]
    InvalidName(String),

    #[error("No config entry for '{0}'")]
    MissingEntry(String),

    #[error("Could not remove '{path}': {source}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A dependency name doubles as its directory under the workdir, so it must
/// be one plain component: not empty, no separators, no `.` or `..`.
pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
        && !name.contains(['/', '\\'])
}

/// One top-level entry of a build config
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Object entry: fetched by a handler
    Dependency(DependencyConfig),
    /// Scalar entry: a build parameter passed through as text
    Parameter(String),
}

/// Ordered build configuration (`buildconfig.json`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildConfig {
    entries: Vec<(String, Entry)>,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self, BuildConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| BuildConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, BuildConfigError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Self::from_map(map),
            _ => Err(BuildConfigError::NotAnObject),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self, BuildConfigError> {
        let entries = map
            .into_iter()
            .map(|(name, value)| {
                let entry = match value {
                    Value::Object(_) if !is_plain_name(&name) => {
                        return Err(BuildConfigError::InvalidName(name));
                    }
                    Value::Object(obj) => Entry::Dependency(obj.into()),
                    Value::String(s) => Entry::Parameter(s),
                    Value::Number(n) => Entry::Parameter(n.to_string()),
                    Value::Bool(b) => Entry::Parameter(b.to_string()),
                    Value::Null | Value::Array(_) => {
                        return Err(BuildConfigError::InvalidEntry(name));
                    }
                };
                Ok((name, entry))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    pub fn push(&mut self, name: impl Into<String>, entry: Entry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
    }

    /// Builder-style [`BuildConfig::push`] for a dependency
    pub fn with_dependency(mut self, name: impl Into<String>, config: DependencyConfig) -> Self {
        self.push(name, Entry::Dependency(config));
        self
    }

    /// Builder-style [`BuildConfig::push`] for a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, Entry::Parameter(value.into()));
        self
    }

    /// Entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn dependency(&self, name: &str) -> Option<&DependencyConfig> {
        match self.get(name)? {
            Entry::Dependency(config) => Some(config),
            Entry::Parameter(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of a build parameter; an optional missing parameter is empty.
    /// Dependency entries render as their JSON config.
    pub fn arg(&self, name: &str, optional: bool) -> Result<String, BuildConfigError> {
        match self.get(name) {
            Some(Entry::Parameter(value)) => Ok(value.clone()),
            Some(Entry::Dependency(config)) => Ok(serde_json::to_string(config)?),
            None if optional => Ok(String::new()),
            None => Err(BuildConfigError::MissingEntry(name.to_string())),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, BuildConfigError> {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, entry)| {
                let value = match entry {
                    Entry::Dependency(config) => Value::Object(config.as_map().clone()),
                    Entry::Parameter(value) => Value::String(value.clone()),
                };
                (name.clone(), value)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Remove everything in `workdir` that this build does not keep: existing
    /// checkouts and the reserved build files survive, all else is leftovers
    /// of earlier builds.
    pub fn clean(&self, workdir: &Path) -> Result<Vec<PathBuf>, BuildConfigError> {
        let mut keep: HashSet<&str> = RESERVED.iter().copied().collect();
        for (name, entry) in self.entries() {
            if let Entry::Dependency(config) = entry
                && config.kind() == Some("existing")
            {
                keep.insert(name);
            }
        }

        let read_err = |source| BuildConfigError::Read {
            path: workdir.display().to_string(),
            source,
        };

        let mut removed = Vec::new();
        for dirent in std::fs::read_dir(workdir).map_err(read_err)? {
            let dirent = dirent.map_err(read_err)?;
            let file_name = dirent.file_name();
            if keep.contains(file_name.to_string_lossy().as_ref()) {
                continue;
            }

            let path = dirent.path();
            info!(path = %path.display(), "...removing");
            let is_dir = dirent.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let result = if is_dir {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            result.map_err(|source| BuildConfigError::Remove {
                path: path.display().to_string(),
                source,
            })?;
            removed.push(path);
        }

        removed.sort();
        Ok(removed)
    }
}
