use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    S3,
    Local,
    Memory,
}

/// Artifact storage backing the `artifact_server` handler
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Bucket name; `S3_BUCKET` in the environment takes precedence
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix every artifact path is resolved under
    #[serde(default = "default_prefix")]
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Root directory for the `local` provider
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Objects smaller than this are read as pointers to another object
    #[serde(default = "default_pointer_threshold")]
    pub pointer_threshold: ByteSize,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            bucket: None,
            prefix: default_prefix(),
            region: None,
            endpoint: None,
            root: default_root(),
            pointer_threshold: default_pointer_threshold(),
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_prefix() -> String {
    "clangci".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_pointer_threshold() -> ByteSize {
    ByteSize(1000)
}

/// HTTP client settings for the `url` handler
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("depfetch/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Dependency resolution limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl ResolverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_fetch_timeout_secs() -> u64 {
    30 * 60
}
