//! HTTP client for downloading archives

use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::HttpConfig;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("Connection timeout")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<DownloadError> },
}

impl DownloadError {
    /// Client errors will not change on a second attempt
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Status { status, .. } => !status.is_client_error(),
            DownloadError::Io { .. } => false,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff before retry `attempt` (1-based): 1x, 2x, 4x, capped
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// HTTP downloader
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            retry_backoff: Duration::from_secs(1),
        })
    }

    /// Override the base delay between attempts
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Download `url` into `dest` with retry, returning the byte count
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.download_once(url, dest).await {
                Ok(size) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Download succeeded after retry");
                    }
                    return Ok(size);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempts >= self.max_retries {
                        warn!(url, attempts, error = %e, "Download failed after retries");
                        return Err(DownloadError::Exhausted {
                            attempts,
                            last: Box::new(e),
                        });
                    }

                    warn!(url, attempts, error = %e, "Download failed, retrying");

                    tokio::time::sleep(backoff_delay(self.retry_backoff, attempts)).await;
                }
            }
        }
    }

    /// Download once (no retry), streaming the body to disk
    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url, "Starting download");

        let mut response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout
            } else if e.is_redirect() {
                DownloadError::TooManyRedirects
            } else {
                DownloadError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status,
            });
        }

        let io_err = |source| DownloadError::Io {
            path: dest.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut size = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::RequestFailed(format!("Failed to read body: {}", e)))?
        {
            size += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;

        debug!(url, size, "Download completed");
        Ok(size)
    }
}
