//! Observability (resolution counters, tracing setup)

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Counters for dependency resolutions
#[derive(Debug, Default)]
pub struct Metrics {
    resolved: AtomicU64,
    failed: AtomicU64,
    unreproducible: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dependency_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "resolved", "Metric incremented");
    }

    pub fn dependency_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "failed", "Metric incremented");
    }

    /// A dependency whose state could not be captured in a fragment
    pub fn dependency_unreproducible(&self) {
        self.unreproducible.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "unreproducible", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolved: self.resolved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unreproducible: self.unreproducible.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub resolved: u64,
    pub failed: u64,
    pub unreproducible: u64,
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr; stdout carries command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.dependency_resolved();
        metrics.dependency_resolved();
        metrics.dependency_unreproducible();
        metrics.dependency_failed();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                resolved: 2,
                failed: 1,
                unreproducible: 1,
            }
        );
    }
}
