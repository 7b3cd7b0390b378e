//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. The log itself is synchronous; handlers call it
//! through [`AppState::blocking`] so store IO never runs on an async worker.

use std::sync::Arc;

use nexo_core::{Clock, SystemClock};
use nexo_crypto::{CosignAuthority, SigningMode, ThresholdPolicy};
use nexo_log::{LogConfig, MemoryLeafStore, MemorySthStore, TransparencyLog};

use crate::bootstrap::BootstrapError;
use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The transparency log.
    pub log: Arc<TransparencyLog>,
    /// Prometheus registry for request counters and log gauges.
    pub metrics: ApiMetrics,
    /// Time source for response timestamps.
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("log", &self.log)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wrap an assembled log with a fresh metrics registry.
    pub fn new(log: Arc<TransparencyLog>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            log,
            metrics: ApiMetrics::new()?,
            clock: Arc::new(SystemClock),
        })
    }

    /// An in-memory log with freshly generated 2-of-3 cosigner keys.
    pub fn ephemeral() -> Result<Self, BootstrapError> {
        let authority = CosignAuthority::generate(ThresholdPolicy::default(), SigningMode::Threshold)?;
        let log = TransparencyLog::new(
            Arc::new(MemoryLeafStore::new()),
            Arc::new(MemorySthStore::new()),
            Arc::new(authority),
            Arc::new(SystemClock),
            LogConfig::default(),
        );
        Ok(Self::new(Arc::new(log))?)
    }

    /// Run `f` against the log on the blocking thread pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&TransparencyLog) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || f(&log)).await?
    }
}
