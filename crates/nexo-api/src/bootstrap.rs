//! # Bootstrap
//!
//! Builds [`AppState`] from a [`ServerConfig`]: resolves the cosigner keys,
//! opens the stores, and assembles the log.

use std::sync::Arc;

use nexo_core::{SystemClock, ValidationError};
use nexo_crypto::keystore;
use nexo_crypto::{CosignAuthority, CosignError, ThresholdPolicy};
use nexo_log::{
    JsonlLeafStore, JsonlSthStore, LeafStore, LogConfig, MemoryLeafStore, MemorySthStore,
    SthStore, StoreError, TransparencyLog,
};
use thiserror::Error;

use crate::config::{ServerConfig, StorageKind};
use crate::state::AppState;

/// Errors during startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Threshold and cosigner count are inconsistent.
    #[error("invalid policy: {0}")]
    Policy(#[from] ValidationError),

    /// Cosigner keys could not be loaded or generated.
    #[error("cosigner keys: {0}")]
    Cosign(#[from] CosignError),

    /// The stores could not be opened.
    #[error("storage: {0}")]
    Store(#[from] StoreError),

    /// The metrics registry could not be built.
    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Build application state using the process environment for key lookup.
pub fn bootstrap(config: &ServerConfig) -> Result<AppState, BootstrapError> {
    bootstrap_with_env(config, |k| std::env::var(k).ok())
}

/// Build application state, reading `COSIGNER_{i}_SK` through `env`.
pub fn bootstrap_with_env<F>(config: &ServerConfig, env: F) -> Result<AppState, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let policy = ThresholdPolicy::new(config.threshold, config.cosigners)?;
    let keys = keystore::load_or_generate(policy.n, &config.cosigner_key_dir, env)?;
    let authority = CosignAuthority::new(keys, policy, config.signing_mode)?;

    let (leaves, sths): (Arc<dyn LeafStore>, Arc<dyn SthStore>) = match config.storage {
        StorageKind::File => (
            Arc::new(JsonlLeafStore::open(&config.data_dir)?),
            Arc::new(JsonlSthStore::open(&config.data_dir)?),
        ),
        StorageKind::Memory => (
            Arc::new(MemoryLeafStore::new()),
            Arc::new(MemorySthStore::new()),
        ),
    };

    let log = TransparencyLog::new(
        leaves,
        sths,
        Arc::new(authority),
        Arc::new(SystemClock),
        LogConfig {
            reject_undersigned: config.reject_undersigned,
        },
    );

    tracing::info!(
        t = policy.t,
        n = policy.n,
        storage = ?config.storage,
        data_dir = %config.data_dir.display(),
        "transparency log ready"
    );

    Ok(AppState::new(Arc::new(log))?)
}
