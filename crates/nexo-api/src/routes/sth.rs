//! # Signed Tree Heads
//!
//! - `GET /sth/latest`: the most recent STH, or 404 before the first
//!   registration.
//! - `GET /sth/chain?limit=N`: up to `N` STHs, newest first. `N` defaults to
//!   10 and is capped at 1000.
//!
//! Handlers return the log's own serialization. The `*View` types below only
//! describe that wire shape for the OpenAPI document.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use nexo_log::{LogError, SignedTreeHead};

use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

/// Chain length when `limit` is absent or zero.
pub const DEFAULT_CHAIN_LIMIT: usize = 10;
/// Largest chain a single request may return.
pub const MAX_CHAIN_LIMIT: usize = 1000;

/// Threshold policy on the wire.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyView {
    /// Signatures required.
    pub t: usize,
    /// Total cosigners.
    pub n: usize,
}

/// One cosigner signature on the wire.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignatureView {
    /// Cosigner id, e.g. `cosigner_0`.
    pub cosigner: String,
    /// Base64 Ed25519 signature over the STH hash.
    pub sig: String,
}

/// A signed tree head on the wire.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SthView {
    /// Leaves committed.
    pub tree_size: u64,
    /// Base64 Merkle root.
    pub root: String,
    /// Base64 hash of the previous STH body, `""` for the first.
    pub prev_hash: String,
    /// Policy in force.
    pub policy: PolicyView,
    /// Issue time, Unix seconds.
    pub timestamp: i64,
    /// Cosigner signatures.
    pub signatures: Vec<SignatureView>,
}

/// Query for `/sth/chain`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChainQuery {
    /// Maximum number of STHs to return.
    pub limit: Option<usize>,
}

impl ChainQuery {
    fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => DEFAULT_CHAIN_LIMIT,
            Some(n) => n.min(MAX_CHAIN_LIMIT),
        }
    }
}

/// Build the STH router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sth/latest", get(latest_sth))
        .route("/sth/chain", get(sth_chain))
}

/// GET /sth/latest
#[utoipa::path(
    get,
    path = "/sth/latest",
    responses(
        (status = 200, description = "Latest signed tree head", body = SthView),
        (status = 404, description = "No STH published yet", body = crate::error::ErrorBody),
    ),
    tag = "sth"
)]
pub async fn latest_sth(State(state): State<AppState>) -> Result<Json<SignedTreeHead>, AppError> {
    let sth = state
        .blocking(|log| log.latest_sth()?.ok_or(LogError::NoSth).map_err(AppError::from))
        .await?;
    Ok(Json(sth))
}

/// GET /sth/chain
#[utoipa::path(
    get,
    path = "/sth/chain",
    params(ChainQuery),
    responses(
        (status = 200, description = "STHs, newest first", body = Vec<SthView>),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
    ),
    tag = "sth"
)]
pub async fn sth_chain(
    State(state): State<AppState>,
    query: Result<Query<ChainQuery>, QueryRejection>,
) -> Result<Json<Vec<SignedTreeHead>>, AppError> {
    let query = extract_query(query)?;
    let limit = query.effective_limit();
    let chain = state
        .blocking(move |log| Ok(log.sth_chain(limit)?))
        .await?;
    Ok(Json(chain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_limit_defaults_and_caps() {
        assert_eq!(ChainQuery { limit: None }.effective_limit(), 10);
        assert_eq!(ChainQuery { limit: Some(0) }.effective_limit(), 10);
        assert_eq!(ChainQuery { limit: Some(3) }.effective_limit(), 3);
        assert_eq!(ChainQuery { limit: Some(50_000) }.effective_limit(), 1000);
    }
}
