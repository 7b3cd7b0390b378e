//! `GET /proof/{index}`: inclusion proof for one leaf against the latest STH.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

/// Inclusion proof response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProofResponse {
    /// Position of the leaf.
    pub leaf_index: u64,
    /// Base64 leaf hash.
    pub leaf_hash: String,
    /// Size of the tree the proof targets.
    pub tree_size: u64,
    /// Base64 root of the latest STH.
    pub root: String,
    /// Index to feed the verifier; equals `leaf_index` unless an odd node
    /// was carried on the path.
    pub path_index: u64,
    /// Base64 sibling hashes, leaf level first.
    pub proof: Vec<String>,
}

/// Build the proof router.
pub fn router() -> Router<AppState> {
    Router::new().route("/proof/{index}", get(inclusion_proof))
}

/// GET /proof/{index}
#[utoipa::path(
    get,
    path = "/proof/{index}",
    params(("index" = u64, Path, description = "Leaf index in append order")),
    responses(
        (status = 200, description = "Inclusion proof", body = ProofResponse),
        (status = 404, description = "No STH yet, or index beyond the latest tree", body = crate::error::ErrorBody),
    ),
    tag = "proof"
)]
pub async fn inclusion_proof(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<Json<ProofResponse>, AppError> {
    let p = state
        .blocking(move |log| Ok(log.inclusion_proof(index)?))
        .await?;
    Ok(Json(ProofResponse {
        leaf_index: p.proof.leaf_index,
        leaf_hash: p.leaf_hash.to_base64(),
        tree_size: p.proof.tree_size,
        root: p.root.to_base64(),
        path_index: p.proof.path_index,
        proof: p.proof.siblings.iter().map(|d| d.to_base64()).collect(),
    }))
}
