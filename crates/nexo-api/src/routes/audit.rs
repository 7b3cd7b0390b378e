//! `POST /audit/root`: recompute a Merkle root from caller-supplied leaves
//! and compare it with an STH.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use nexo_core::decode_base64;
use nexo_log::{LeafRecord, RootAudit, SignedTreeHead};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// A raw leaf supplied for auditing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLeaf {
    /// Registered identifier.
    pub id: String,
    /// Base64 32-byte public key.
    pub public_key: String,
    /// Registration time, Unix seconds.
    pub timestamp: i64,
    /// Stored leaf hash. Ignored: the hash is always recomputed.
    #[serde(default)]
    pub leaf_hash: Option<String>,
}

/// Root audit request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditRootRequest {
    /// Leaves in append order.
    pub leaves: Vec<AuditLeaf>,
    /// STH to compare against. The latest STH when absent.
    #[serde(default)]
    #[schema(value_type = Option<crate::routes::sth::SthView>)]
    pub sth: Option<serde_json::Value>,
}

/// Root audit result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditRootResponse {
    /// Root and size both agree.
    #[serde(rename = "match")]
    pub matches: bool,
    /// Base64 root recomputed from the supplied leaves.
    pub computed_root: String,
    /// Number of leaves supplied.
    pub tree_size: u64,
    /// Tree size the STH claims.
    pub sth_tree_size: u64,
}

impl From<RootAudit> for AuditRootResponse {
    fn from(a: RootAudit) -> Self {
        Self {
            matches: a.matches,
            computed_root: a.computed_root.to_base64(),
            tree_size: a.tree_size,
            sth_tree_size: a.sth_tree_size,
        }
    }
}

impl AuditLeaf {
    fn into_record(self) -> Result<LeafRecord, AppError> {
        let public_key = decode_base64("public_key", &self.public_key)?;
        Ok(LeafRecord::new(self.id, public_key, self.timestamp)?)
    }
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new().route("/audit/root", post(audit_root))
}

/// POST /audit/root
#[utoipa::path(
    post,
    path = "/audit/root",
    request_body = AuditRootRequest,
    responses(
        (status = 200, description = "Comparison result", body = AuditRootResponse),
        (status = 400, description = "Malformed leaf or STH", body = crate::error::ErrorBody),
        (status = 404, description = "No STH supplied and none published", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub async fn audit_root(
    State(state): State<AppState>,
    body: Result<Json<AuditRootRequest>, JsonRejection>,
) -> Result<Json<AuditRootResponse>, AppError> {
    let req = extract_json(body)?;
    let leaves = req
        .leaves
        .into_iter()
        .map(AuditLeaf::into_record)
        .collect::<Result<Vec<_>, _>>()?;
    let sth: Option<SignedTreeHead> = req
        .sth
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("invalid sth: {e}")))?;

    let audit = state
        .blocking(move |log| Ok(log.audit_root(&leaves, sth.as_ref())?))
        .await?;
    Ok(Json(audit.into()))
}
