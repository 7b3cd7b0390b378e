//! `GET /cosigners`: the public roster, for third-party auditors.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use nexo_crypto::{CosignerPublic, ThresholdPolicy};

use crate::routes::sth::PolicyView;
use crate::state::AppState;

/// One cosigner on the wire.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CosignerView {
    /// Cosigner id.
    pub id: String,
    /// Base64 Ed25519 public key.
    pub public_key: String,
}

/// Roster response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RosterView {
    /// Policy in force.
    pub policy: PolicyView,
    /// All cosigners, in index order.
    pub cosigners: Vec<CosignerView>,
}

/// What the handler actually serializes.
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub policy: ThresholdPolicy,
    pub cosigners: Vec<CosignerPublic>,
}

/// Build the roster router.
pub fn router() -> Router<AppState> {
    Router::new().route("/cosigners", get(cosigners))
}

/// GET /cosigners
#[utoipa::path(
    get,
    path = "/cosigners",
    responses((status = 200, description = "Cosigner roster", body = RosterView)),
    tag = "cosigners"
)]
pub async fn cosigners(State(state): State<AppState>) -> Json<RosterResponse> {
    Json(RosterResponse {
        policy: state.log.policy(),
        cosigners: state.log.roster().cosigners().to_vec(),
    })
}
