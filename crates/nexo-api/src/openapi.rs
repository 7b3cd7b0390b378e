//! # OpenAPI Document
//!
//! Assembles every utoipa-documented route into one document, served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Generated OpenAPI document for the whole HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "NEXO Transparency Log API",
        description = "Append-only registry of identity public keys. Each registration is committed into a Merkle tree whose root is published as a signed tree head, cosigned by a t-of-n set of Ed25519 cosigners and hash-linked to its predecessor.",
    ),
    paths(
        crate::routes::health::health,
        crate::routes::register::register,
        crate::routes::sth::latest_sth,
        crate::routes::sth::sth_chain,
        crate::routes::proof::inclusion_proof,
        crate::routes::audit::audit_root,
        crate::routes::cosigners::cosigners,
        crate::routes::metrics::metrics,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::health::HealthResponse,
        crate::routes::register::RegisterRequest,
        crate::routes::register::RegisterResponse,
        crate::routes::sth::PolicyView,
        crate::routes::sth::SignatureView,
        crate::routes::sth::SthView,
        crate::routes::proof::ProofResponse,
        crate::routes::audit::AuditLeaf,
        crate::routes::audit::AuditRootRequest,
        crate::routes::audit::AuditRootResponse,
        crate::routes::cosigners::CosignerView,
        crate::routes::cosigners::RosterView,
    )),
    tags(
        (name = "health", description = "Liveness and store counts"),
        (name = "registration", description = "Identity registration"),
        (name = "sth", description = "Signed tree heads and the hash-linked chain"),
        (name = "proof", description = "Merkle inclusion proofs"),
        (name = "audit", description = "Root recomputation from raw leaves"),
        (name = "cosigners", description = "Public cosigner roster and threshold policy"),
        (name = "metrics", description = "Prometheus exposition"),
    )
)]
pub struct ApiDoc;

/// Serve the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
