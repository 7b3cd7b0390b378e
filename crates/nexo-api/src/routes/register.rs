//! `POST /did/register`: append an identity to the log.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use nexo_core::decode_base64;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Identifier to register, e.g. a DID.
    pub id: String,
    /// Base64 32-byte public key.
    pub public_key: String,
    /// Registration time, Unix seconds.
    pub timestamp: i64,
}

/// Registration response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    /// Confirmation text.
    pub message: String,
    /// Tree size after the append.
    pub tree_size: u64,
}

/// Build the registration router.
pub fn router() -> Router<AppState> {
    Router::new().route("/did/register", post(register))
}

/// POST /did/register
///
/// Validates the key length and timestamp, appends the leaf, and publishes
/// a new STH covering it.
#[utoipa::path(
    post,
    path = "/did/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 503, description = "STH under-signed in strict mode", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let req = extract_json(body)?;
    let public_key = decode_base64("public_key", &req.public_key)?;
    let receipt = state
        .blocking(move |log| Ok(log.register_leaf(&req.id, public_key, req.timestamp)?))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "DID registered successfully".to_string(),
            tree_size: receipt.tree_size,
        }),
    ))
}
