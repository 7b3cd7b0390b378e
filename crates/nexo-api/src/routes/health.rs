//! `GET /health`: liveness plus store counts.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use nexo_core::Clock;

use crate::error::AppError;
use crate::state::AppState;

/// Health response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the stores are readable.
    pub status: String,
    /// Server time, Unix seconds.
    pub timestamp: i64,
    /// Registered identities.
    pub users_count: usize,
    /// Published STHs.
    pub sth_count: usize,
}

/// Build the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Stores unreadable", body = crate::error::ErrorBody),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let (users_count, sth_count) = state
        .blocking(|log| Ok((log.leaf_count()?, log.sth_count()?)))
        .await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: state.clock.now_unix(),
        users_count,
        sth_count,
    }))
}
