//! `GET /metrics`: Prometheus text exposition.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// Content type of the Prometheus text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Build the metrics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

/// GET /metrics
///
/// Log gauges are refreshed from the store on every scrape.
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus text", body = String, content_type = "text/plain"),
        (status = 500, description = "Encoding failed", body = crate::error::ErrorBody),
    ),
    tag = "metrics"
)]
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let (users_count, sth_count, last) = state
        .blocking(|log| {
            Ok((
                log.leaf_count()?,
                log.sth_count()?,
                log.latest_sth()?.map(|s| s.body.issued_at),
            ))
        })
        .await?;

    state
        .metrics
        .set_log_gauges(users_count, sth_count, last.unwrap_or(0));

    let body = state.metrics.gather_and_encode().map_err(AppError::Internal)?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
