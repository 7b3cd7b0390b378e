//! # nexo-api: HTTP Service for the Transparency Log
//!
//! Axum/Tower/Tokio front end over [`nexo_log::TransparencyLog`].
//!
//! ## Routes
//!
//! - `GET /health`
//! - `POST /did/register`
//! - `GET /sth/latest`, `GET /sth/chain`
//! - `GET /proof/{index}`
//! - `POST /audit/root`
//! - `GET /cosigners`
//! - `GET /metrics`, `GET /openapi.json`
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → CorsLayer → MetricsMiddleware → Handler
//!
//! Handlers hold no log logic of their own. Every log call runs on the
//! blocking pool through [`AppState::blocking`], and every failure leaves as
//! an [`AppError`].

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .merge(routes::health::router())
        .merge(routes::register::router())
        .merge(routes::sth::router())
        .merge(routes::proof::router())
        .merge(routes::audit::router())
        .merge(routes::cosigners::router())
        .merge(routes::metrics::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
