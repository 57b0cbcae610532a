//! # Resupply Reports Library
//!
//! Exposes the Axum router and report modules so the server binary, the cron
//! binary and integration tests share one implementation.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod routes;
pub mod run_log;
pub mod sources;
pub mod state;

use axum::{Extension, Router};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all route modules and middleware.
///
/// The caller provides a connected database pool and the shared state. This
/// function does NOT start a server.
pub fn create_app(app_db: PgPool, state: AppState) -> Router {
    Router::new()
        .merge(routes::reports::router())
        .merge(routes::coupons::router())
        .merge(routes::cron_runs::router())
        .merge(routes::kpi::router())
        .layer(Extension(app_db))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
