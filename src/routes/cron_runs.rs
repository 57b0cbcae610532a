//! Cron run bookkeeping routes.
//!
//! POST /cron-runs              - Record a finished cron run
//! GET  /cron-runs/last-capture - Latest capture time or post date for a product

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::AppDb;
use crate::error::ReportResult;
use crate::handlers::cron_runs;
use crate::models::{ApiResponse, CronRunFinishedRequest, LastCapture, LastCaptureQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CronRunInterval {
    pub product_id: i32,
    pub cron_script_id: i32,
    pub interval_start: NaiveDate,
    pub interval_end: NaiveDate,
}

/// Build the cron runs router.
pub fn router() -> Router {
    Router::new()
        .route("/cron-runs", post(record_finished))
        .route("/cron-runs/last-capture", get(last_capture))
}

async fn record_finished(
    Extension(pool): Extension<AppDb>,
    Extension(state): Extension<AppState>,
    Json(req): Json<CronRunFinishedRequest>,
) -> ReportResult<(StatusCode, Json<ApiResponse<CronRunInterval>>)> {
    let notifier = state.owner_notifier();
    let (interval_start, interval_end) = cron_runs::record_finished(
        &pool,
        notifier.as_ref(),
        req.product_id,
        req.cron_script_id,
        &req.collection_days,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            CronRunInterval {
                product_id: req.product_id,
                cron_script_id: req.cron_script_id,
                interval_start,
                interval_end,
            },
            "Cron run recorded",
        )),
    ))
}

async fn last_capture(
    Extension(pool): Extension<AppDb>,
    Extension(state): Extension<AppState>,
    Query(query): Query<LastCaptureQuery>,
) -> ReportResult<Json<ApiResponse<Option<LastCapture>>>> {
    let notifier = state.owner_notifier();
    let capture = cron_runs::last_capture(
        &pool,
        notifier.as_ref(),
        query.product_id,
        &query.cron_name,
        query.use_post_date,
    )
    .await?;

    let message = if capture.is_some() {
        "Last capture retrieved"
    } else {
        "No cron runs recorded"
    };

    Ok(Json(ApiResponse::new(capture, message)))
}
