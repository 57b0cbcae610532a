//! Resupply reminder report routes.
//!
//! POST /reports/resupply         - Run the report for a date range
//! POST /reports/resupply/buckets - Raw aggregation buckets for a date range

use axum::routing::post;
use axum::{Extension, Json, Router};
use tracing::info;

use crate::db::AppDb;
use crate::error::ReportResult;
use crate::handlers::buckets::BucketSet;
use crate::handlers::dates::DateRange;
use crate::handlers::report::{collect_buckets, run_report, ResupplyReport};
use crate::models::{ApiResponse, ResupplyReportRequest};
use crate::run_log::RunLog;
use crate::state::AppState;

const RUN_NAME: &str = "Resupply";

/// Build the reports router.
pub fn router() -> Router {
    Router::new()
        .route("/reports/resupply", post(resupply_report))
        .route("/reports/resupply/buckets", post(resupply_buckets))
}

/// Run the resupply reminder report.
///
/// Invalid dates are rejected with 400 before any query runs. A database
/// failure is returned as a 500 carrying the query error message.
async fn resupply_report(
    Extension(pool): Extension<AppDb>,
    Extension(state): Extension<AppState>,
    Json(req): Json<ResupplyReportRequest>,
) -> ReportResult<Json<ApiResponse<ResupplyReport>>> {
    let source = state.report_source(pool);
    let mut log = state.run_log();

    let result = run_report(&req.date_start, &req.date_end, &source, &source, &mut log).await;
    mail_pending_alerts(&mut log).await;
    let report = result?;

    info!(
        "Resupply report served for {} to {}",
        report.range.start, report.range.end
    );

    let message = if report.is_empty() {
        "No resupply orders in range"
    } else {
        "Resupply report generated"
    };

    Ok(Json(ApiResponse::new(report, message)))
}

/// Return the aggregation buckets without joining price points.
async fn resupply_buckets(
    Extension(pool): Extension<AppDb>,
    Extension(state): Extension<AppState>,
    Json(req): Json<ResupplyReportRequest>,
) -> ReportResult<Json<ApiResponse<BucketSet>>> {
    let range = DateRange::parse(&req.date_start, &req.date_end)?;
    let source = state.report_source(pool);
    let mut log = state.run_log();

    let result = collect_buckets(&source, &range, &mut log).await;
    mail_pending_alerts(&mut log).await;

    Ok(Json(ApiResponse::new(result?, "Resupply buckets generated")))
}

/// Requests only mail when something went wrong.
async fn mail_pending_alerts(log: &mut RunLog) {
    if !log.alerts().is_empty() {
        log.finish(RUN_NAME).await;
    }
}
