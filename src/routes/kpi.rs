//! KPI input routes backing the manual entry page.
//!
//! GET /kpi-inputs/{day}              - Counts entered for a day, by product
//! PUT /kpi-inputs/{day}/{product_id} - Update one counter
//! GET /kpi-inputs/month/{month}      - Every input for a `YYYY-MM` month

use std::collections::BTreeMap;

use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};

use crate::db::AppDb;
use crate::error::ReportResult;
use crate::handlers::kpi;
use crate::models::{ApiResponse, KpiCounts, KpiInput, KpiPutRequest};

/// Build the KPI inputs router.
pub fn router() -> Router {
    Router::new()
        .route("/kpi-inputs/month/{month}", get(monthly_list))
        .route("/kpi-inputs/{day}", get(day_inputs))
        .route("/kpi-inputs/{day}/{product_id}", put(put_input))
}

async fn day_inputs(
    Extension(pool): Extension<AppDb>,
    Path(day): Path<String>,
) -> ReportResult<Json<ApiResponse<BTreeMap<i32, KpiCounts>>>> {
    let day = kpi::parse_day(&day)?;
    let inputs = kpi::day_inputs(&pool, day).await?;
    Ok(Json(ApiResponse::new(inputs, "KPI inputs retrieved")))
}

async fn put_input(
    Extension(pool): Extension<AppDb>,
    Path((day, product_id)): Path<(String, i32)>,
    Json(req): Json<KpiPutRequest>,
) -> ReportResult<Json<ApiResponse<KpiInput>>> {
    let day = kpi::parse_day(&day)?;
    let count = kpi::parse_count(&req.count)?;
    let input = kpi::put_input(&pool, day, product_id, req.field, count).await?;
    Ok(Json(ApiResponse::new(input, "Updated.")))
}

async fn monthly_list(
    Extension(pool): Extension<AppDb>,
    Path(month): Path<String>,
) -> ReportResult<Json<ApiResponse<Vec<KpiInput>>>> {
    let inputs = kpi::monthly_inputs(&pool, &month).await?;
    let message = if inputs.is_empty() {
        "Nothing returned."
    } else {
        "Monthly KPI inputs retrieved"
    };
    Ok(Json(ApiResponse::new(inputs, message)))
}
