//! Coupon evaluation routes.
//!
//! GET  /coupons/{code}                  - Coupon details
//! GET  /coupons/{code}/description      - Customer-facing coupon text
//! GET  /coupons/{code}/discount         - Apply the coupon to a price
//! GET  /coupons/{code}/sources/{source} - Whether the coupon is usable from a source
//! GET  /coupons/{code}/skus/{sku}       - Whether the coupon applies to a SKU
//! POST /coupons/{code}/requirements     - Whether a cart meets the coupon's SKU requirements

use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use crate::db::AppDb;
use crate::error::{ReportError, ReportResult};
use crate::handlers::coupons::{self, DiscountQuote};
use crate::models::{
    ApiResponse, CartRequirementsRequest, Coupon, CouponMessageQuery, DiscountQuery,
};

/// Build the coupons router.
pub fn router() -> Router {
    Router::new()
        .route("/coupons/{code}", get(get_coupon))
        .route("/coupons/{code}/description", get(get_description))
        .route("/coupons/{code}/discount", get(get_discount))
        .route("/coupons/{code}/sources/{source}", get(check_source))
        .route("/coupons/{code}/skus/{sku}", get(check_sku))
        .route("/coupons/{code}/requirements", post(check_requirements))
}

async fn load(pool: &AppDb, code: &str) -> ReportResult<Coupon> {
    coupons::find_coupon(pool, code)
        .await?
        .filter(|coupon| coupons::is_valid(Some(coupon), code))
        .ok_or_else(|| ReportError::NotFound(format!("Coupon {}", code)))
}

/// Retrieve a coupon by code.
async fn get_coupon(
    Extension(pool): Extension<AppDb>,
    Path(code): Path<String>,
) -> ReportResult<Json<ApiResponse<Coupon>>> {
    let coupon = load(&pool, &code).await?;
    Ok(Json(ApiResponse::new(coupon, "Coupon retrieved")))
}

async fn get_description(
    Extension(pool): Extension<AppDb>,
    Path(code): Path<String>,
    Query(query): Query<CouponMessageQuery>,
) -> ReportResult<Json<ApiResponse<Option<String>>>> {
    let coupon = load(&pool, &code).await?;
    let text = coupons::description(&coupon, query.custom_message.as_deref());
    Ok(Json(ApiResponse::new(text, "Coupon description")))
}

async fn get_discount(
    Extension(pool): Extension<AppDb>,
    Path(code): Path<String>,
    Query(query): Query<DiscountQuery>,
) -> ReportResult<Json<ApiResponse<Option<DiscountQuote>>>> {
    let coupon = load(&pool, &code).await?;
    let quote = coupons::discount_on_price(&coupon, query.price, query.custom_message.as_deref());
    Ok(Json(ApiResponse::new(quote, "Coupon discount")))
}

async fn check_source(
    Extension(pool): Extension<AppDb>,
    Path((code, source)): Path<(String, String)>,
) -> ReportResult<Json<ApiResponse<bool>>> {
    let coupon = load(&pool, &code).await?;
    Ok(Json(ApiResponse::new(
        coupons::is_type(&coupon, &source),
        "Coupon source checked",
    )))
}

async fn check_sku(
    Extension(pool): Extension<AppDb>,
    Path((code, sku)): Path<(String, String)>,
) -> ReportResult<Json<ApiResponse<bool>>> {
    let coupon = load(&pool, &code).await?;
    Ok(Json(ApiResponse::new(
        coupons::applies_to_sku(&coupon, &sku),
        "Coupon SKU checked",
    )))
}

async fn check_requirements(
    Extension(pool): Extension<AppDb>,
    Path(code): Path<String>,
    Json(req): Json<CartRequirementsRequest>,
) -> ReportResult<Json<ApiResponse<bool>>> {
    let coupon = load(&pool, &code).await?;
    let met = coupons::requirements_met(&req.cart, &coupon.req_skus, coupon.kind());
    Ok(Json(ApiResponse::new(met, "Coupon requirements checked")))
}
