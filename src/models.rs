//! Domain models for the reporting service.
//!
//! Database records derive `sqlx::FromRow` and map one-to-one onto the tables
//! in `migrations/`. Records whose raw columns need checking (order status)
//! are converted into typed rows before they reach the aggregation code.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

// ============================================================================
// Orders
// ============================================================================

/// Order statuses included in the resupply report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Canceled,
    #[serde(rename = "Pending Resupply")]
    PendingResupply,
    Active,
    #[serde(rename = "Awaiting Processing")]
    AwaitingProcessing,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Canceled,
        OrderStatus::PendingResupply,
        OrderStatus::Active,
        OrderStatus::AwaitingProcessing,
        OrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Canceled => "Canceled",
            OrderStatus::PendingResupply => "Pending Resupply",
            OrderStatus::Active => "Active",
            OrderStatus::AwaitingProcessing => "Awaiting Processing",
            OrderStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ReportError::Query(format!("Unrecognized order status: {}", s)))
    }
}

/// Raw order row as returned by the resupply query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRecord {
    pub order_id: i32,
    pub date_ordered: NaiveDateTime,
    pub next_bill: Option<NaiveDateTime>,
    pub now: NaiveDateTime,
    pub source: String,
    pub status: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub recur_skus: Option<String>,
    pub onetime_skus: Option<String>,
    pub product_id: i32,
}

/// An order row with a checked status, ready for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub order_id: i32,
    pub date_ordered: NaiveDateTime,
    pub next_bill: Option<NaiveDateTime>,
    pub now: NaiveDateTime,
    pub source: String,
    pub status: OrderStatus,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub recur_sku_string: Option<String>,
    pub onetime_sku_string: Option<String>,
    pub product_id: i32,
}

impl OrderRow {
    /// Whether the member is still billed in the future.
    pub fn is_active_member(&self) -> bool {
        self.next_bill.is_some_and(|next| next > self.now)
    }
}

impl TryFrom<OrderRecord> for OrderRow {
    type Error = ReportError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: record.order_id,
            date_ordered: record.date_ordered,
            next_bill: record.next_bill,
            now: record.now,
            source: record.source,
            status: record.status.parse()?,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email_address,
            recur_sku_string: record.recur_skus,
            onetime_sku_string: record.onetime_skus,
            product_id: record.product_id,
        })
    }
}

/// Price data for one SKU of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PricePoint {
    pub sku: String,
    pub price_point: String,
    pub price: f64,
}

// ============================================================================
// Coupons
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub coupon_id: i32,
    pub coupon_code: String,
    pub description: String,
    pub value: f64,
    pub discount_type: String,
    pub req_skus: String,
    pub can_recur: bool,
    pub count: i32,
    pub expiration: Option<NaiveDate>,
    pub active: bool,
    pub is_giftcard: bool,
    pub coupon_source: String,
    pub order_type: Option<String>,
    pub crm_class: Option<String>,
}

// ============================================================================
// Cron runs and KPI inputs
// ============================================================================

/// Result of a last-capture lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastCapture {
    /// Date part of the latest recorded interval end.
    PostDate(NaiveDate),
    /// End of the latest collection day.
    CapturedTime(NaiveDateTime),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KpiInput {
    pub report_day: NaiveDate,
    pub product_id: i32,
    pub num_transactions_for_day_visa_only: i32,
    pub num_chargebacks_for_day_visa_only: i32,
}

/// A day's KPI counts for one product, as shown on the entry page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiCounts {
    pub count_trans: i32,
    pub count_cb: i32,
}

/// Which KPI counter a put request updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiField {
    Transactions,
    Chargebacks,
}

impl KpiField {
    pub fn column(&self) -> &'static str {
        match self {
            KpiField::Transactions => "num_transactions_for_day_visa_only",
            KpiField::Chargebacks => "num_chargebacks_for_day_visa_only",
        }
    }
}

// ============================================================================
// Request Models (Deserialize from JSON input)
// ============================================================================

/// Request body for running the resupply report.
#[derive(Debug, Deserialize)]
pub struct ResupplyReportRequest {
    pub date_start: String,
    pub date_end: String,
}

/// Query string for coupon description lookups.
#[derive(Debug, Default, Deserialize)]
pub struct CouponMessageQuery {
    pub custom_message: Option<String>,
}

/// Query string for applying a coupon to a price.
#[derive(Debug, Deserialize)]
pub struct DiscountQuery {
    pub price: f64,
    pub custom_message: Option<String>,
}

/// Request body for checking coupon requirements against a cart.
#[derive(Debug, Deserialize)]
pub struct CartRequirementsRequest {
    /// SKU to quantity.
    pub cart: BTreeMap<String, i64>,
}

/// Request body for recording a finished cron run.
#[derive(Debug, Deserialize)]
pub struct CronRunFinishedRequest {
    pub product_id: i32,
    pub cron_script_id: i32,
    pub collection_days: Vec<NaiveDate>,
}

/// Query string for the last-capture lookup.
#[derive(Debug, Deserialize)]
pub struct LastCaptureQuery {
    pub product_id: i32,
    #[serde(default = "default_cron_name")]
    pub cron_name: String,
    #[serde(default)]
    pub use_post_date: bool,
}

fn default_cron_name() -> String {
    "capture".to_string()
}

/// Request body for updating one KPI counter.
#[derive(Debug, Deserialize)]
pub struct KpiPutRequest {
    pub field: KpiField,
    /// Raw input from the entry form; must be a non-negative whole number.
    pub count: String,
}

// ============================================================================
// Response Models
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }
}
