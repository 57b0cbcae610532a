//! # Resupply Reminder Report
//!
//! Validates the date range, fetches resupply orders, aggregates them into
//! [`BucketSet`] counters and joins the counters with each product's price
//! points. Every product gets one row per priced SKU followed by a totals row.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ReportError, ReportResult};
use crate::handlers::buckets::{BucketSet, ProductSku};
use crate::handlers::dates::DateRange;
use crate::models::PricePoint;
use crate::run_log::RunLog;
use crate::sources::{OrderSource, PricingLookup};

pub const TOTALS_LABEL: &str = "TOTAL";

/// Statistics for one SKU of one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub total_members: i64,
    pub purchased: i64,
    pub active_members: i64,
    pub canceled: i64,
    pub sku: String,
    pub price_point: String,
    pub price: f64,
    pub revenue: f64,
}

/// Sums across a product's SKU rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsRow {
    pub name: &'static str,
    pub total_members: i64,
    pub purchased: i64,
    pub active_members: i64,
    pub canceled: i64,
    pub revenue: f64,
}

impl Default for TotalsRow {
    fn default() -> Self {
        Self {
            name: TOTALS_LABEL,
            total_members: 0,
            purchased: 0,
            active_members: 0,
            canceled: 0,
            revenue: 0.0,
        }
    }
}

impl TotalsRow {
    fn add(&mut self, row: &ReportRow) {
        self.total_members += row.total_members;
        self.purchased += row.purchased;
        self.active_members += row.active_members;
        self.canceled += row.canceled;
        self.revenue = round_cents(self.revenue + row.revenue);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    pub product_id: i32,
    pub skus: Vec<ReportRow>,
    pub totals: TotalsRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResupplyReport {
    pub range: DateRange,
    pub products: Vec<ProductReport>,
}

impl ResupplyReport {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Header plus one record per SKU row and per totals row.
    pub fn csv_records(&self) -> Vec<Vec<String>> {
        let mut records = vec![[
            "product_id",
            "sku",
            "price_point",
            "price",
            "total_members",
            "active_members",
            "canceled",
            "purchased",
            "revenue",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()];

        for product in &self.products {
            for row in &product.skus {
                records.push(vec![
                    product.product_id.to_string(),
                    row.sku.clone(),
                    row.price_point.clone(),
                    format!("{:.2}", row.price),
                    row.total_members.to_string(),
                    row.active_members.to_string(),
                    row.canceled.to_string(),
                    row.purchased.to_string(),
                    format!("{:.2}", row.revenue),
                ]);
            }

            let totals = &product.totals;
            records.push(vec![
                product.product_id.to_string(),
                totals.name.to_string(),
                String::new(),
                String::new(),
                totals.total_members.to_string(),
                totals.active_members.to_string(),
                totals.canceled.to_string(),
                totals.purchased.to_string(),
                format!("{:.2}", totals.revenue),
            ]);
        }

        records
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `purchased * price * quantity purchased`, rounded to cents.
pub fn revenue(purchased: i64, price: f64, qty_purchased: i64) -> f64 {
    round_cents(purchased as f64 * price * qty_purchased as f64)
}

/// Build one product's rows from the buckets. Buckets are only read.
pub fn product_report(buckets: &BucketSet, product_id: i32, points: &[PricePoint]) -> ProductReport {
    let mut totals = TotalsRow::default();
    let mut skus = Vec::with_capacity(points.len());

    for point in points {
        let key = ProductSku::new(product_id, &point.sku);
        let purchased = buckets.purchased.count(&key);
        let qty_purchased = buckets.sku_qty_purchased.count(&point.sku);

        let row = ReportRow {
            total_members: buckets.sku.count(&point.sku),
            purchased,
            active_members: buckets.active_members_sku.count(&key),
            canceled: buckets.canceled.count(&key),
            sku: point.sku.clone(),
            price_point: point.price_point.clone(),
            price: point.price,
            revenue: revenue(purchased, point.price, qty_purchased),
        };

        totals.add(&row);
        skus.push(row);
    }

    ProductReport {
        product_id,
        skus,
        totals,
    }
}

/// Join buckets with price points for every product, in first-seen order.
///
/// A product whose pricing cannot be loaded is alerted and reported with no
/// SKU rows.
pub async fn build_products(
    buckets: &BucketSet,
    pricing: &dyn PricingLookup,
    log: &mut RunLog,
) -> Vec<ProductReport> {
    let mut products = Vec::with_capacity(buckets.pid.len());

    for &product_id in buckets.pid.keys() {
        let points = match pricing.price_points(product_id).await {
            Ok(points) => points,
            Err(e) => {
                log.log_alert_and_error(format!(
                    "Could not load price points for product {}: {}",
                    product_id, e
                ));
                Vec::new()
            }
        };

        if points.is_empty() {
            warn!("No price points for product {}", product_id);
        }

        products.push(product_report(buckets, product_id, &points));
    }

    products
}

/// Fetch and aggregate the orders in `range`. No orders gives empty buckets.
pub async fn collect_buckets(
    orders: &dyn OrderSource,
    range: &DateRange,
    log: &mut RunLog,
) -> ReportResult<BucketSet> {
    match orders.fetch_resupply_orders(range).await {
        Ok(rows) => {
            log.log(format!(
                "Fetched {} resupply orders for {} to {}",
                rows.len(),
                range.start,
                range.end
            ));
            Ok(BucketSet::from_rows(&rows))
        }
        Err(ReportError::NoRowsFound) => {
            log.log(format!(
                "No resupply orders for {} to {}",
                range.start, range.end
            ));
            Ok(BucketSet::new())
        }
        Err(e) => {
            log.log_alert_and_error(e.to_string());
            Err(e)
        }
    }
}

/// Run the whole report. Dates are validated before anything is fetched.
pub async fn run_report(
    date_start: &str,
    date_end: &str,
    orders: &dyn OrderSource,
    pricing: &dyn PricingLookup,
    log: &mut RunLog,
) -> ReportResult<ResupplyReport> {
    let range = DateRange::parse(date_start, date_end)?;
    let buckets = collect_buckets(orders, &range, log).await?;
    let products = build_products(&buckets, pricing, log).await;

    info!(
        "Resupply report for {} to {}: {} products",
        range.start,
        range.end,
        products.len()
    );

    Ok(ResupplyReport { range, products })
}

/// Record a failed run on the log. Query failures were already alerted by
/// [`collect_buckets`], so they are only logged here.
pub fn log_report_failure(log: &mut RunLog, error: &ReportError) {
    let message = format!("Report failed: {}", error);
    match error {
        ReportError::Query(_) => log.log_and_error(message),
        _ => log.log_alert_and_error(message),
    }
}
