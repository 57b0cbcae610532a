//! Data sources for the resupply report.
//!
//! The report pipeline reads orders and price points through the
//! [`OrderSource`] and [`PricingLookup`] traits. [`PgReportSource`] implements
//! both over the application database.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::DEFAULT_INTERNAL_EMAIL_PATTERN;
use crate::db::AppDb;
use crate::error::{ReportError, ReportResult};
use crate::handlers::dates::DateRange;
use crate::models::{OrderRecord, OrderRow, OrderStatus, PricePoint};

/// Source marker for orders placed from a resupply reminder.
pub const RESUPPLY_SOURCE: &str = "Resupply Reminder";

#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Resupply orders placed within `range`, ordered by product id then raw
    /// recurring SKU string. An empty result is `ReportError::NoRowsFound`.
    async fn fetch_resupply_orders(&self, range: &DateRange) -> ReportResult<Vec<OrderRow>>;
}

#[async_trait]
pub trait PricingLookup: Send + Sync {
    /// Recurring price points for a product, in display order.
    async fn price_points(&self, product_id: i32) -> ReportResult<Vec<PricePoint>>;
}

/// Postgres-backed order source and pricing lookup.
pub struct PgReportSource {
    pool: AppDb,
    internal_email_pattern: String,
}

impl PgReportSource {
    pub fn new(pool: AppDb) -> Self {
        Self {
            pool,
            internal_email_pattern: DEFAULT_INTERNAL_EMAIL_PATTERN.to_string(),
        }
    }

    /// Override the `LIKE` pattern used to exclude internal lead emails.
    pub fn with_internal_email_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.internal_email_pattern = pattern.into();
        self
    }
}

#[async_trait]
impl OrderSource for PgReportSource {
    async fn fetch_resupply_orders(&self, range: &DateRange) -> ReportResult<Vec<OrderRow>> {
        let statuses: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();

        let records: Vec<OrderRecord> = sqlx::query_as(
            r#"
            SELECT
                od.order_id,
                od.date_ordered,
                od.next_bill,
                NOW()::timestamp AS now,
                od.source,
                od.status,
                ld.first_name,
                ld.last_name,
                ld.email_address,
                od.recur_skus,
                od.onetime_skus,
                od.product_id
            FROM orders od
            LEFT JOIN leads ld USING (lead_id)
            WHERE od.date_ordered >= $1
              AND od.date_ordered < $2
              AND od.status = ANY($3)
              AND od.source = $4
              AND ld.email_address NOT LIKE $5
            ORDER BY od.product_id, od.recur_skus
            "#,
        )
        .bind(range.lower_bound())
        .bind(range.upper_bound_exclusive())
        .bind(statuses)
        .bind(RESUPPLY_SOURCE)
        .bind(&self.internal_email_pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to query resupply orders: {}", e);
            ReportError::Query(e.to_string())
        })?;

        if records.is_empty() {
            return Err(ReportError::NoRowsFound);
        }

        debug!(
            "Fetched {} resupply orders for {} to {}",
            records.len(),
            range.start,
            range.end
        );

        records.into_iter().map(OrderRow::try_from).collect()
    }
}

#[async_trait]
impl PricingLookup for PgReportSource {
    async fn price_points(&self, product_id: i32) -> ReportResult<Vec<PricePoint>> {
        let points: Vec<PricePoint> = sqlx::query_as(
            r#"
            SELECT sku, price_point, price::float8 AS price
            FROM price_points
            WHERE product_id = $1 AND is_recurring
            ORDER BY sort_order, sku
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// In-memory pricing table keyed by product id.
    #[derive(Debug, Clone, Default)]
    pub struct StaticPricing {
        products: HashMap<i32, Vec<PricePoint>>,
    }

    impl StaticPricing {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_product(mut self, product_id: i32, points: Vec<PricePoint>) -> Self {
            self.products.insert(product_id, points);
            self
        }
    }

    #[async_trait]
    impl PricingLookup for StaticPricing {
        async fn price_points(&self, product_id: i32) -> ReportResult<Vec<PricePoint>> {
            Ok(self.products.get(&product_id).cloned().unwrap_or_default())
        }
    }
}
