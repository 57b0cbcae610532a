//! Report and bookkeeping logic behind the HTTP routes and the cron binary.
//!
//! - `sku`: SKU string parsing
//! - `dates`: report date range validation
//! - `buckets`: order aggregation into counting buckets
//! - `report`: per-product report rows joined with price points
//! - `coupons`: coupon descriptions, discounts and cart requirements
//! - `cron_runs`: cron run intervals and last capture lookups
//! - `kpi`: manually entered KPI counters

pub mod buckets;
pub mod coupons;
pub mod cron_runs;
pub mod dates;
pub mod kpi;
pub mod report;
pub mod sku;
