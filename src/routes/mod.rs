//! HTTP route modules.
//!
//! - `reports`: resupply reminder report
//! - `coupons`: coupon evaluation
//! - `cron_runs`: cron run bookkeeping
//! - `kpi`: manual KPI inputs

pub mod coupons;
pub mod cron_runs;
pub mod kpi;
pub mod reports;
