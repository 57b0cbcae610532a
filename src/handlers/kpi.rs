//! Manual KPI inputs: daily Visa transaction and chargeback counts per product.

use std::collections::BTreeMap;

use chrono::{Months, NaiveDate};
use tracing::info;

use crate::db::AppDb;
use crate::error::{ReportError, ReportResult};
use crate::handlers::dates::parse_strict_day;
use crate::models::{KpiCounts, KpiField, KpiInput};

/// Parse a counter typed into the entry form.
pub fn parse_count(raw: &str) -> ReportResult<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|count| *count >= 0)
        .ok_or_else(|| ReportError::validation("Must be a number."))
}

pub fn parse_day(raw: &str) -> ReportResult<NaiveDate> {
    parse_strict_day(raw)
        .ok_or_else(|| ReportError::validation("Please provide a date in the format yyyy-mm-dd."))
}

/// First day of a `YYYY-MM` month and the first day of the next month.
pub fn month_bounds(raw: &str) -> ReportResult<(NaiveDate, NaiveDate)> {
    let invalid = || ReportError::validation("Please provide a month in the format yyyy-mm.");

    let first = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").map_err(|_| invalid())?;
    if raw.len() != 7 {
        return Err(invalid());
    }
    let next = first.checked_add_months(Months::new(1)).ok_or_else(invalid)?;

    Ok((first, next))
}

/// Counts entered for a day, keyed by product id.
pub async fn day_inputs(pool: &AppDb, day: NaiveDate) -> ReportResult<BTreeMap<i32, KpiCounts>> {
    let rows: Vec<KpiInput> = sqlx::query_as(
        r#"
        SELECT report_day, product_id,
               num_transactions_for_day_visa_only,
               num_chargebacks_for_day_visa_only
        FROM kpi_inputs
        WHERE report_day = $1
        ORDER BY product_id
        "#,
    )
    .bind(day)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.product_id,
                KpiCounts {
                    count_trans: row.num_transactions_for_day_visa_only,
                    count_cb: row.num_chargebacks_for_day_visa_only,
                },
            )
        })
        .collect())
}

/// Store one counter for a product and day, creating the row if needed.
pub async fn put_input(
    pool: &AppDb,
    day: NaiveDate,
    product_id: i32,
    field: KpiField,
    count: i32,
) -> ReportResult<KpiInput> {
    // `column` is one of the two fixed counter names.
    let sql = format!(
        r#"
        INSERT INTO kpi_inputs (report_day, product_id, {column})
        VALUES ($1, $2, $3)
        ON CONFLICT (report_day, product_id)
        DO UPDATE SET {column} = EXCLUDED.{column}
        RETURNING report_day, product_id,
                  num_transactions_for_day_visa_only,
                  num_chargebacks_for_day_visa_only
        "#,
        column = field.column()
    );

    let input: KpiInput = sqlx::query_as(&sql)
        .bind(day)
        .bind(product_id)
        .bind(count)
        .fetch_one(pool)
        .await?;

    info!(
        "KPI {} for product {} on {} set to {}",
        field.column(),
        product_id,
        day,
        count
    );

    Ok(input)
}

/// Every input entered in a month, by day then product.
pub async fn monthly_inputs(pool: &AppDb, month: &str) -> ReportResult<Vec<KpiInput>> {
    let (first, next) = month_bounds(month)?;

    let rows = sqlx::query_as(
        r#"
        SELECT report_day, product_id,
               num_transactions_for_day_visa_only,
               num_chargebacks_for_day_visa_only
        FROM kpi_inputs
        WHERE report_day >= $1 AND report_day < $2
        ORDER BY report_day, product_id
        "#,
    )
    .bind(first)
    .bind(next)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(" 42 ").unwrap(), 42);
        assert_eq!(parse_count("0").unwrap(), 0);
        assert!(parse_count("4.5").is_err());
        assert!(parse_count("-1").is_err());
        assert!(parse_count("many").is_err());
        assert!(parse_count("").is_err());
    }

    #[test]
    fn test_month_bounds() {
        let (first, next) = month_bounds("2023-12").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert!(month_bounds("2023-13").is_err());
        assert!(month_bounds("2023-12-05").is_err());
        assert!(month_bounds("").is_err());
    }

    #[test]
    fn test_parse_day() {
        assert!(parse_day("2023-02-28").is_ok());
        assert!(parse_day("2023-02-30").is_err());
        assert!(parse_day("2023-5-2").is_err());
        assert!(parse_day(" 2023-05-02").is_err());
    }
}
