//! Cron run bookkeeping.
//!
//! Capture scripts record the span of collection days they processed; later
//! runs read the latest span back to decide where to resume.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{error, info};

use crate::db::AppDb;
use crate::error::{ReportError, ReportResult};
use crate::mail::{DynMailer, EmailMessage};
use crate::models::LastCapture;

/// Recorded interval ends are the start of the last collection day; captures
/// run through 22:00 of that day.
pub const CAPTURE_DAY_OFFSET_SECS: i64 = 79_200;

/// Earliest and latest collection day. `None` when no days are given.
pub fn collection_interval(days: &[NaiveDate]) -> Option<(NaiveDate, NaiveDate)> {
    let start = days.iter().min()?;
    let end = days.iter().max()?;
    Some((*start, *end))
}

/// End of the capture window for a recorded interval end.
pub fn capture_cutoff(interval_end: NaiveDateTime) -> NaiveDateTime {
    interval_end + Duration::seconds(CAPTURE_DAY_OFFSET_SECS)
}

/// Who hears about bookkeeping failures.
#[derive(Clone)]
pub struct OwnerNotifier {
    pub mailer: DynMailer,
    pub owner_email: String,
}

impl OwnerNotifier {
    pub async fn notify(&self, message: &str) {
        let email = EmailMessage::text(&self.owner_email, "Cron run problem", message);
        if let Err(e) = self.mailer.send(email).await {
            error!("Could not notify cron owner: {}", e);
        }
    }
}

/// Record that a cron script finished processing `collection_days`.
pub async fn record_finished(
    pool: &AppDb,
    notifier: Option<&OwnerNotifier>,
    product_id: i32,
    cron_script_id: i32,
    collection_days: &[NaiveDate],
) -> ReportResult<(NaiveDate, NaiveDate)> {
    if product_id == 0 || cron_script_id == 0 {
        error!("Problem with inputs for cron run");
        return Err(ReportError::validation(
            "product_id and cron_script_id are required",
        ));
    }

    let Some((interval_start, interval_end)) = collection_interval(collection_days) else {
        error!("Problem with inputs for cron run");
        return Err(ReportError::validation("collection_days must not be empty"));
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO cron_runs (product_id, cron_script_id, interval_start, interval_end)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(product_id)
    .bind(cron_script_id)
    .bind(interval_start)
    .bind(interval_end)
    .execute(pool)
    .await;

    if let Err(e) = inserted {
        let message = format!("Cron could not insert start time. {}", e);
        error!("{}", message);
        if let Some(notifier) = notifier {
            notifier.notify(&message).await;
        }
        return Err(e.into());
    }

    info!(
        "Cron script {} finished for product {}: {} to {}",
        cron_script_id, product_id, interval_start, interval_end
    );

    Ok((interval_start, interval_end))
}

/// The latest capture point for a product's named cron script.
pub async fn last_capture(
    pool: &AppDb,
    notifier: Option<&OwnerNotifier>,
    product_id: i32,
    cron_name: &str,
    use_post_date: bool,
) -> ReportResult<Option<LastCapture>> {
    if product_id == 0 {
        error!("product id is 0");
        return Err(ReportError::validation("product_id is required"));
    }
    if cron_name.is_empty() {
        error!("need a cron name");
        return Err(ReportError::validation("cron_name is required"));
    }

    let latest: Result<Option<NaiveDateTime>, sqlx::Error> = sqlx::query_scalar(
        r#"
        SELECT MAX(cr.interval_end)::timestamp
        FROM cron_runs cr
        LEFT JOIN cron_scripts cs USING (cron_script_id)
        WHERE cr.product_id = $1
          AND cs.name_of_cron = $2
        "#,
    )
    .bind(product_id)
    .bind(cron_name)
    .fetch_one(pool)
    .await;

    let latest = match latest {
        Ok(latest) => latest,
        Err(e) => {
            if let Some(notifier) = notifier {
                notifier.notify(&format!("Problem found. {}", e)).await;
            }
            return Err(e.into());
        }
    };

    Ok(latest.map(|end| {
        if use_post_date {
            LastCapture::PostDate(end.date())
        } else {
            LastCapture::CapturedTime(capture_cutoff(end))
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mail::testing::RecordingMailer;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 2, d).unwrap()
    }

    #[test]
    fn test_collection_interval_sorts_days() {
        assert_eq!(
            collection_interval(&[day(14), day(3), day(9)]),
            Some((day(3), day(14)))
        );
        assert_eq!(collection_interval(&[day(5)]), Some((day(5), day(5))));
        assert_eq!(collection_interval(&[]), None);
    }

    #[test]
    fn test_capture_cutoff_is_end_of_day() {
        let start_of_day = day(9).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            capture_cutoff(start_of_day),
            day(9).and_hms_opt(22, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_owner_notification() {
        let recorder = Arc::new(RecordingMailer::default());
        let notifier = OwnerNotifier {
            mailer: recorder.clone(),
            owner_email: "owner@example.com".into(),
        };

        notifier.notify("Cron could not insert start time.").await;

        let sent = recorder.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Cron run problem");
        assert_eq!(sent[0].body, "Cron could not insert start time.");
    }
}
