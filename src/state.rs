//! Shared request state: configuration and the outgoing mailer.

use std::sync::Arc;

use crate::config::Config;
use crate::db::AppDb;
use crate::handlers::cron_runs::OwnerNotifier;
use crate::mail::DynMailer;
use crate::run_log::{AlertTarget, RunLog};
use crate::sources::PgReportSource;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when no mail transport could be configured.
    pub mailer: Option<DynMailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Option<DynMailer>) -> Self {
        Self {
            config: Arc::new(config),
            mailer,
        }
    }

    pub fn alert_target(&self) -> Option<AlertTarget> {
        Some(AlertTarget {
            mailer: self.mailer.clone()?,
            recipient: self.config.alert_email.clone()?,
        })
    }

    pub fn owner_notifier(&self) -> Option<OwnerNotifier> {
        Some(OwnerNotifier {
            mailer: self.mailer.clone()?,
            owner_email: self.config.owner_email.clone()?,
        })
    }

    /// A fresh log for one run, wired to the configured alert recipient.
    pub fn run_log(&self) -> RunLog {
        RunLog::new().with_alerts(self.alert_target())
    }

    pub fn report_source(&self, pool: AppDb) -> PgReportSource {
        PgReportSource::new(pool).with_internal_email_pattern(&self.config.internal_email_pattern)
    }
}
