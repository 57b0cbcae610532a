//! Environment-driven configuration.
//!
//! Every value has a default so the service starts against a local stack
//! without a `.env` file. Binaries call `dotenvy::dotenv()` before
//! `Config::from_env()`.

use std::path::PathBuf;

/// Default SQL `LIKE` pattern for internal (staff) lead emails excluded from reports.
pub const DEFAULT_INTERNAL_EMAIL_PATTERN: &str = "%hungryfish%";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Recipient of run alerts. `None` disables alert mail.
    pub alert_email: Option<String>,
    /// Recipient of cron bookkeeping problems.
    pub owner_email: Option<String>,
    pub internal_email_pattern: String,
    /// Base directory for the `logs/` and `csv/` output folders.
    pub output_dir: PathBuf,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: crate::db::pool_from_env(),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            alert_email: env_opt("ALERT_EMAIL"),
            owner_email: env_opt("OWNER_EMAIL"),
            internal_email_pattern: env_or(
                "INTERNAL_EMAIL_PATTERN",
                DEFAULT_INTERNAL_EMAIL_PATTERN,
            ),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", ".")),
            smtp: SmtpConfig::from_env(),
        }
    }
}

impl SmtpConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(25);

        Self {
            host: env_or("SMTP_HOST", "localhost"),
            port,
            username: env_opt("SMTP_USERNAME"),
            password: env_opt("SMTP_PASSWORD"),
            from_email: env_or("MAIL_FROM", "reports@localhost"),
            from_name: env_or("MAIL_FROM_NAME", "Resupply Reports"),
            reply_to: env_opt("MAIL_REPLY_TO"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
