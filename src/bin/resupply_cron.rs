//! # Resupply Cron
//!
//! Scheduled run of the resupply reminder report. Writes the report CSV and
//! the run log under the configured output directory, optionally mails the
//! CSV, and mails a summary of any alerts raised along the way.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use resupply_reports::config::Config;
use resupply_reports::error::ReportError;
use resupply_reports::handlers::report::{log_report_failure, run_report};
use resupply_reports::mail::{DynMailer, SmtpMailer};
use resupply_reports::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "resupply-cron", about = "Build and deliver the resupply reminder report")]
struct Args {
    /// First order day to include, `YYYY-MM-DD`.
    #[arg(long = "from")]
    from_date: String,

    /// Last order day to include, `YYYY-MM-DD`. The whole day is included.
    #[arg(long = "to")]
    to_date: String,

    /// Mail the finished CSV to this address.
    #[arg(long = "mail-csv", env = "RESUPPLY_CSV_TO")]
    mail_csv: Option<String>,

    /// Name used for the log file, the end marker and the alert subject.
    #[arg(long, default_value = "Resupply")]
    name: String,

    /// Base directory for `logs/` and `csv/`. Defaults to `OUTPUT_DIR`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resupply_reports=info,resupply_cron=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;

    let mailer: Option<DynMailer> = match SmtpMailer::new(&config.smtp) {
        Ok(mailer) => Some(Arc::new(mailer)),
        Err(e) => {
            warn!("Mail disabled: {}", e);
            None
        }
    };

    let state = AppState::new(config, mailer);
    let output_dir = state.config.output_dir.clone();
    let source = state.report_source(pool);
    let mut log = state.run_log();

    log.log(format!(
        "[START] {} script for {} to {}.",
        args.name, args.from_date, args.to_date
    ));

    let report = match run_report(&args.from_date, &args.to_date, &source, &source, &mut log).await
    {
        Ok(report) => report,
        Err(e) => {
            log_report_failure(&mut log, &e);
            log.finish_and_halt(&args.name).await;
        }
    };

    let file_name = format!("resupply_{}_{}.csv", report.range.start, report.range.end);
    let csv_file = match log.write_csv(&output_dir, &file_name, report.csv_records()) {
        Ok(file) => file,
        Err(e @ ReportError::FileCreate { .. }) => {
            log.log_and_error(e.to_string());
            log.finish_and_halt(&args.name).await;
        }
        Err(e) => {
            log.log_alert_and_error(format!("Could not write CSV {}: {}", file_name, e));
            log.finish_and_halt(&args.name).await;
        }
    };
    info!("Resupply CSV written to {}", csv_file.path().display());

    match log.write_log(&output_dir, &args.name) {
        Ok(log_file) => log.alert(format!("View log file: {}", log_file.path.display())),
        Err(e) => log.log_and_error(format!("Could not write log file: {}", e)),
    }

    if let (Some(to), Some(mailer)) = (args.mail_csv.as_deref(), state.mailer.as_ref()) {
        let subject = format!("{} report {}", args.name, file_name);
        if let Err(e) = log.mail_csv(mailer, &[csv_file], to, &subject).await {
            warn!("CSV mail to {} failed: {}", to, e);
        }
    } else if args.mail_csv.is_some() {
        log.log_and_alert("CSV not mailed: no mail transport configured");
    }

    let text = log.finish(&args.name).await;
    print!("{}", text);

    Ok(())
}
