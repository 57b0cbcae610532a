//! # Resupply Reports Service
//!
//! Serves the resupply reminder report and the coupon, cron run and KPI
//! bookkeeping endpoints over HTTP.
//!
//! ## Architecture
//!
//! - Axum handles HTTP routing and request/response lifecycle
//! - SQLx manages the reporting database
//! - Lettre delivers alert and owner mail over SMTP

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use resupply_reports::config::Config;
use resupply_reports::mail::{DynMailer, SmtpMailer};
use resupply_reports::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resupply_reports=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting resupply reports service");

    let config = Config::from_env();

    let app_db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    info!("Connected to reporting database");

    sqlx::migrate!("./migrations").run(&app_db).await?;
    info!("Application migrations complete");

    let mailer: Option<DynMailer> = match SmtpMailer::new(&config.smtp) {
        Ok(mailer) => Some(Arc::new(mailer)),
        Err(e) => {
            warn!("Mail disabled: {}", e);
            None
        }
    };

    let bind_addr = config.bind_addr.clone();
    let app = resupply_reports::create_app(app_db, AppState::new(config, mailer));

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
