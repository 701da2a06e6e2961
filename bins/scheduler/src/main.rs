//! Fiscal-year rollover scheduler for fundctl.
//!
//! Periodically moves fiscal years through `future -> current -> past`
//! based on today's date. Locking a year stays a manual operation.
//!
//! Usage:
//!   fundctl-scheduler          - Sweep every `scheduler.interval_secs`
//!   fundctl-scheduler --once   - Sweep once and exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fundctl_core::{Collaborators, FundControl};
use fundctl_db::{PgAuditSink, PgStore, connect_with};
use fundctl_shared::AppConfig;
use fundctl_shared::config::LogConfig;

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn sweep(service: &FundControl<PgStore>) {
    let today = Utc::now().date_naive();
    match service.fiscal().advance_fiscal_years(today).await {
        Ok(transitions) if transitions.is_empty() => {
            info!(%today, "no fiscal year transitions due");
        }
        Ok(transitions) => {
            for t in &transitions {
                info!(year = t.year, from = %t.from, to = %t.to, "fiscal year advanced");
            }
        }
        Err(e) => error!(error = %e, "fiscal year sweep failed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log);

    let db = connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let collaborators =
        Collaborators::default().with_audit(Arc::new(PgAuditSink::new(db.clone())));
    let service = FundControl::new(Arc::new(PgStore::new(db)), collaborators);

    if std::env::args().any(|arg| arg == "--once") {
        sweep(&service).await;
        return Ok(());
    }
    if !config.scheduler.enabled {
        warn!("scheduler disabled by configuration, exiting");
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.scheduler.interval_secs));
    info!(interval_secs = config.scheduler.interval_secs, "scheduler started");
    loop {
        tokio::select! {
            _ = interval.tick() => sweep(&service).await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}
