//! FollowRank daily ranking job
//!
//! 1. Loads the follow graph from the database
//! 2. Ranks every account and computes percentiles
//! 3. Writes the anchor table used for accounts outside the graph
//! 4. Upserts the day's metrics
//!
//! Usage: `rank [YYYY-MM-DD]`, defaulting to today (UTC).

use chrono::{NaiveDate, Utc};
use followrank_common::{config::AppConfig, db::DbPool, metrics, telemetry, VERSION};
use followrank_ranking::{RankingJob, SqlRankingStore};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::error::Error;
use std::path::Path;
use tracing::{error, info};

fn install_exporter(port: u16) -> Result<(), Box<dyn Error>> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(
            Matcher::Suffix("run_duration_seconds".to_string()),
            metrics::RUN_DURATION_BUCKETS,
        )?
        .install()?;
    Ok(())
}

fn run_date() -> Result<NaiveDate, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(arg) => Ok(NaiveDate::parse_from_str(&arg, "%Y-%m-%d")?),
        None => Ok(Utc::now().date_naive()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    telemetry::init_tracing(&config.observability).map_err(|e| -> Box<dyn Error> { e })?;
    info!("Starting FollowRank ranking job v{}", VERSION);

    // The exporter must be the global recorder before metrics are described
    let port = config.observability.metrics_port;
    if port != 0 {
        install_exporter(port)?;
        info!(port, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    config.ranking.validate().map_err(|e| {
        error!(error = %e, "Invalid ranking configuration");
        e
    })?;

    let date = run_date()?;

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ping().await.map_err(|e| {
        error!(error = %e, "Database not reachable, nothing ranked");
        e
    })?;
    let store = SqlRankingStore::new(db, &config.database, &config.output);

    let job = RankingJob::new(config.ranking.clone());
    let anchor_path = Path::new(&config.output.anchor_path);
    let run = job.run_from_store(&store, date, anchor_path).await.map_err(|e| {
        error!(error = %e, code = e.code().as_code(), "Ranking job failed");
        e
    })?;

    info!(
        run_id = %run.run_id,
        %date,
        nodes = run.nodes,
        converged = run.converged,
        "Ranking job finished"
    );

    Ok(())
}
