//! Dropload - Main entry point

use anyhow::Context;
use clap::Parser;
use dropload_common::logging::{init_logging, LogConfig};
use dropload_ingest::cli::Cli;
use dropload_ingest::config::Config;
use dropload_ingest::lock::RunLock;
use dropload_ingest::{db, IngestionEngine, PgImportStore, SpecRegistry};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply(&mut config);

    // Environment variables take precedence over the verbosity flags
    let log_config = LogConfig::builder()
        .level(cli.log_level())
        .filter_directives("sqlx=warn")
        .build()
        .with_env_overrides()?;
    let _log_guard = init_logging(&log_config)?;

    let result = run(config).await;
    if let Err(err) = &result {
        let message = format!("{err:#}");
        error!(error = %message, "Run failed");
    }
    result
}

async fn run(config: Config) -> anyhow::Result<()> {
    let working_dir = std::env::current_dir().context("Failed to read working directory")?;
    let _lock = RunLock::acquire(&working_dir)?;

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    db::health_check(&pool).await.context("Database health check failed")?;

    if config.ingest.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let store = Arc::new(PgImportStore::new(pool));

    let spec_stats = SpecRegistry::new(Arc::clone(&store))
        .process_spec_files(&config.ingest.spec_dir)
        .await?;

    let engine = IngestionEngine::new(store, config.ingest.journal_policy)?;
    let data_stats = engine.process_data_files(&config.ingest.data_dir).await?;

    info!(
        specs_processed = spec_stats.files_processed,
        specs_failed = spec_stats.files_failed,
        files_processed = data_stats.files_processed,
        files_failed = data_stats.files_failed,
        files_skipped = data_stats.files_skipped,
        rows_processed = data_stats.rows_processed,
        rows_failed = data_stats.rows_failed,
        "Run complete"
    );

    Ok(())
}
