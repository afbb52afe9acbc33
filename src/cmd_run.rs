//! Foreground scheduler run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use cronhands_config::{Config, ConfigLoader, ConfigValidator, HistoryConfig};
use cronhands_core::{HistorySink, JobDefinition, MemoryHistorySink, SchedulerContext};
use cronhands_history_sqlite::SqliteHistorySink;

/// Run the scheduler until Ctrl-C.
pub(crate) async fn run(
    config: Config,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting CronHands v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path.display());

    let validation = ConfigValidator::validate(&config)?;
    for warning in &validation.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }
    if !validation.is_valid() {
        for err in &validation.errors {
            error!("{}: {}", err.path, err.message);
        }
        return Err(format!(
            "invalid configuration ({} error(s))",
            validation.errors.len()
        )
        .into());
    }

    let history = open_history(&config.history).await?;
    let scheduler = SchedulerContext::with_history(config.scheduler.clone(), history);

    for job in &config.jobs {
        match scheduler.create(JobDefinition::from(job)).await {
            Ok(info) => match info.next_fire_time {
                Some(next) => info!("Job '{}' next fires at {}", info.name, next.to_rfc3339()),
                None => info!("Job '{}' has no upcoming fire time", info.name),
            },
            Err(e) => error!("Skipping job '{}': {}", job.name, e),
        }
    }

    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    scheduler.shutdown().await;

    Ok(())
}

/// Build the configured history sink.
async fn open_history(
    config: &HistoryConfig,
) -> Result<Arc<dyn HistorySink>, Box<dyn std::error::Error>> {
    match config.backend.as_str() {
        "sqlite" => {
            let path = history_path(config);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!("Execution history: sqlite ({})", path.display());
            Ok(Arc::new(SqliteHistorySink::open(&path).await?))
        }
        _ => {
            info!("Execution history: memory");
            Ok(Arc::new(MemoryHistorySink::new()))
        }
    }
}

/// Configured database path with `~` expanded, or the default location.
fn history_path(config: &HistoryConfig) -> PathBuf {
    match &config.path {
        Some(path) => PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy())),
        None => default_history_path(),
    }
}

fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cronhands")
        .join("history.db")
}
