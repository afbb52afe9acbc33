//! CronHands - cron-driven job runner
//!
//! Main entry point for the CronHands CLI.

mod cli;
mod cmd_run;
mod cmd_validate;

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cronhands_config::{ConfigLoader, LoggingConfig};

use crate::cli::{Cli, Commands};

/// Initialize tracing with a console layer and, when a log directory is
/// configured, a daily-rotated file layer.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &logging.dir {
        Some(dir) => {
            let dir = PathBuf::from(ConfigLoader::expand_path(&dir.to_string_lossy()));
            std::fs::create_dir_all(&dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("cronhands")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes the file writer on exit; must outlive main.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Next { cron, count }) => cmd_validate::preview(&cron, count),
        Some(Commands::Validate) => {
            let config = ConfigLoader::load(&cli.config)?;
            cmd_validate::validate(&config)
        }
        Some(Commands::Run) | None => {
            let config = ConfigLoader::load_or_default(&cli.config)?;
            init_tracing(&config.logging)?;
            cmd_run::run(config, &cli.config).await
        }
    }
}
