//! CLI definitions for CronHands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CronHands CLI.
#[derive(Parser)]
#[command(name = "cronhands")]
#[command(about = "Cron-driven job runner with a bounded, priority-aware worker pool")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "cronhands.toml", global = true, env = "CRONHANDS_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler in foreground (default)
    Run,

    /// Validate the configuration and show the next fire time of each job
    Validate,

    /// Preview the fire times of a cron expression
    Next {
        /// Cron expression (6 or 7 fields, seconds first)
        cron: String,

        /// Number of fire times to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}
