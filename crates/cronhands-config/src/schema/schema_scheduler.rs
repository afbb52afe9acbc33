//! Scheduler and job configuration types.

use serde::{Deserialize, Serialize};

/// Default priority for jobs that do not specify one.
pub const DEFAULT_JOB_PRIORITY: i32 = 5;

/// Scheduler engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of concurrent execution slots.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Priority assigned when a job request leaves it unset.
    #[serde(default = "default_priority")]
    pub default_priority: i32,

    /// Upper bound on how long the calendar loop sleeps with nothing scheduled.
    #[serde(default = "default_idle_wait_secs")]
    pub idle_wait_secs: u64,

    /// Shell used to run native commands.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Flag passing the command string to the shell.
    #[serde(default = "default_shell_flag")]
    pub shell_flag: String,

    /// Log stdout/stderr lines of native commands.
    #[serde(default = "default_true")]
    pub log_command_output: bool,
}

fn default_pool_size() -> usize {
    10
}

fn default_priority() -> i32 {
    DEFAULT_JOB_PRIORITY
}

fn default_idle_wait_secs() -> u64 {
    60
}

fn default_shell() -> String {
    if cfg!(target_os = "windows") {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

fn default_shell_flag() -> String {
    if cfg!(target_os = "windows") {
        "/C".to_string()
    } else {
        "-c".to_string()
    }
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            default_priority: default_priority(),
            idle_wait_secs: default_idle_wait_secs(),
            shell: default_shell(),
            shell_flag: default_shell_flag(),
            log_command_output: default_true(),
        }
    }
}

impl SchedulerConfig {
    /// Config with the given pool size and defaults elsewhere.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }
}

/// A native-command job declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job name.
    pub name: String,
    /// Cron schedule expression (6 or 7 fields, seconds first).
    pub cron: String,
    /// Priority; the scheduler default applies when unset.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Shell command to run.
    pub command: String,
}
