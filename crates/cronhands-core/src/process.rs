//! Process host: starts native commands through the platform shell.

use std::process::Stdio;

use cronhands_config::SchedulerConfig;
use tokio::process::{Child, Command};

/// Starts external processes for native-command jobs.
pub trait ProcessHost: Send + Sync {
    /// Spawn `command` with stdout and stderr piped.
    fn spawn(&self, command: &str) -> std::io::Result<Child>;
}

/// Runs commands as `<shell> <flag> <command>`.
#[derive(Debug, Clone)]
pub struct ShellProcessHost {
    shell: String,
    flag: String,
}

impl ShellProcessHost {
    pub fn new(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            flag: flag.into(),
        }
    }

    /// Build from the scheduler section of the config.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.shell.clone(), config.shell_flag.clone())
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellProcessHost {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }
}

impl ProcessHost for ShellProcessHost {
    fn spawn(&self, command: &str) -> std::io::Result<Child> {
        Command::new(&self.shell)
            .arg(&self.flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}
