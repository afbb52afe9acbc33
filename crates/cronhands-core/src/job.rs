//! Job definition, payload and status.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cronhands_config::JobConfig;

use crate::error::TaskError;

/// In-process job body with a compensating action.
///
/// `rollback` runs only after `execute` failed. Its outcome is logged and
/// never changes the recorded result.
#[async_trait]
pub trait ManagedTask: Send + Sync {
    /// Run the task.
    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError>;

    /// Undo the effects of a failed `execute`.
    async fn rollback(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}

/// What a job runs.
#[derive(Clone)]
pub enum JobPayload {
    /// External process started through the shell.
    NativeCommand { command: String },
    /// In-process task.
    ManagedTask(Arc<dyn ManagedTask>),
}

impl fmt::Debug for JobPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPayload::NativeCommand { command } => f
                .debug_struct("NativeCommand")
                .field("command", command)
                .finish(),
            JobPayload::ManagedTask(_) => f.write_str("ManagedTask"),
        }
    }
}

/// Job definition as submitted by a caller.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Unique job name, immutable once created.
    pub name: String,
    /// Cron schedule expression (seconds first, optional year).
    pub cron: String,
    /// Priority under contention; the scheduler default applies when unset.
    pub priority: Option<i32>,
    /// Job body.
    pub payload: JobPayload,
}

impl JobDefinition {
    /// Create a job that runs an external command.
    pub fn native(
        name: impl Into<String>,
        cron: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            priority: None,
            payload: JobPayload::NativeCommand {
                command: command.into(),
            },
        }
    }

    /// Create a job that runs an in-process task.
    pub fn managed(
        name: impl Into<String>,
        cron: impl Into<String>,
        task: Arc<dyn ManagedTask>,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            priority: None,
            payload: JobPayload::ManagedTask(task),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Kind of payload, without the task object.
    pub fn kind(&self) -> JobKind {
        match &self.payload {
            JobPayload::NativeCommand { command } => JobKind::Native {
                command: command.clone(),
            },
            JobPayload::ManagedTask(_) => JobKind::Managed,
        }
    }
}

impl From<&JobConfig> for JobDefinition {
    fn from(config: &JobConfig) -> Self {
        Self {
            name: config.name.clone(),
            cron: config.cron.clone(),
            priority: config.priority,
            payload: JobPayload::NativeCommand {
                command: config.command.clone(),
            },
        }
    }
}

/// How an execution was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireOrigin {
    /// Fired by the trigger calendar.
    Scheduled,
    /// Requested through `execute`.
    Manual,
}

impl FireOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireOrigin::Scheduled => "scheduled",
            FireOrigin::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(FireOrigin::Scheduled),
            "manual" => Some(FireOrigin::Manual),
            _ => None,
        }
    }
}

/// Context handed to a managed task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_name: String,
    /// Fire time of the trigger, or the request time for manual runs.
    pub fire_time: DateTime<Utc>,
    pub origin: FireOrigin,
}

/// Current job state, derived at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Never executed.
    Queued,
    /// An execution is in flight.
    Running,
    /// The most recent execution succeeded.
    Success,
    /// The most recent execution failed.
    Failed,
}

/// Payload kind as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    Native { command: String },
    Managed,
}

/// Snapshot of a registered job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    pub cron: String,
    pub priority: i32,
    pub kind: JobKind,
    pub state: JobState,
    pub next_fire_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTask;

    #[async_trait]
    impl ManagedTask for NoopTask {
        async fn execute(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            Ok(())
        }

        async fn rollback(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn test_native_definition() {
        let def = JobDefinition::native("cleanup", "0 */5 * * * *", "rm -f /tmp/*.lock");
        assert_eq!(def.name, "cleanup");
        assert!(def.priority.is_none());
        assert_eq!(
            def.kind(),
            JobKind::Native {
                command: "rm -f /tmp/*.lock".to_string()
            }
        );
    }

    #[test]
    fn test_managed_definition_with_priority() {
        let def = JobDefinition::managed("reindex", "0 0 * * * *", Arc::new(NoopTask))
            .with_priority(9);
        assert_eq!(def.priority, Some(9));
        assert_eq!(def.kind(), JobKind::Managed);
        assert_eq!(format!("{:?}", def.payload), "ManagedTask");
    }

    #[test]
    fn test_definition_from_config() {
        let config = JobConfig {
            name: "backup".to_string(),
            cron: "0 30 2 * * *".to_string(),
            priority: Some(8),
            command: "backup.sh --full".to_string(),
        };
        let def = JobDefinition::from(&config);
        assert_eq!(def.name, "backup");
        assert_eq!(def.priority, Some(8));
        assert_eq!(
            def.kind(),
            JobKind::Native {
                command: "backup.sh --full".to_string()
            }
        );
    }

    #[test]
    fn test_fire_origin_parse() {
        for origin in [FireOrigin::Scheduled, FireOrigin::Manual] {
            assert_eq!(FireOrigin::parse(origin.as_str()), Some(origin));
        }
        assert_eq!(FireOrigin::parse("cron"), None);
    }

    #[test]
    fn test_job_state_serialization() {
        let json = serde_json::to_string(&JobState::Queued).unwrap();
        assert_eq!(json, "\"QUEUED\"");
    }

    #[test]
    fn test_job_info_serialization() {
        let info = JobInfo {
            name: "report".to_string(),
            cron: "0 0 9 * * MON-FRI".to_string(),
            priority: 5,
            kind: JobKind::Native {
                command: "report.sh".to_string(),
            },
            state: JobState::Success,
            next_fire_time: None,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["kind"]["type"], "native");
        assert_eq!(value["kind"]["command"], "report.sh");
        assert_eq!(value["state"], "SUCCESS");
    }
}
