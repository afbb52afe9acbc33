//! # CronHands Core
//!
//! Scheduling and execution engine for the CronHands job runner.
//!
//! ## Features
//!
//! - Job registry with unique names
//! - Trigger calendar driven by 6/7-field cron expressions
//! - Priority-aware dispatch onto a bounded worker pool
//! - Per-job concurrency guard
//! - Native command and managed task execution with rollback
//! - Job state derived from the guard and execution history

pub mod calendar;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod guard;
pub mod history;
pub mod job;
pub mod process;
pub mod registry;
pub mod state;

pub use calendar::{DueFire, Trigger, TriggerCalendar, next_fire_after, parse_cron};
pub use context::SchedulerContext;
pub use dispatcher::{Dispatcher, PendingJob};
pub use error::{ErrorKind, HistoryError, SchedulerError, SchedulerResult, TaskError};
pub use executor::{ExecutionEngine, ExecutionPhase};
pub use guard::{ConcurrencyGuard, GuardPermit};
pub use history::{ExecutionRecord, ExecutionResult, HistorySink, MemoryHistorySink};
pub use job::{
    FireOrigin, JobDefinition, JobInfo, JobKind, JobPayload, JobState, ManagedTask, TaskContext,
};
pub use process::{ProcessHost, ShellProcessHost};
pub use registry::{JobRegistry, RegisteredJob};
pub use state::StateTracker;

pub use cronhands_config::SchedulerConfig;
