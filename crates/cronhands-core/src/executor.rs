//! Execution engine.
//!
//! Runs one job payload to completion, appends exactly one history record
//! and then releases the job's guard. A completion message goes out on the
//! broadcast channel after both.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::guard::GuardPermit;
use crate::history::{ExecutionRecord, ExecutionResult, HistorySink};
use crate::job::{JobPayload, ManagedTask, TaskContext};
use crate::process::ProcessHost;
use crate::registry::RegisteredJob;

const COMPLETION_CHANNEL_CAPACITY: usize = 256;

/// Per-execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Dispatched,
    Running,
    Succeeded,
    Failed,
}

impl ExecutionPhase {
    /// Check if moving to `next` is a legal transition.
    pub fn can_advance_to(self, next: ExecutionPhase) -> bool {
        matches!(
            (self, next),
            (ExecutionPhase::Dispatched, ExecutionPhase::Running)
                | (ExecutionPhase::Dispatched, ExecutionPhase::Failed)
                | (ExecutionPhase::Running, ExecutionPhase::Succeeded)
                | (ExecutionPhase::Running, ExecutionPhase::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionPhase::Succeeded | ExecutionPhase::Failed)
    }
}

/// Tracks the phase of a single execution.
struct Execution<'a> {
    job_name: &'a str,
    phase: ExecutionPhase,
}

impl<'a> Execution<'a> {
    fn new(job_name: &'a str) -> Self {
        Self {
            job_name,
            phase: ExecutionPhase::Dispatched,
        }
    }

    fn advance(&mut self, next: ExecutionPhase) {
        if self.phase.can_advance_to(next) {
            debug!("Job '{}': {:?} -> {:?}", self.job_name, self.phase, next);
            self.phase = next;
        } else {
            warn!(
                "Job '{}': ignoring illegal transition {:?} -> {:?}",
                self.job_name, self.phase, next
            );
        }
    }

    fn finish(mut self, result: ExecutionResult) -> ExecutionResult {
        let next = match result {
            ExecutionResult::Success => ExecutionPhase::Succeeded,
            ExecutionResult::Failed => ExecutionPhase::Failed,
        };
        self.advance(next);
        result
    }
}

/// Runs job payloads and reports their outcome.
pub struct ExecutionEngine {
    history: Arc<dyn HistorySink>,
    host: Arc<dyn ProcessHost>,
    completions: broadcast::Sender<ExecutionRecord>,
    log_output: bool,
}

impl ExecutionEngine {
    /// Create a new engine.
    pub fn new(history: Arc<dyn HistorySink>, host: Arc<dyn ProcessHost>, log_output: bool) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            history,
            host,
            completions,
            log_output,
        }
    }

    /// Receive one record per finished execution.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionRecord> {
        self.completions.subscribe()
    }

    /// Run `job` to completion.
    ///
    /// Outcomes never surface as errors: they end up in the returned record.
    /// The permit is released after the record has been appended.
    pub async fn run(
        &self,
        job: Arc<RegisteredJob>,
        ctx: TaskContext,
        permit: GuardPermit,
    ) -> ExecutionRecord {
        let started_at = Utc::now();
        let mut execution = Execution::new(job.name());
        info!(
            "Job '{}' started ({}, fire time {})",
            job.name(),
            ctx.origin.as_str(),
            ctx.fire_time.to_rfc3339()
        );

        let result = match &job.definition.payload {
            JobPayload::NativeCommand { command } => {
                self.run_native(&mut execution, command).await
            }
            JobPayload::ManagedTask(task) => {
                self.run_managed(&mut execution, task.as_ref(), &ctx).await
            }
        };
        let result = execution.finish(result);

        let record = ExecutionRecord::new(job.name(), ctx.origin, started_at, result);
        if let Err(e) = self.history.append(&record).await {
            error!(
                "Failed to record execution of job '{}' ({}): {}",
                job.name(),
                result.as_str(),
                e
            );
        }
        drop(permit);

        match result {
            ExecutionResult::Success => info!("Job '{}' succeeded", job.name()),
            ExecutionResult::Failed => warn!("Job '{}' failed", job.name()),
        }

        // No subscribers is fine.
        let _ = self.completions.send(record.clone());
        record
    }

    async fn run_native(&self, execution: &mut Execution<'_>, command: &str) -> ExecutionResult {
        let mut child = match self.host.spawn(command) {
            Ok(child) => child,
            Err(e) => {
                error!(
                    "Failed to spawn command for job '{}': {}",
                    execution.job_name, e
                );
                return ExecutionResult::Failed;
            }
        };
        execution.advance(ExecutionPhase::Running);

        let job_name = execution.job_name;
        let log_output = self.log_output;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, _, _) = tokio::join!(
            child.wait(),
            drain(stdout, job_name, StreamKind::Stdout, log_output),
            drain(stderr, job_name, StreamKind::Stderr, log_output),
        );

        match status {
            Ok(status) if status.success() => ExecutionResult::Success,
            Ok(status) => {
                warn!(
                    "Command for job '{}' exited with code {}",
                    job_name,
                    status.code().unwrap_or(-1)
                );
                ExecutionResult::Failed
            }
            Err(e) => {
                error!("Failed to wait for job '{}': {}", job_name, e);
                ExecutionResult::Failed
            }
        }
    }

    async fn run_managed(
        &self,
        execution: &mut Execution<'_>,
        task: &dyn ManagedTask,
        ctx: &TaskContext,
    ) -> ExecutionResult {
        execution.advance(ExecutionPhase::Running);

        let failure = match AssertUnwindSafe(task.execute(ctx)).catch_unwind().await {
            Ok(Ok(())) => return ExecutionResult::Success,
            Ok(Err(e)) => e,
            Err(panic) => TaskError::Execution(panic_message(panic.as_ref())),
        };

        warn!(
            "Task for job '{}' failed, rolling back: {}",
            execution.job_name, failure
        );

        match AssertUnwindSafe(task.rollback(ctx)).catch_unwind().await {
            Ok(Ok(())) => debug!("Rollback of job '{}' completed", execution.job_name),
            Ok(Err(e)) => error!("Rollback of job '{}' failed: {}", execution.job_name, e),
            Err(panic) => error!(
                "Rollback of job '{}' panicked: {}",
                execution.job_name,
                panic_message(panic.as_ref())
            ),
        }

        ExecutionResult::Failed
    }
}

#[derive(Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Read a process stream to the end, logging each line.
async fn drain<R>(stream: Option<R>, job_name: &str, kind: StreamKind, log_output: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if !log_output {
                    continue;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                match kind {
                    StreamKind::Stdout => {
                        info!(target: "cronhands::process", job = job_name, "{}", line)
                    }
                    StreamKind::Stderr => {
                        warn!(target: "cronhands::process", job = job_name, "{}", line)
                    }
                }
            }
            Err(e) => {
                debug!("Stopped reading output of job '{}': {}", job_name, e);
                break;
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
