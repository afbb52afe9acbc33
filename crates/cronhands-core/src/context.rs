//! Scheduler context.
//!
//! Owns the registry, calendar, guard, dispatcher and engine, and exposes
//! the admin operations. Cheap to clone: every clone shares one scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cronhands_config::SchedulerConfig;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::calendar::TriggerCalendar;
use crate::dispatcher::{Dispatcher, PendingJob};
use crate::error::{SchedulerError, SchedulerResult};
use crate::executor::ExecutionEngine;
use crate::guard::ConcurrencyGuard;
use crate::history::{ExecutionRecord, HistorySink, MemoryHistorySink};
use crate::job::{JobDefinition, JobInfo, JobState};
use crate::process::{ProcessHost, ShellProcessHost};
use crate::registry::{JobRegistry, RegisteredJob};
use crate::state::StateTracker;

struct Lifecycle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

struct ContextInner {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    calendar: Arc<TriggerCalendar>,
    guard: ConcurrencyGuard,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<ExecutionEngine>,
    state: StateTracker,
    history: Arc<dyn HistorySink>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

/// Handle to a running scheduler.
#[derive(Clone)]
pub struct SchedulerContext {
    inner: Arc<ContextInner>,
}

impl SchedulerContext {
    /// Create a scheduler with in-memory history and the configured shell.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_history(config, Arc::new(MemoryHistorySink::new()))
    }

    /// Create a scheduler with a custom history sink.
    pub fn with_history(config: SchedulerConfig, history: Arc<dyn HistorySink>) -> Self {
        let host = Arc::new(ShellProcessHost::from_config(&config));
        Self::with_components(config, history, host)
    }

    /// Create a scheduler with a custom history sink and process host.
    pub fn with_components(
        mut config: SchedulerConfig,
        history: Arc<dyn HistorySink>,
        host: Arc<dyn ProcessHost>,
    ) -> Self {
        if config.pool_size == 0 {
            warn!("Pool size 0 is not usable, using 1");
            config.pool_size = 1;
        }

        let registry = Arc::new(JobRegistry::new(config.default_priority));
        let calendar = Arc::new(TriggerCalendar::new());
        let guard = ConcurrencyGuard::new();
        let engine = Arc::new(ExecutionEngine::new(
            history.clone(),
            host,
            config.log_command_output,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            config.pool_size,
            guard.clone(),
            registry.clone(),
            engine.clone(),
        ));
        let state = StateTracker::new(guard.clone(), history.clone());

        Self {
            inner: Arc::new(ContextInner {
                config,
                registry,
                calendar,
                guard,
                dispatcher,
                engine,
                state,
                history,
                lifecycle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Register a new job and install its trigger.
    pub async fn create(&self, definition: JobDefinition) -> SchedulerResult<JobInfo> {
        let name = definition.name.clone();
        if self.inner.registry.contains(&name) {
            return Err(SchedulerError::JobAlreadyExists(name));
        }

        let job = self.inner.registry.prepare(definition)?;
        let permit = self
            .inner
            .guard
            .try_acquire(&name)
            .ok_or_else(|| SchedulerError::JobAlreadyExists(name.clone()))?;

        let job = self.inner.registry.insert(job)?;
        self.install_trigger(&job);
        drop(permit);

        info!("Job '{}' created ({})", name, job.definition.cron);
        self.job_info(&job).await
    }

    /// Replace a job's definition.
    ///
    /// The new definition is validated first; on failure the registered job
    /// and its trigger stay as they were.
    pub async fn update(&self, definition: JobDefinition) -> SchedulerResult<JobInfo> {
        let name = definition.name.clone();
        if !self.inner.registry.contains(&name) {
            return Err(SchedulerError::JobNotFound(name));
        }

        let permit = self
            .inner
            .guard
            .try_acquire(&name)
            .ok_or_else(|| SchedulerError::JobCurrentlyRunning(name.clone()))?;

        let job = self.inner.registry.prepare(definition)?;
        let job = self.inner.registry.replace(job)?;
        self.install_trigger(&job);
        self.inner.dispatcher.purge(&name);
        drop(permit);

        info!("Job '{}' updated ({})", name, job.definition.cron);
        self.job_info(&job).await
    }

    /// Remove a job, its trigger and its execution history.
    pub async fn delete(&self, name: &str) -> SchedulerResult<()> {
        if !self.inner.registry.contains(name) {
            return Err(SchedulerError::JobNotFound(name.to_string()));
        }

        let permit = self
            .inner
            .guard
            .try_acquire(name)
            .ok_or_else(|| SchedulerError::JobCurrentlyRunning(name.to_string()))?;

        let purged = self.inner.history.delete_all_by_job(name).await?;
        self.inner.registry.remove(name);
        self.inner.calendar.unschedule(name);
        self.inner.dispatcher.purge(name);
        drop(permit);

        info!("Job '{}' deleted ({} history record(s) removed)", name, purged);
        Ok(())
    }

    /// Run a job now, ahead of every scheduled fire.
    ///
    /// The job counts as running from this call until its execution ends.
    /// The job's schedule is not affected.
    pub fn execute(&self, name: &str) -> SchedulerResult<()> {
        let job = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;

        let permit = self
            .inner
            .guard
            .try_acquire(name)
            .ok_or_else(|| SchedulerError::JobCurrentlyRunning(name.to_string()))?;

        self.inner.dispatcher.submit_manual(&job, permit, Utc::now());
        info!("Job '{}' submitted for immediate execution", name);
        Ok(())
    }

    /// Snapshot of one job.
    pub async fn get_job_info(&self, name: &str) -> SchedulerResult<JobInfo> {
        let job = self.registered(name)?;
        self.job_info(&job).await
    }

    /// Snapshot of every job, sorted by name.
    pub async fn list_jobs(&self) -> SchedulerResult<Vec<JobInfo>> {
        let jobs = self.inner.registry.list();
        let mut infos = Vec::with_capacity(jobs.len());
        for job in &jobs {
            infos.push(self.job_info(job).await?);
        }
        Ok(infos)
    }

    /// Current state of a job.
    pub async fn get_state(&self, name: &str) -> SchedulerResult<JobState> {
        self.registered(name)?;
        self.inner.state.get_state(name).await
    }

    /// Execution records of a job, newest first.
    pub async fn history(&self, name: &str) -> SchedulerResult<Vec<ExecutionRecord>> {
        self.registered(name)?;
        Ok(self.inner.history.list_by_job(name).await?)
    }

    /// Next fire time of a job.
    pub fn next_fire_time(&self, name: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        self.registered(name)?;
        Ok(self.inner.calendar.next_fire_time(name))
    }

    /// Receive one record per finished execution.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionRecord> {
        self.inner.engine.subscribe()
    }

    /// Names of jobs currently holding their guard.
    pub fn running_jobs(&self) -> Vec<String> {
        self.inner.guard.running_jobs()
    }

    /// Fires waiting for a pool slot, in admission order.
    pub fn pending_jobs(&self) -> Vec<PendingJob> {
        self.inner.dispatcher.pending_jobs()
    }

    /// Fires dropped because their job was busy.
    pub fn misfire_count(&self) -> u64 {
        self.inner.dispatcher.misfire_count()
    }

    /// Hand every trigger due at `now` to the dispatcher.
    ///
    /// Returns the number of fires queued.
    pub fn fire_due(&self, now: DateTime<Utc>) -> usize {
        fire_due(&self.inner.calendar, &self.inner.dispatcher, now)
    }

    /// Start the calendar loop and the dispatcher.
    ///
    /// Returns `false` if already started. Must be called within a Tokio
    /// runtime.
    pub fn start(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(self.inner.dispatcher.clone().run(shutdown_rx.clone()));
        let calendar = tokio::spawn(run_calendar_loop(
            self.inner.calendar.clone(),
            self.inner.dispatcher.clone(),
            Duration::from_secs(self.inner.config.idle_wait_secs.max(1)),
            shutdown_rx,
        ));

        *lifecycle = Some(Lifecycle {
            shutdown,
            tasks: vec![dispatcher, calendar],
        });
        info!(
            "Scheduler started ({} slots, {} jobs)",
            self.inner.config.pool_size,
            self.inner.registry.len()
        );
        true
    }

    /// Stop the calendar loop and the dispatcher.
    ///
    /// Executions already running are left to finish.
    pub async fn shutdown(&self) {
        let Some(lifecycle) = self.inner.lifecycle.lock().take() else {
            return;
        };

        let _ = lifecycle.shutdown.send(true);
        for task in lifecycle.tasks {
            if let Err(e) = task.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }

        let running = self.running_jobs();
        if running.is_empty() {
            info!("Scheduler stopped");
        } else {
            info!("Scheduler stopped; still running: {}", running.join(", "));
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.lifecycle.lock().is_some()
    }

    fn registered(&self, name: &str) -> SchedulerResult<Arc<RegisteredJob>> {
        self.inner
            .registry
            .get(name)
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))
    }

    fn install_trigger(&self, job: &RegisteredJob) {
        self.inner.calendar.schedule(
            job.name(),
            job.schedule.clone(),
            job.priority,
            job.seq,
            Utc::now(),
        );
    }

    async fn job_info(&self, job: &RegisteredJob) -> SchedulerResult<JobInfo> {
        Ok(JobInfo {
            name: job.name().to_string(),
            cron: job.definition.cron.clone(),
            priority: job.priority,
            kind: job.definition.kind(),
            state: self.inner.state.get_state(job.name()).await?,
            next_fire_time: self.inner.calendar.next_fire_time(job.name()),
        })
    }
}

fn fire_due(calendar: &TriggerCalendar, dispatcher: &Dispatcher, now: DateTime<Utc>) -> usize {
    let due = calendar.take_due(now);
    if due.is_empty() {
        return 0;
    }
    debug!("{} trigger(s) due at {}", due.len(), now.to_rfc3339());
    dispatcher.submit_due(due)
}

/// Sleep until the next fire time, hand due triggers over, repeat.
async fn run_calendar_loop(
    calendar: Arc<TriggerCalendar>,
    dispatcher: Arc<Dispatcher>,
    idle_wait: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Calendar loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        fire_due(&calendar, &dispatcher, Utc::now());

        let wait = match calendar.peek_next() {
            Some(next) => (next - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(idle_wait),
            None => idle_wait,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = calendar.changed() => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Calendar loop stopped");
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
