//! Dispatcher and worker pool.
//!
//! Due fires wait in a priority queue until one of the pool's slots frees
//! up. Admission order is: manual requests first, then higher priority,
//! then earlier fire time, then registration order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, watch};
use tracing::{debug, info, warn};

use crate::calendar::DueFire;
use crate::executor::ExecutionEngine;
use crate::guard::{ConcurrencyGuard, GuardPermit};
use crate::job::{FireOrigin, TaskContext};
use crate::registry::{JobRegistry, RegisteredJob};

/// A fire waiting for a pool slot.
#[derive(Debug)]
struct PendingFire {
    job_name: String,
    priority: i32,
    fire_time: DateTime<Utc>,
    origin: FireOrigin,
    job_seq: u64,
    submit_seq: u64,
    /// Held from acceptance for manual requests.
    permit: Option<GuardPermit>,
}

impl PendingFire {
    fn rank(&self) -> (bool, i32, Reverse<DateTime<Utc>>, Reverse<u64>, Reverse<u64>) {
        (
            self.origin == FireOrigin::Manual,
            self.priority,
            Reverse(self.fire_time),
            Reverse(self.job_seq),
            Reverse(self.submit_seq),
        )
    }

    fn snapshot(&self) -> PendingJob {
        PendingJob {
            job_name: self.job_name.clone(),
            priority: self.priority,
            fire_time: self.fire_time,
            origin: self.origin,
        }
    }
}

impl PartialEq for PendingFire {
    fn eq(&self, other: &Self) -> bool {
        self.submit_seq == other.submit_seq
    }
}

impl Eq for PendingFire {}

impl PartialOrd for PendingFire {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingFire {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Snapshot of a queued fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingJob {
    pub job_name: String,
    pub priority: i32,
    pub fire_time: DateTime<Utc>,
    pub origin: FireOrigin,
}

/// Admits fires into a fixed number of execution slots.
pub struct Dispatcher {
    pool: Arc<Semaphore>,
    pool_size: usize,
    queue: Mutex<BinaryHeap<PendingFire>>,
    wakeup: Notify,
    guard: ConcurrencyGuard,
    registry: Arc<JobRegistry>,
    engine: Arc<ExecutionEngine>,
    next_submit: AtomicU64,
    misfires: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher with `pool_size` slots.
    pub fn new(
        pool_size: usize,
        guard: ConcurrencyGuard,
        registry: Arc<JobRegistry>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Notify::new(),
            guard,
            registry,
            engine,
            next_submit: AtomicU64::new(1),
            misfires: AtomicU64::new(0),
        }
    }

    /// Queue fires handed over by the calendar.
    ///
    /// A fire is dropped as a misfire when its job is running or already has
    /// a scheduled fire waiting. Returns the number queued.
    pub fn submit_due(&self, fires: Vec<DueFire>) -> usize {
        if fires.is_empty() {
            return 0;
        }

        let mut accepted = 0;
        {
            let mut queue = self.queue.lock();
            for fire in fires {
                if self.guard.is_running(&fire.job_name) {
                    self.record_misfire(&fire.job_name, "already running");
                    continue;
                }
                let waiting = queue
                    .iter()
                    .any(|p| p.job_name == fire.job_name && p.origin == FireOrigin::Scheduled);
                if waiting {
                    self.record_misfire(&fire.job_name, "a fire is already pending");
                    continue;
                }

                debug!(
                    "Queued scheduled fire for '{}' (priority {}, fire time {})",
                    fire.job_name,
                    fire.priority,
                    fire.fire_time.to_rfc3339()
                );
                queue.push(PendingFire {
                    job_name: fire.job_name,
                    priority: fire.priority,
                    fire_time: fire.fire_time,
                    origin: FireOrigin::Scheduled,
                    job_seq: fire.seq,
                    submit_seq: self.next_submit.fetch_add(1, AtomicOrdering::Relaxed),
                    permit: None,
                });
                accepted += 1;
            }
        }

        if accepted > 0 {
            self.wakeup.notify_one();
        }
        accepted
    }

    /// Queue a manual run. The caller already holds the job's guard.
    pub fn submit_manual(&self, job: &RegisteredJob, permit: GuardPermit, now: DateTime<Utc>) {
        debug!("Queued manual run for '{}'", job.name());
        self.queue.lock().push(PendingFire {
            job_name: job.name().to_string(),
            priority: job.priority,
            fire_time: now,
            origin: FireOrigin::Manual,
            job_seq: job.seq,
            submit_seq: self.next_submit.fetch_add(1, AtomicOrdering::Relaxed),
            permit: Some(permit),
        });
        self.wakeup.notify_one();
    }

    /// Drop every queued fire for a job. Returns the number removed.
    pub fn purge(&self, job_name: &str) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|p| p.job_name != job_name);
        let removed = before - queue.len();
        if removed > 0 {
            debug!("Purged {} pending fire(s) for '{}'", removed, job_name);
        }
        removed
    }

    /// Queued fires in admission order.
    pub fn pending_jobs(&self) -> Vec<PendingJob> {
        let queue = self.queue.lock();
        let mut pending: Vec<&PendingFire> = queue.iter().collect();
        pending.sort_by(|a, b| b.cmp(a));
        pending.into_iter().map(PendingFire::snapshot).collect()
    }

    /// Number of queued fires.
    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of free slots.
    pub fn available_slots(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fires dropped because their job was busy.
    pub fn misfire_count(&self) -> u64 {
        self.misfires.load(AtomicOrdering::Relaxed)
    }

    /// Admit queued fires until shutdown is signalled.
    ///
    /// Executions already started keep running after shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Dispatcher started with {} slots", self.pool_size);

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.queue.lock().is_empty() {
                tokio::select! {
                    _ = self.wakeup.notified() => continue,
                    _ = shutdown.changed() => break,
                }
            }

            let slot = tokio::select! {
                slot = self.pool.clone().acquire_owned() => match slot {
                    Ok(slot) => slot,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            let next = self.queue.lock().pop();
            if let Some(fire) = next {
                self.admit(fire, slot);
            }
        }

        info!("Dispatcher stopped");
    }

    fn admit(&self, fire: PendingFire, slot: OwnedSemaphorePermit) {
        // Guard before lookup: update and delete hold it while they mutate.
        let permit = match fire.permit {
            Some(permit) => permit,
            None => match self.guard.try_acquire(&fire.job_name) {
                Some(permit) => permit,
                None => {
                    self.record_misfire(&fire.job_name, "already running");
                    return;
                }
            },
        };

        let job = match self.registry.get(&fire.job_name) {
            Some(job) if job.seq == fire.job_seq => job,
            Some(_) => {
                debug!("Dropping fire for replaced job '{}'", fire.job_name);
                return;
            }
            None => {
                debug!("Dropping fire for removed job '{}'", fire.job_name);
                return;
            }
        };

        let ctx = TaskContext {
            job_name: fire.job_name,
            fire_time: fire.fire_time,
            origin: fire.origin,
        };
        let engine = self.engine.clone();

        tokio::spawn(async move {
            engine.run(job, ctx, permit).await;
            drop(slot);
        });
    }

    fn record_misfire(&self, job_name: &str, reason: &str) {
        self.misfires.fetch_add(1, AtomicOrdering::Relaxed);
        warn!("Misfire for job '{}': {}", job_name, reason);
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
