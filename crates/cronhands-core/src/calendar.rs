//! Trigger calendar: cron parsing and the time-ordered set of pending fires.
//!
//! Every registered job owns exactly one trigger. A trigger holds the next
//! fire time computed from its cron schedule and is recomputed after each
//! fire. Simultaneous fires come out ordered by priority (highest first),
//! then by registration order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::SchedulerError;

/// Parse a cron expression.
///
/// # Cron Expression Format
///
/// `second minute hour day_of_month month day_of_week [year]`
///
/// Examples:
/// - `"0 */5 * * * *"` - Every 5 minutes
/// - `"0 0 9 * * MON-FRI"` - 9 AM on weekdays
/// - `"0 0 0 1 JAN ? 2099"` - Midnight on 1 January 2099
///
/// # Errors
///
/// Returns `IncorrectJobRequest` for a wrong field count, a syntax error, or
/// a schedule that has no future fire time.
pub fn parse_cron(expr: &str) -> Result<Schedule, SchedulerError> {
    let fields = expr.split_whitespace().count();
    if !(6..=7).contains(&fields) {
        return Err(SchedulerError::IncorrectJobRequest(format!(
            "cron expression '{}' must have 6 or 7 fields, found {}",
            expr, fields
        )));
    }

    let schedule = Schedule::from_str(expr).map_err(|e| {
        SchedulerError::IncorrectJobRequest(format!("invalid cron expression '{}': {}", expr, e))
    })?;

    if schedule.upcoming(Utc).next().is_none() {
        return Err(SchedulerError::IncorrectJobRequest(format!(
            "cron expression '{}' will never fire",
            expr
        )));
    }

    Ok(schedule)
}

/// First fire time strictly after `after`.
pub fn next_fire_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// A job's scheduled intent to run.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub job_name: String,
    pub priority: i32,
    pub next_fire_time: Option<DateTime<Utc>>,
    seq: u64,
    schedule: Schedule,
}

/// A trigger that reached its fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueFire {
    pub job_name: String,
    pub priority: i32,
    pub fire_time: DateTime<Utc>,
    /// Registration order, used as the final tie-breaker.
    pub seq: u64,
}

/// Ordering key: fire time, then priority descending, then registration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TriggerKey {
    fire_time: DateTime<Utc>,
    priority: Reverse<i32>,
    seq: u64,
    job_name: String,
}

impl Trigger {
    fn key(&self) -> Option<TriggerKey> {
        self.next_fire_time.map(|fire_time| TriggerKey {
            fire_time,
            priority: Reverse(self.priority),
            seq: self.seq,
            job_name: self.job_name.clone(),
        })
    }
}

#[derive(Default)]
struct CalendarInner {
    triggers: HashMap<String, Trigger>,
    order: BTreeSet<TriggerKey>,
}

impl CalendarInner {
    fn remove(&mut self, job_name: &str) -> Option<Trigger> {
        let trigger = self.triggers.remove(job_name)?;
        if let Some(key) = trigger.key() {
            self.order.remove(&key);
        }
        Some(trigger)
    }

    fn insert(&mut self, trigger: Trigger) {
        if let Some(key) = trigger.key() {
            self.order.insert(key);
        }
        self.triggers.insert(trigger.job_name.clone(), trigger);
    }
}

/// Time-ordered set of triggers.
pub struct TriggerCalendar {
    inner: Mutex<CalendarInner>,
    changed: Notify,
}

impl TriggerCalendar {
    /// Create an empty calendar.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CalendarInner::default()),
            changed: Notify::new(),
        }
    }

    /// Install or replace the trigger for a job.
    ///
    /// Returns the computed next fire time.
    pub fn schedule(
        &self,
        job_name: &str,
        schedule: Schedule,
        priority: i32,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let next_fire_time = next_fire_after(&schedule, now);
        let trigger = Trigger {
            job_name: job_name.to_string(),
            priority,
            next_fire_time,
            seq,
            schedule,
        };

        {
            let mut inner = self.inner.lock();
            inner.remove(job_name);
            inner.insert(trigger);
        }

        match next_fire_time {
            Some(next) => debug!("Trigger for '{}' scheduled for {}", job_name, next.to_rfc3339()),
            None => debug!("Trigger for '{}' has no upcoming fire time", job_name),
        }

        self.changed.notify_one();
        next_fire_time
    }

    /// Remove the trigger for a job.
    pub fn unschedule(&self, job_name: &str) -> bool {
        let removed = self.inner.lock().remove(job_name).is_some();
        if removed {
            debug!("Trigger for '{}' removed", job_name);
            self.changed.notify_one();
        }
        removed
    }

    /// Snapshot of a job's trigger.
    pub fn trigger(&self, job_name: &str) -> Option<Trigger> {
        self.inner.lock().triggers.get(job_name).cloned()
    }

    /// Next fire time of a job.
    pub fn next_fire_time(&self, job_name: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .triggers
            .get(job_name)
            .and_then(|t| t.next_fire_time)
    }

    /// Earliest fire time across all triggers.
    pub fn peek_next(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().order.first().map(|key| key.fire_time)
    }

    /// Take every trigger due at `now` and reschedule each past `now`.
    ///
    /// Fire times missed while nobody was polling collapse into one fire.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<DueFire> {
        let mut guard = self.inner.lock();
        let CalendarInner { triggers, order } = &mut *guard;
        let mut due = Vec::new();

        while order.first().is_some_and(|key| key.fire_time <= now) {
            let Some(key) = order.pop_first() else {
                break;
            };
            let Some(trigger) = triggers.get_mut(&key.job_name) else {
                continue;
            };

            due.push(DueFire {
                job_name: key.job_name.clone(),
                priority: trigger.priority,
                fire_time: key.fire_time,
                seq: trigger.seq,
            });

            trigger.next_fire_time = next_fire_after(&trigger.schedule, now);
            if let Some(next_key) = trigger.key() {
                order.insert(next_key);
            }
        }

        due
    }

    /// Number of triggers.
    pub fn len(&self) -> usize {
        self.inner.lock().triggers.len()
    }

    /// Check if the calendar is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().triggers.is_empty()
    }

    /// Resolves when a trigger was added, replaced or removed.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

impl Default for TriggerCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "calendar_tests.rs"]
mod tests;
