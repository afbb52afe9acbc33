//! Job registry.
//!
//! Maps job name to its validated definition. Backed by a `DashMap` so
//! lookups and inserts for unrelated names never contend on one lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cron::Schedule;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::calendar::parse_cron;
use crate::error::SchedulerError;
use crate::job::{JobDefinition, JobPayload};

/// A validated job held by the registry.
#[derive(Debug, Clone)]
pub struct RegisteredJob {
    pub definition: JobDefinition,
    /// Effective priority (request value or scheduler default).
    pub priority: i32,
    pub schedule: Schedule,
    /// Registration order.
    pub seq: u64,
}

impl RegisteredJob {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Thread-safe job registry.
pub struct JobRegistry {
    jobs: DashMap<String, Arc<RegisteredJob>>,
    next_seq: AtomicU64,
    default_priority: i32,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new(default_priority: i32) -> Self {
        Self {
            jobs: DashMap::new(),
            next_seq: AtomicU64::new(1),
            default_priority,
        }
    }

    /// Validate a definition without touching the registry.
    ///
    /// Returns `IncorrectJobRequest` for an empty name, an empty command or
    /// a cron expression that does not parse.
    pub fn prepare(&self, definition: JobDefinition) -> Result<RegisteredJob, SchedulerError> {
        if definition.name.trim().is_empty() {
            return Err(SchedulerError::IncorrectJobRequest(
                "job name cannot be empty".to_string(),
            ));
        }

        if let JobPayload::NativeCommand { command } = &definition.payload {
            if command.trim().is_empty() {
                return Err(SchedulerError::IncorrectJobRequest(format!(
                    "job '{}' has an empty command",
                    definition.name
                )));
            }
        }

        let schedule = parse_cron(&definition.cron)?;
        let priority = definition.priority.unwrap_or(self.default_priority);

        Ok(RegisteredJob {
            definition,
            priority,
            schedule,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Insert a new job.
    ///
    /// Returns `JobAlreadyExists` if the name is taken.
    pub fn insert(&self, job: RegisteredJob) -> Result<Arc<RegisteredJob>, SchedulerError> {
        match self.jobs.entry(job.name().to_string()) {
            Entry::Occupied(entry) => Err(SchedulerError::JobAlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let job = Arc::new(job);
                entry.insert(job.clone());
                Ok(job)
            }
        }
    }

    /// Replace an existing job, keeping its registration order.
    ///
    /// Returns `JobNotFound` if the name is not registered.
    pub fn replace(&self, mut job: RegisteredJob) -> Result<Arc<RegisteredJob>, SchedulerError> {
        match self.jobs.entry(job.name().to_string()) {
            Entry::Vacant(entry) => Err(SchedulerError::JobNotFound(entry.key().clone())),
            Entry::Occupied(mut entry) => {
                job.seq = entry.get().seq;
                let job = Arc::new(job);
                entry.insert(job.clone());
                Ok(job)
            }
        }
    }

    /// Remove a job.
    pub fn remove(&self, name: &str) -> Option<Arc<RegisteredJob>> {
        self.jobs.remove(name).map(|(_, job)| job)
    }

    /// Get a job by name.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredJob>> {
        self.jobs.get(name).map(|job| job.clone())
    }

    /// Check if a job is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// All jobs, sorted by name.
    pub fn list(&self) -> Vec<Arc<RegisteredJob>> {
        let mut jobs: Vec<_> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by(|a, b| a.name().cmp(b.name()));
        jobs
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
