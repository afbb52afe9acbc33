//! Execution history: record type and the sink contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HistoryError;
use crate::job::{FireOrigin, JobState};

/// Outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionResult {
    Success,
    Failed,
}

impl ExecutionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionResult::Success => "SUCCESS",
            ExecutionResult::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(ExecutionResult::Success),
            "FAILED" => Some(ExecutionResult::Failed),
            _ => None,
        }
    }
}

impl From<ExecutionResult> for JobState {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success => JobState::Success,
            ExecutionResult::Failed => JobState::Failed,
        }
    }
}

/// Immutable record of a finished execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub job_name: String,
    pub origin: FireOrigin,
    pub started_at: DateTime<Utc>,
    pub completion_time: DateTime<Utc>,
    pub result: ExecutionResult,
}

impl ExecutionRecord {
    /// Create a record completed now.
    pub fn new(
        job_name: impl Into<String>,
        origin: FireOrigin,
        started_at: DateTime<Utc>,
        result: ExecutionResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            origin,
            started_at,
            completion_time: Utc::now(),
            result,
        }
    }

    /// Override the completion time.
    pub fn with_completion_time(mut self, completion_time: DateTime<Utc>) -> Self {
        self.completion_time = completion_time;
        self
    }
}

/// Durable, append-only execution history.
///
/// "Most recent" means the latest `completion_time`; ties go to the record
/// appended last.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Append a record.
    async fn append(&self, record: &ExecutionRecord) -> Result<(), HistoryError>;

    /// Most recent record for a job.
    async fn most_recent_by_job(
        &self,
        job_name: &str,
    ) -> Result<Option<ExecutionRecord>, HistoryError>;

    /// All records for a job, newest first.
    async fn list_by_job(&self, job_name: &str) -> Result<Vec<ExecutionRecord>, HistoryError>;

    /// Delete every record for a job. Returns the number removed.
    async fn delete_all_by_job(&self, job_name: &str) -> Result<u64, HistoryError>;
}

/// In-memory history sink.
pub struct MemoryHistorySink {
    records: tokio::sync::RwLock<HashMap<String, Vec<ExecutionRecord>>>,
}

impl MemoryHistorySink {
    /// Create a new memory sink.
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryHistorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistorySink for MemoryHistorySink {
    async fn append(&self, record: &ExecutionRecord) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        records
            .entry(record.job_name.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn most_recent_by_job(
        &self,
        job_name: &str,
    ) -> Result<Option<ExecutionRecord>, HistoryError> {
        let records = self.records.read().await;
        // `max_by_key` keeps the last of equal elements.
        Ok(records
            .get(job_name)
            .and_then(|list| list.iter().max_by_key(|r| r.completion_time))
            .cloned())
    }

    async fn list_by_job(&self, job_name: &str) -> Result<Vec<ExecutionRecord>, HistoryError> {
        let records = self.records.read().await;
        let mut list = records.get(job_name).cloned().unwrap_or_default();
        list.reverse();
        list.sort_by(|a, b| b.completion_time.cmp(&a.completion_time));
        Ok(list)
    }

    async fn delete_all_by_job(&self, job_name: &str) -> Result<u64, HistoryError> {
        let mut records = self.records.write().await;
        Ok(records.remove(job_name).map_or(0, |list| list.len() as u64))
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
