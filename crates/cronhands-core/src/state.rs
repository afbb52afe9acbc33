//! Job state derivation.

use std::sync::Arc;

use crate::error::SchedulerResult;
use crate::guard::ConcurrencyGuard;
use crate::history::HistorySink;
use crate::job::JobState;

/// Computes a job's state from the guard and the latest history record.
///
/// Nothing is cached: every call reads both sources.
#[derive(Clone)]
pub struct StateTracker {
    guard: ConcurrencyGuard,
    history: Arc<dyn HistorySink>,
}

impl StateTracker {
    pub fn new(guard: ConcurrencyGuard, history: Arc<dyn HistorySink>) -> Self {
        Self { guard, history }
    }

    /// Current state of `job_name`.
    pub async fn get_state(&self, job_name: &str) -> SchedulerResult<JobState> {
        if self.guard.is_running(job_name) {
            return Ok(JobState::Running);
        }

        let latest = self.history.most_recent_by_job(job_name).await?;
        Ok(latest.map_or(JobState::Queued, |record| record.result.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ExecutionRecord, ExecutionResult, MemoryHistorySink};
    use crate::job::FireOrigin;
    use chrono::Utc;

    fn tracker() -> (StateTracker, ConcurrencyGuard, Arc<MemoryHistorySink>) {
        let guard = ConcurrencyGuard::new();
        let history = Arc::new(MemoryHistorySink::new());
        (
            StateTracker::new(guard.clone(), history.clone()),
            guard,
            history,
        )
    }

    #[tokio::test]
    async fn test_queued_without_history() {
        let (tracker, _, _) = tracker();
        assert_eq!(tracker.get_state("a").await.unwrap(), JobState::Queued);
    }

    #[tokio::test]
    async fn test_latest_result_wins() {
        let (tracker, _, history) = tracker();
        let now = Utc::now();
        history
            .append(&ExecutionRecord::new("a", FireOrigin::Scheduled, now, ExecutionResult::Success))
            .await
            .unwrap();
        assert_eq!(tracker.get_state("a").await.unwrap(), JobState::Success);

        history
            .append(&ExecutionRecord::new("a", FireOrigin::Manual, now, ExecutionResult::Failed))
            .await
            .unwrap();
        assert_eq!(tracker.get_state("a").await.unwrap(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_running_overrides_history() {
        let (tracker, guard, history) = tracker();
        history
            .append(&ExecutionRecord::new(
                "a",
                FireOrigin::Scheduled,
                Utc::now(),
                ExecutionResult::Failed,
            ))
            .await
            .unwrap();

        let permit = guard.try_acquire("a").unwrap();
        assert_eq!(tracker.get_state("a").await.unwrap(), JobState::Running);
        drop(permit);
        assert_eq!(tracker.get_state("a").await.unwrap(), JobState::Failed);
    }
}
