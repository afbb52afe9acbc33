//! Per-job concurrency guard.
//!
//! One exclusive slot per job name. A [`GuardPermit`] is handed out on
//! acquisition and releases the slot when dropped, so every exit path of an
//! execution (including a panic) releases it exactly once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// Map of currently held job slots.
#[derive(Clone, Default)]
pub struct ConcurrencyGuard {
    held: Arc<DashMap<String, u64>>,
    next_token: Arc<AtomicU64>,
}

impl ConcurrencyGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `job_name`, or `None` if it is already held.
    pub fn try_acquire(&self, job_name: &str) -> Option<GuardPermit> {
        match self.held.entry(job_name.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                entry.insert(token);
                debug!("Guard acquired for '{}'", job_name);
                Some(GuardPermit {
                    job_name: job_name.to_string(),
                    token,
                    held: self.held.clone(),
                })
            }
        }
    }

    /// Check if the slot for `job_name` is held.
    pub fn is_running(&self, job_name: &str) -> bool {
        self.held.contains_key(job_name)
    }

    /// Names of all held slots, sorted.
    pub fn running_jobs(&self) -> Vec<String> {
        let mut names: Vec<_> = self.held.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Proof of holding a job's slot. Dropping it releases the slot.
#[must_use = "dropping the permit releases the job immediately"]
pub struct GuardPermit {
    job_name: String,
    token: u64,
    held: Arc<DashMap<String, u64>>,
}

impl GuardPermit {
    pub fn job_name(&self) -> &str {
        &self.job_name
    }
}

impl fmt::Debug for GuardPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPermit")
            .field("job_name", &self.job_name)
            .field("token", &self.token)
            .finish()
    }
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        let token = self.token;
        if self
            .held
            .remove_if(&self.job_name, |_, held| *held == token)
            .is_some()
        {
            debug!("Guard released for '{}'", self.job_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let guard = ConcurrencyGuard::new();
        assert!(!guard.is_running("a"));

        let permit = guard.try_acquire("a").unwrap();
        assert_eq!(permit.job_name(), "a");
        assert!(guard.is_running("a"));

        drop(permit);
        assert!(!guard.is_running("a"));
    }

    #[test]
    fn test_second_acquire_rejected() {
        let guard = ConcurrencyGuard::new();
        let _permit = guard.try_acquire("a").unwrap();
        assert!(guard.try_acquire("a").is_none());
    }

    #[test]
    fn test_names_are_independent() {
        let guard = ConcurrencyGuard::new();
        let _a = guard.try_acquire("a").unwrap();
        let _b = guard.try_acquire("b").unwrap();
        assert_eq!(guard.running_jobs(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reacquire_after_release() {
        let guard = ConcurrencyGuard::new();
        drop(guard.try_acquire("a").unwrap());
        let permit = guard.try_acquire("a");
        assert!(permit.is_some());
    }

    #[test]
    fn test_clone_shares_state() {
        let guard = ConcurrencyGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire("a").unwrap();
        assert!(other.is_running("a"));
    }

    #[test]
    fn test_released_on_panic() {
        let guard = ConcurrencyGuard::new();
        let inner = guard.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _permit = inner.try_acquire("a").unwrap();
            panic!("task blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_running("a"));
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let guard = ConcurrencyGuard::new();
        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let guard = guard.clone();
                    scope.spawn(move || guard.try_acquire("contended").map(std::mem::forget))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| r.is_some())
                .count()
        });
        assert_eq!(winners, 1);
    }
}
