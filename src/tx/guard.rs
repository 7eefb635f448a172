//! Per-category submission lock.
//!
//! At most one submission per guarded category is in flight. A second caller
//! is answered immediately with the locked outcome instead of queueing.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::TxLockConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::race;
use crate::tx::types::{TxError, TxOutcome, TxResult};

/// Releases the category lock when dropped.
struct LockGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct TxLocker {
    locks: DashMap<String, Arc<AtomicBool>>,
    categories: HashSet<String>,
    timeout: Duration,
}

impl TxLocker {
    pub fn new(categories: impl IntoIterator<Item = String>, timeout: Duration) -> Self {
        let categories: HashSet<String> = categories.into_iter().collect();
        let locks = categories
            .iter()
            .map(|category| (category.clone(), Arc::new(AtomicBool::new(false))))
            .collect();
        Self {
            locks,
            categories,
            timeout,
        }
    }

    pub fn from_config(config: &TxLockConfig) -> Self {
        Self::new(
            config.categories.iter().cloned(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_guarded(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    pub fn is_locked(&self, category: &str) -> bool {
        self.locks
            .get(category)
            .map(|held| held.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Categories currently held, sorted.
    pub fn held_locks(&self) -> Vec<String> {
        let mut held: Vec<String> = self
            .locks
            .iter()
            .filter(|entry| entry.value().load(Ordering::Acquire))
            .map(|entry| entry.key().clone())
            .collect();
        held.sort();
        held
    }

    fn try_acquire(&self, category: &str) -> Option<LockGuard> {
        let held = self.locks.get(category)?.value().clone();
        held.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LockGuard { held })
    }

    /// Run `operation` under the lock for `category`.
    ///
    /// Unguarded categories run directly. For guarded ones the operation is
    /// spawned and raced against the lock timeout; when the timeout fires the
    /// lock is released and the operation keeps running.
    pub async fn guarded<F, Fut>(&self, category: &str, operation: F) -> TxResult<TxOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TxResult<TxOutcome>> + Send + 'static,
    {
        if !self.is_guarded(category) {
            return operation().await;
        }

        let Some(_guard) = self.try_acquire(category) else {
            tracing::warn!(category = %category, "Transaction lock contention");
            metrics::record_lock_contention(category);
            return Ok(TxOutcome::locked());
        };
        tracing::debug!(category = %category, "Transaction lock acquired");

        let task = tokio::spawn(operation());
        match race(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(TxError::Aborted(join_error.to_string())),
            Err(_) => {
                tracing::warn!(
                    category = %category,
                    timeout_secs = self.timeout.as_secs(),
                    "Transaction lock timed out, releasing"
                );
                Err(TxError::Timeout(self.timeout))
            }
        }
    }
}
