//! Bounded worker pool
//!
//! Runs one async task per item with a fixed concurrency ceiling:
//! - Workers share a monotonically increasing cursor; each claims one index
//!   per iteration, and no index is claimed twice
//! - Results are placed by claimed index, never by completion order
//! - The call returns only after every item has been processed
//!
//! Workers are polled by `join_all` inside the caller's task, so
//! "concurrency" is interleaving of awaits on one task, not parallelism.
//! The pool does not interpret failures: tasks encode them in `R`.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrency-capped executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPool {
    limit: usize,
}

impl BoundedPool {
    /// Create pool; a zero limit is raised to one
    #[inline]
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Configured ceiling
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Workers started for `len` items
    #[inline]
    #[must_use]
    pub fn workers_for(&self, len: usize) -> usize {
        self.limit.min(len)
    }

    /// Run `task` over `items`; see [`run_bounded`]
    pub async fn run<T, R, F, Fut>(&self, items: &[T], task: F) -> Vec<R>
    where
        F: Fn(&T, usize) -> Fut,
        Fut: Future<Output = R>,
    {
        run_bounded(items, self.limit, task).await
    }
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FAN_OUT_LIMIT)
    }
}

/// Run `task` over every item with at most `limit` in flight
///
/// `output[i]` is always the result for `items[i]`. Spawns
/// `min(limit, items.len())` workers; `limit` of zero behaves as one.
pub async fn run_bounded<T, R, F, Fut>(items: &[T], limit: usize, task: F) -> Vec<R>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    if items.is_empty() {
        return Vec::new();
    }

    let workers = limit.max(1).min(items.len());
    let cursor = AtomicUsize::new(0);
    let cursor = &cursor;
    let task = &task;

    tracing::trace!(items = items.len(), workers, "starting bounded run");

    let batches = join_all((0..workers).map(|worker| async move {
        let mut done = Vec::new();
        loop {
            // No await between read and increment: the claim is atomic with
            // respect to the other workers.
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                break;
            };
            tracing::trace!(worker, index, "claimed");
            done.push((index, task(item, index).await));
        }
        done
    }))
    .await;

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, result) in batches.into_iter().flatten() {
        slots[index] = Some(result);
    }
    let results: Vec<R> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), items.len());
    results
}
