//! Bounded-concurrency batch runner.
//!
//! `run_bounded` interleaves at most `limit` worker futures on the calling
//! task. Runners pull the next item index from a shared counter and tag each
//! outcome with it, so the output lines up with the input no matter which
//! runner finished what.

use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Why a pool item produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolFailure<E> {
    #[error("{0}")]
    Worker(E),
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl<E> PoolFailure<E> {
    /// The worker's own error, if it returned one.
    pub fn worker_error(&self) -> Option<&E> {
        match self {
            PoolFailure::Worker(e) => Some(e),
            PoolFailure::Panicked(_) => None,
        }
    }
}

/// Runs `worker` over every item with at most `limit` in flight.
///
/// Returns exactly one slot per item, in item order. A failing or panicking
/// worker fills its own slot and never stops the rest. `limit == 0` runs one
/// at a time.
pub async fn run_bounded<'a, T, R, E, F, Fut>(
    limit: usize,
    items: &'a [T],
    worker: F,
) -> Vec<Result<R, PoolFailure<E>>>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    if items.is_empty() {
        return Vec::new();
    }
    let runners = limit.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    let next = &next;
    let worker = &worker;

    let batches = join_all((0..runners).map(|_| async move {
        let mut done = Vec::new();
        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                break;
            };
            let outcome = match AssertUnwindSafe(async { worker(item).await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(PoolFailure::Worker(e)),
                Err(panic) => Err(PoolFailure::Panicked(panic_message(panic.as_ref()))),
            };
            done.push((index, outcome));
        }
        done
    }))
    .await;

    let mut slots: Vec<Option<Result<R, PoolFailure<E>>>> = Vec::with_capacity(items.len());
    slots.resize_with(items.len(), || None);
    for (index, outcome) in batches.into_iter().flatten() {
        slots[index] = Some(outcome);
    }
    slots.into_iter().flatten().collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
