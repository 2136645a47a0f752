//! Batch executors: run a worker over many items, retrying only the failures.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::{Error, ErrorKind, Result};

/// Outcome of a batch run.
///
/// Every input item is counted exactly once: either in `successes` or in
/// `failures`, with the error from its last attempt.
#[derive(Debug)]
pub struct BatchResult<T, E> {
    /// Number of items that eventually succeeded.
    pub successes: usize,
    /// Items that still failed after the last pass, in input order.
    pub failures: Vec<(T, E)>,
}

impl<T, E> BatchResult<T, E> {
    /// Returns true if nothing failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Items that failed, in input order.
    pub fn failed_items(&self) -> impl Iterator<Item = &T> {
        self.failures.iter().map(|(item, _)| item)
    }

    /// Failures keyed by item.
    pub fn failure_map(self) -> HashMap<T, E>
    where
        T: Hash + Eq,
    {
        self.failures.into_iter().collect()
    }
}

/// Run `worker` over `items`, `concurrency` at a time.
///
/// Items are processed in rounds of `concurrency`; a round starts once every
/// call of the previous round has settled. `worker` receives the item and its
/// position in the current pass. After a pass, if anything failed and
/// `retries` remain, the failed items alone go through another pass.
pub async fn batch_operation<T, F, Fut, R, E>(
    items: Vec<T>,
    worker: F,
    concurrency: usize,
    retries: u32,
) -> Result<BatchResult<T, E>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
{
    if concurrency == 0 {
        return Err(Error::new(ErrorKind::Usage(
            "concurrency must be at least 1".to_string(),
        )));
    }

    let total = items.len();
    let mut pending = items;
    let mut retries_left = retries;

    loop {
        let mut failures = Vec::new();
        let mut settled = 0;

        for (round, chunk) in pending.chunks(concurrency).enumerate() {
            let offset = round * concurrency;
            let outcomes = join_all(
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, item)| worker(item.clone(), offset + i)),
            )
            .await;

            for (item, outcome) in chunk.iter().zip(outcomes) {
                if let Err(err) = outcome {
                    failures.push((item.clone(), err));
                }
            }
            settled += chunk.len();
            debug!(round, settled, failed = failures.len(), "Batch round settled");
        }

        if failures.is_empty() || retries_left == 0 {
            info!(total, failed = failures.len(), "Batch finished");
            return Ok(BatchResult {
                successes: total - failures.len(),
                failures,
            });
        }

        retries_left -= 1;
        info!(
            failed = failures.len(),
            retries_left, "Retrying failed batch items"
        );
        pending = failures.into_iter().map(|(item, _)| item).collect();
    }
}

/// Run `worker` over `items` one at a time, pausing `delay` between items.
///
/// Same retry semantics as [`batch_operation`]: each retry pass covers only
/// the items that failed in the pass before.
pub async fn series_batch_operation<T, F, Fut, R, E>(
    items: Vec<T>,
    worker: F,
    delay: Duration,
    retries: u32,
) -> BatchResult<T, E>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
{
    let total = items.len();
    let mut pending = items;

    for pass in 0..=retries {
        let mut failures = Vec::new();
        let last = pending.len().saturating_sub(1);

        for (index, item) in pending.iter().enumerate() {
            if let Err(err) = worker(item.clone(), index).await {
                failures.push((item.clone(), err));
            }
            if index < last && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        debug!(pass, failed = failures.len(), "Series pass finished");
        if failures.is_empty() || pass == retries {
            info!(total, failed = failures.len(), "Series batch finished");
            return BatchResult {
                successes: total - failures.len(),
                failures,
            };
        }
        pending = failures.into_iter().map(|(item, _)| item).collect();
    }

    BatchResult {
        successes: total,
        failures: Vec::new(),
    }
}
