//! Bound on the number of batches in flight.

use std::{future::Future, sync::Arc};

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Counting limiter over batch jobs. Excess jobs wait in FIFO order and start
/// as soon as a running job finishes.
#[derive(Clone, Debug)]
pub struct BatchLimiter {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl BatchLimiter {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run one job once a slot is free.
    pub async fn run<F: Future>(&self, job: F) -> F::Output {
        // The semaphore is never closed, so acquire cannot fail
        let _permit = self.permits.acquire().await.ok();
        job.await
    }

    /// Run every job under the limit, returning results in submission order.
    pub async fn run_all<I>(&self, jobs: I) -> Vec<<I::Item as Future>::Output>
    where
        I: IntoIterator,
        I::Item: Future,
    {
        join_all(jobs.into_iter().map(|job| self.run(job))).await
    }
}
