//! Cooperative scheduling of retryable work units.
//!
//! Every in-flight unit is polled by the caller's task through a `FuturesUnordered`; nothing is
//! spawned. Results land in the slot of the unit that produced them, so output order never
//! depends on completion order.

use crate::error::{TaskError, TaskFailure};
use crate::retry::{run_with_retry, Exhausted, RetryPolicy};
use futures_util::future::{self, BoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Builds a fresh attempt of one work unit. Called again for every retry.
pub type TaskFactory<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, TaskError>> + Send + Sync>;

/// Scheduling limits for one pipeline stage.
#[derive(Clone, Debug, Default)]
pub struct ConcurrencyOptions {
    /// Maximum units in flight at once; `None` starts every unit of a batch immediately.
    pub concurrency: Option<usize>,
    /// Split units into sequential batches of this size.
    pub batch_size: Option<usize>,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    pub retry: Option<RetryPolicy>,
}

impl ConcurrencyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Wrap a closure returning any `Send` future as a [`TaskFactory`].
pub fn task<T, F, Fut>(f: F) -> TaskFactory<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    Box::new(move || Box::pin(f()))
}

/// Run every unit under `options`, returning results in unit order.
///
/// The first unit that still fails after its retries aborts the run; units still in flight are
/// dropped.
pub async fn process_concurrently<T: Send + 'static>(
    factories: Vec<TaskFactory<T>>,
    options: &ConcurrencyOptions,
) -> Result<Vec<T>, TaskFailure> {
    run_units(&factories, options).await.map_err(|e| TaskFailure {
        stage: "process",
        column: None,
        index: e.index,
        attempts: e.attempts,
        error: e.error,
    })
}

/// Apply `f` to every item under `options`, returning results in item order.
pub async fn batch<I, T, F, Fut>(
    items: Vec<I>,
    f: F,
    options: &ConcurrencyOptions,
) -> Result<Vec<T>, TaskFailure>
where
    I: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(I, usize) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    let factories = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let f = f.clone();
            task(move || f(item.clone(), index))
        })
        .collect();
    process_concurrently(factories, options).await
}

pub(crate) async fn run_units<T>(
    factories: &[TaskFactory<T>],
    options: &ConcurrencyOptions,
) -> Result<Vec<T>, Exhausted> {
    let total = factories.len();
    let batch_size = options.batch_size.filter(|&b| b > 0).unwrap_or(total.max(1));
    let limit = options.concurrency.map_or(usize::MAX, |c| c.max(1));
    let retry = options.retry.as_ref();

    log::debug!(
        "scheduling {total} unit(s): concurrency {:?}, batch size {:?}, batch delay {:?}, retries {:?}",
        options.concurrency,
        options.batch_size,
        options.batch_delay,
        retry.map(|r| r.max_retries)
    );

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    for (batch_no, start) in (0..total).step_by(batch_size).enumerate() {
        if batch_no > 0 && !options.batch_delay.is_zero() {
            tokio::time::sleep(options.batch_delay).await;
        }
        let end = (start + batch_size).min(total);
        let mut queue = start..end;
        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < limit {
                let Some(index) = queue.next() else { break };
                let factory = &factories[index];
                in_flight.push(async move {
                    run_with_retry(index, &**factory, retry)
                        .await
                        .map(|value| (index, value))
                });
            }
            match in_flight.next().await {
                Some(Ok((index, value))) => slots[index] = Some(value),
                Some(Err(exhausted)) => return Err(exhausted),
                None => break,
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Wrap a synchronous result as a work unit.
pub(crate) fn ready<T: Send + 'static>(
    result: Result<T, TaskError>,
) -> BoxFuture<'static, Result<T, TaskError>> {
    Box::pin(future::ready(result))
}
