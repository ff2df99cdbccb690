//! Evaluation of user functions over rows or groups, synchronously or through the scheduler.

use crate::concurrency::{ready, run_units, ConcurrencyOptions, TaskFactory};
use crate::error::{FrameError, FrameResult, TaskError, TaskFailure};
use crate::row::{GroupView, RowContext};
use crate::stage::StageOutput;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tidyframe_columnar::Value;

pub type SyncFn<C> = Arc<dyn Fn(&C) -> Result<Value, TaskError> + Send + Sync>;
pub type AsyncFn<C> = Arc<dyn Fn(C) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync>;

/// A user function over a context `C`, either synchronous or asynchronous.
pub enum TransformFn<C> {
    Sync(SyncFn<C>),
    Async(AsyncFn<C>),
}

/// Per-row function used by mutate and filter.
pub type RowFn = TransformFn<RowContext>;

/// Per-group function used by summarise.
pub type GroupFn = TransformFn<GroupView>;

impl<C> Clone for TransformFn<C> {
    fn clone(&self) -> Self {
        match self {
            TransformFn::Sync(f) => TransformFn::Sync(Arc::clone(f)),
            TransformFn::Async(f) => TransformFn::Async(Arc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for TransformFn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformFn::Sync(_) => f.write_str("Sync(..)"),
            TransformFn::Async(_) => f.write_str("Async(..)"),
        }
    }
}

impl<C: 'static> TransformFn<C> {
    pub fn sync(f: impl Fn(&C) -> Result<Value, TaskError> + Send + Sync + 'static) -> Self {
        TransformFn::Sync(Arc::new(f))
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        TransformFn::Async(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, TransformFn::Async(_))
    }
}

impl<C: Clone + 'static> TransformFn<C> {
    fn start(&self, ctx: &C) -> BoxFuture<'static, Result<Value, TaskError>> {
        match self {
            TransformFn::Sync(f) => ready(f(ctx)),
            TransformFn::Async(f) => f(ctx.clone()),
        }
    }
}

/// Evaluate each labelled function over every context.
///
/// Returns one value vector per function, in context order. The stage runs through the
/// scheduler when any function is asynchronous or a retry policy is configured; otherwise it runs
/// to completion before returning.
pub(crate) fn evaluate<C>(
    stage: &'static str,
    contexts: Vec<C>,
    fns: Vec<(String, TransformFn<C>)>,
    options: &ConcurrencyOptions,
) -> FrameResult<StageOutput<Vec<Vec<Value>>>>
where
    C: Clone + Send + Sync + 'static,
{
    let units = contexts.len();
    let runs_async = options.retry.is_some() || fns.iter().any(|(_, f)| f.is_async());
    log::debug!(
        "{stage}: {} function(s) over {units} unit(s), {}",
        fns.len(),
        if runs_async { "async" } else { "sync" }
    );

    if !runs_async {
        let mut out = Vec::with_capacity(fns.len());
        for (label, f) in &fns {
            let TransformFn::Sync(f) = f else {
                continue;
            };
            let mut values = Vec::with_capacity(units);
            for (index, ctx) in contexts.iter().enumerate() {
                let value = f(ctx).map_err(|error| TaskFailure {
                    stage,
                    column: Some(label.clone()),
                    index,
                    attempts: 1,
                    error,
                })?;
                values.push(value);
            }
            out.push(values);
        }
        return Ok(StageOutput::Ready(out));
    }

    let contexts = Arc::new(contexts);
    let mut factories: Vec<TaskFactory<Value>> = Vec::with_capacity(fns.len() * units);
    for (_, f) in &fns {
        for unit in 0..units {
            let contexts = Arc::clone(&contexts);
            let f = f.clone();
            factories.push(Box::new(move || f.start(&contexts[unit])));
        }
    }
    let labels: Vec<String> = fns.into_iter().map(|(label, _)| label).collect();
    let options = options.clone();

    Ok(StageOutput::Pending(Box::pin(async move {
        let flat = run_units(&factories, &options)
            .await
            .map_err(|e| TaskFailure {
                stage,
                column: labels.get(e.index / units.max(1)).cloned(),
                index: e.index % units.max(1),
                attempts: e.attempts,
                error: e.error,
            })?;
        let mut flat = flat.into_iter();
        Ok::<_, FrameError>(
            labels
                .iter()
                .map(|_| flat.by_ref().take(units).collect::<Vec<Value>>())
                .collect::<Vec<_>>(),
        )
    })))
}
