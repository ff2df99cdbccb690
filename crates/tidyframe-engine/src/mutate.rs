use crate::concurrency::ConcurrencyOptions;
use crate::error::{FrameError, FrameResult, TaskError};
use crate::pipeline::{evaluate, RowFn};
use crate::row::{row_contexts, RowContext};
use crate::stage::StageOutput;
use std::future::Future;
use std::sync::Arc;
use tidyframe_columnar::{BitVec, Column, GroupPartition, Table, Value};

/// Named column computations evaluated against the same pre-stage snapshot.
#[derive(Clone, Debug, Default)]
pub struct Mutate {
    columns: Vec<(String, RowFn)>,
    options: ConcurrencyOptions,
}

impl Mutate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) column `name`.
    pub fn column(mut self, name: impl Into<String>, f: RowFn) -> Self {
        self.columns.push((name.into(), f));
        self
    }

    pub fn sync(
        self,
        name: impl Into<String>,
        f: impl Fn(&RowContext) -> Result<Value, TaskError> + Send + Sync + 'static,
    ) -> Self {
        self.column(name, RowFn::sync(f))
    }

    pub fn with_async<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(RowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        self.column(name, RowFn::new_async(f))
    }

    pub fn with_options(mut self, options: ConcurrencyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

/// Row predicates; a row is kept when every predicate returns `true`.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    predicates: Vec<RowFn>,
    options: ConcurrencyOptions,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicate(mut self, f: RowFn) -> Self {
        self.predicates.push(f);
        self
    }

    pub fn sync(
        self,
        f: impl Fn(&RowContext) -> Result<Value, TaskError> + Send + Sync + 'static,
    ) -> Self {
        self.predicate(RowFn::sync(f))
    }

    pub fn with_async<F, Fut>(self, f: F) -> Self
    where
        F: Fn(RowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        self.predicate(RowFn::new_async(f))
    }

    pub fn with_options(mut self, options: ConcurrencyOptions) -> Self {
        self.options = options;
        self
    }
}

pub(crate) fn mutate_stage(
    table: &Table,
    partition: Option<&Arc<GroupPartition>>,
    mutate: &Mutate,
) -> FrameResult<StageOutput<Table>> {
    let snapshot = Arc::new(table.clone());
    let contexts = row_contexts(&snapshot, partition);
    let names: Vec<String> = mutate.columns.iter().map(|(n, _)| n.clone()).collect();

    evaluate("mutate", contexts, mutate.columns.clone(), &mutate.options)?.and_then(
        move |columns| {
            let mut out = (*snapshot).clone();
            for (name, values) in names.into_iter().zip(columns) {
                out = out.with_column(Column::infer(name, values))?;
            }
            log::debug!(
                "mutate produced {} column(s) over {} row(s)",
                out.column_count(),
                out.row_count()
            );
            Ok(out)
        },
    )
}

pub(crate) fn filter_stage(
    table: &Table,
    partition: Option<&Arc<GroupPartition>>,
    filter: &Filter,
) -> FrameResult<StageOutput<Table>> {
    let snapshot = Arc::new(table.clone());
    let contexts = row_contexts(&snapshot, partition);
    let fns = filter
        .predicates
        .iter()
        .enumerate()
        .map(|(i, f)| (format!("predicate {i}"), f.clone()))
        .collect();

    evaluate("filter", contexts, fns, &filter.options)?.and_then(move |results| {
        let rows = snapshot.row_count();
        let mut keep = BitVec::with_len_all_true(rows);
        for (i, values) in results.iter().enumerate() {
            let mask = values
                .iter()
                .enumerate()
                .map(|(row, value)| match value {
                    Value::Boolean(b) => Ok(*b),
                    Value::Null => Ok(false),
                    other => Err(FrameError::Type(format!(
                        "filter predicate {i} returned {other} at row {row}; expected a boolean"
                    ))),
                })
                .collect::<FrameResult<BitVec>>()?;
            keep.and_inplace(&mask);
        }
        if keep.all_true() {
            log::debug!("filter kept all {rows} row(s)");
            return Ok((*snapshot).clone());
        }
        let kept: Vec<usize> = keep.iter_ones().collect();
        log::debug!("filter kept {} of {} row(s)", kept.len(), rows);
        Ok(snapshot.take(&kept))
    })
}
