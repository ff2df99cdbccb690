use crate::concurrency::ConcurrencyOptions;
use crate::error::{FrameResult, TaskError};
use crate::pipeline::{evaluate, GroupFn};
use crate::row::GroupView;
use crate::stage::StageOutput;
use std::future::Future;
use std::sync::Arc;
use tidyframe_columnar::{Column, GroupPartition, SchemaError, Table, Value};

/// One output column of `summarise`, computed once per group.
#[derive(Clone, Debug)]
pub struct Summary {
    name: String,
    f: GroupFn,
}

impl Summary {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&GroupView) -> Result<Value, TaskError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: GroupFn::sync(f),
        }
    }

    pub fn new_async<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(GroupView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: GroupFn::new_async(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One row per group: key columns first, then one column per summary.
///
/// Without a partition the whole table is a single group, even when it has no rows.
pub(crate) fn summarise_stage(
    table: &Table,
    partition: Option<&Arc<GroupPartition>>,
    summaries: &[Summary],
    options: &ConcurrencyOptions,
) -> FrameResult<StageOutput<Table>> {
    let snapshot = Arc::new(table.clone());
    let (keys, views) = match partition {
        Some(partition) => {
            let keys = partition.key_table(table)?;
            let views = (0..partition.group_count())
                .map(|g| GroupView::new(Arc::clone(&snapshot), Some(Arc::clone(partition)), g))
                .collect::<Vec<_>>();
            (keys, views)
        }
        None => (
            Table::with_row_count(1),
            vec![GroupView::new(Arc::clone(&snapshot), None, 0)],
        ),
    };

    for (i, summary) in summaries.iter().enumerate() {
        let repeated = summaries[..i].iter().any(|s| s.name == summary.name);
        if repeated || keys.has_column(&summary.name) {
            return Err(SchemaError::DuplicateColumn(summary.name.clone()).into());
        }
    }

    let fns = summaries
        .iter()
        .map(|s| (s.name.clone(), s.f.clone()))
        .collect();
    let names: Vec<String> = summaries.iter().map(|s| s.name.clone()).collect();

    evaluate("summarise", views, fns, options)?.and_then(move |columns| {
        let mut out = keys;
        for (name, values) in names.into_iter().zip(columns) {
            out = out.with_column(Column::infer(name, values))?;
        }
        log::debug!("summarise produced {} group row(s)", out.row_count());
        Ok(out)
    })
}

/// Group sizes as column `n`, after the key columns.
pub(crate) fn count_rows(
    table: &Table,
    partition: Option<&GroupPartition>,
) -> FrameResult<Table> {
    let (keys, sizes) = match partition {
        Some(p) => (p.key_table(table)?, p.sizes()),
        None => (Table::with_row_count(1), vec![table.row_count()]),
    };
    if keys.has_column("n") {
        return Err(SchemaError::DuplicateColumn("n".into()).into());
    }
    Ok(keys.with_column(Column::numbers("n", sizes.into_iter().map(|s| s as f64)))?)
}
