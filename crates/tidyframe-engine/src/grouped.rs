use crate::arrange::{sort_rows, SortKey};
use crate::concurrency::ConcurrencyOptions;
use crate::error::FrameResult;
use crate::join::{asof_join, AsofSpec};
use crate::mutate::{filter_stage, mutate_stage, Filter, Mutate};
use crate::stage::StageOutput;
use crate::summarise::{count_rows, summarise_stage, Summary};
use std::sync::Arc;
use tidyframe_columnar::{GroupPartition, Table};

/// A table together with a partition of its rows by key columns.
#[derive(Clone, Debug)]
pub struct GroupedTable {
    table: Table,
    partition: Arc<GroupPartition>,
}

impl GroupedTable {
    pub fn new<S: AsRef<str>>(table: Table, keys: &[S]) -> FrameResult<Self> {
        let partition = GroupPartition::new(&table, keys)?;
        Ok(Self {
            table,
            partition: Arc::new(partition),
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn partition(&self) -> &GroupPartition {
        &self.partition
    }

    pub fn keys(&self) -> &[String] {
        self.partition.keys()
    }

    pub fn group_count(&self) -> usize {
        self.partition.group_count()
    }

    pub fn ungroup(self) -> Table {
        self.table
    }

    fn regroup(table: Table, keys: &[String]) -> FrameResult<Self> {
        Self::new(table, keys)
    }

    /// Add or replace columns; functions see their row's group. The partition is reused unless a
    /// key column is overwritten.
    pub fn mutate(&self, mutate: &Mutate) -> FrameResult<StageOutput<GroupedTable>> {
        let keys = self.keys().to_vec();
        let touches_keys = mutate.column_names().any(|name| keys.iter().any(|k| k == name));
        let partition = Arc::clone(&self.partition);
        mutate_stage(&self.table, Some(&self.partition), mutate)?.and_then(move |table| {
            if touches_keys {
                Self::regroup(table, &keys)
            } else {
                Ok(Self { table, partition })
            }
        })
    }

    /// As-of join keeping every left row in place; key columns are left columns, so the
    /// partition carries over.
    pub fn asof_join(&self, right: &Table, spec: &AsofSpec) -> FrameResult<GroupedTable> {
        let table = asof_join(&self.table, right, spec)?;
        Ok(Self {
            table,
            partition: Arc::clone(&self.partition),
        })
    }

    /// Keep rows passing every predicate, then regroup the survivors.
    pub fn filter(&self, filter: &Filter) -> FrameResult<StageOutput<GroupedTable>> {
        let keys = self.keys().to_vec();
        filter_stage(&self.table, Some(&self.partition), filter)?
            .and_then(move |table| Self::regroup(table, &keys))
    }

    pub fn summarise(&self, summaries: &[Summary]) -> FrameResult<StageOutput<Table>> {
        self.summarise_with(summaries, &ConcurrencyOptions::default())
    }

    pub fn summarise_with(
        &self,
        summaries: &[Summary],
        options: &ConcurrencyOptions,
    ) -> FrameResult<StageOutput<Table>> {
        summarise_stage(&self.table, Some(&self.partition), summaries, options)
    }

    /// Key columns plus the group size `n`.
    pub fn count(&self) -> FrameResult<Table> {
        count_rows(&self.table, Some(&self.partition))
    }

    /// Sort rows within each group; groups are laid out one after another in group order.
    pub fn arrange(&self, keys: &[SortKey]) -> FrameResult<GroupedTable> {
        let mut order = Vec::with_capacity(self.table.row_count());
        for (_, rows) in self.partition.iter() {
            order.extend(sort_rows(&self.table, rows, keys)?);
        }
        Self::regroup(self.table.take(&order), self.keys())
    }

    /// Distinct tuples of the key columns followed by `columns`.
    pub fn distinct<S: AsRef<str>>(&self, columns: &[S]) -> FrameResult<Table> {
        let mut names: Vec<&str> = self.keys().iter().map(String::as_str).collect();
        for column in columns {
            if !names.contains(&column.as_ref()) {
                names.push(column.as_ref());
            }
        }
        distinct_rows(&self.table, &names)
    }
}

/// First occurrence of each distinct tuple of `columns` (all columns when empty), projected to
/// those columns.
pub(crate) fn distinct_rows<S: AsRef<str>>(table: &Table, columns: &[S]) -> FrameResult<Table> {
    let selected = if columns.is_empty() {
        table.clone()
    } else {
        table.select(columns)?
    };
    let names = selected.column_names();
    if names.is_empty() {
        return Ok(selected.head(1));
    }
    let partition = GroupPartition::new(&selected, &names)?;
    let out = selected.take(&partition.first_rows());
    log::debug!(
        "distinct kept {} of {} row(s)",
        out.row_count(),
        table.row_count()
    );
    Ok(out)
}
