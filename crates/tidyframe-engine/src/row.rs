use crate::error::TaskError;
use std::sync::Arc;
use tidyframe_columnar::{GroupPartition, SchemaError, Table, Value};

/// Read-only view of one group of a table snapshot.
///
/// Cloning is cheap; the table and partition are shared. An ungrouped table is a single group
/// holding every row.
#[derive(Clone, Debug)]
pub struct GroupView {
    table: Arc<Table>,
    partition: Option<Arc<GroupPartition>>,
    group: usize,
}

impl GroupView {
    pub(crate) fn new(
        table: Arc<Table>,
        partition: Option<Arc<GroupPartition>>,
        group: usize,
    ) -> Self {
        Self {
            table,
            partition,
            group,
        }
    }

    pub fn group_index(&self) -> usize {
        self.group
    }

    pub fn len(&self) -> usize {
        match &self.partition {
            Some(p) => p.rows(self.group).len(),
            None => self.table.row_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Table row index of the `i`-th member, or `None` past the end of the group.
    pub fn row_index(&self, i: usize) -> Option<usize> {
        match &self.partition {
            Some(p) => p.rows(self.group).get(i).copied(),
            None => (i < self.table.row_count()).then_some(i),
        }
    }

    /// Table row indices of every member, ascending.
    pub fn rows(&self) -> Vec<usize> {
        match &self.partition {
            Some(p) => p.rows(self.group).to_vec(),
            None => (0..self.table.row_count()).collect(),
        }
    }

    /// Values of `name` for the members, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<Value>, SchemaError> {
        let column = self.table.column(name)?;
        Ok(match &self.partition {
            Some(p) => p.rows(self.group).iter().map(|&r| column.get(r)).collect(),
            None => column.values(),
        })
    }

    /// Numeric values of `name` with NA kept as `None`.
    pub fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>, TaskError> {
        self.column(name)?
            .into_iter()
            .map(|value| match value {
                Value::Null => Ok(None),
                Value::Number(v) => Ok(Some(v)),
                other => Err(TaskError::new(format!(
                    "column {name} holds non-numeric value {other}"
                ))),
            })
            .collect()
    }

    /// Value of `name` at the `i`-th member.
    pub fn value(&self, i: usize, name: &str) -> Result<Value, SchemaError> {
        let column = self.table.column(name)?;
        let row = self.row_index(i).ok_or(SchemaError::RowOutOfBounds {
            row: i,
            rows: self.len(),
        })?;
        Ok(column.get(row))
    }

    /// Grouping key values; empty for an ungrouped table.
    pub fn key_values(&self) -> &[Value] {
        match &self.partition {
            Some(p) => p.key_values(self.group),
            None => &[],
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

/// What a row function sees: the pre-stage snapshot and the position of its row.
#[derive(Clone, Debug)]
pub struct RowContext {
    group: GroupView,
    row: usize,
    index_in_group: usize,
}

impl RowContext {
    pub fn get(&self, name: &str) -> Result<Value, SchemaError> {
        self.group.table.value(self.row, name)
    }

    pub fn row_index(&self) -> usize {
        self.row
    }

    pub fn index_in_group(&self) -> usize {
        self.index_in_group
    }

    pub fn group_index(&self) -> usize {
        self.group.group
    }

    pub fn group(&self) -> &GroupView {
        &self.group
    }

    pub fn table(&self) -> &Table {
        &self.group.table
    }
}

/// One context per row of `table`, in row order.
pub(crate) fn row_contexts(
    table: &Arc<Table>,
    partition: Option<&Arc<GroupPartition>>,
) -> Vec<RowContext> {
    match partition {
        None => {
            let view = GroupView::new(Arc::clone(table), None, 0);
            (0..table.row_count())
                .map(|row| RowContext {
                    group: view.clone(),
                    row,
                    index_in_group: row,
                })
                .collect()
        }
        Some(partition) => {
            let views: Vec<GroupView> = (0..partition.group_count())
                .map(|g| GroupView::new(Arc::clone(table), Some(Arc::clone(partition)), g))
                .collect();
            let positions = partition.index_in_group();
            (0..table.row_count())
                .map(|row| RowContext {
                    group: views[partition.group_of_row(row)].clone(),
                    row,
                    index_in_group: positions[row],
                })
                .collect()
        }
    }
}
