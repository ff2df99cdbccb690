use crate::error::{FrameError, FrameResult};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tidyframe_columnar::{
    Column, ColumnBuilder, ColumnType, GroupPartition, Table, Value, NO_ROW,
};

pub type CombineFn = Arc<dyn Fn(&[Value]) -> FrameResult<Value> + Send + Sync>;

/// What to do when several input rows land in the same (group, name) cell.
#[derive(Clone, Default)]
pub enum DuplicatePolicy {
    /// Keep the first row in input order.
    #[default]
    First,
    /// Keep the last row in input order.
    Last,
    /// Fail with a pivot specification error.
    Error,
    /// Reduce all colliding values (in input order) to one.
    Combine(CombineFn),
}

impl DuplicatePolicy {
    pub fn combine(f: impl Fn(&[Value]) -> FrameResult<Value> + Send + Sync + 'static) -> Self {
        DuplicatePolicy::Combine(Arc::new(f))
    }
}

impl fmt::Debug for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::First => f.write_str("First"),
            DuplicatePolicy::Last => f.write_str("Last"),
            DuplicatePolicy::Error => f.write_str("Error"),
            DuplicatePolicy::Combine(_) => f.write_str("Combine(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PivotWiderSpec {
    pub names_from: String,
    pub values_from: String,
    /// Values of `names_from` to emit, in this order. Unlisted observed values are an error;
    /// listed values never observed give all-NA columns.
    pub expected_columns: Option<Vec<String>>,
    /// Prepended to every output column name.
    pub names_prefix: String,
    pub duplicates: DuplicatePolicy,
}

impl PivotWiderSpec {
    pub fn new(names_from: impl Into<String>, values_from: impl Into<String>) -> Self {
        Self {
            names_from: names_from.into(),
            values_from: values_from.into(),
            expected_columns: None,
            names_prefix: String::new(),
            duplicates: DuplicatePolicy::default(),
        }
    }

    pub fn with_expected_columns<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.expected_columns = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    pub fn with_names_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.names_prefix = prefix.into();
        self
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotLongerSpec {
    /// Columns folded into rows, in output order.
    pub cols: Vec<String>,
    pub names_to: String,
    pub values_to: String,
    /// Stripped from folded column names when present.
    pub names_prefix: Option<String>,
}

impl PivotLongerSpec {
    pub fn new<S: AsRef<str>>(
        cols: &[S],
        names_to: impl Into<String>,
        values_to: impl Into<String>,
    ) -> Self {
        Self {
            cols: cols.iter().map(|c| c.as_ref().to_string()).collect(),
            names_to: names_to.into(),
            values_to: values_to.into(),
            names_prefix: None,
        }
    }

    pub fn with_names_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.names_prefix = Some(prefix.into());
        self
    }
}

/// Long to wide: one row per combination of the remaining (id) columns, one column per distinct
/// `names_from` value.
pub fn pivot_wider(table: &Table, spec: &PivotWiderSpec) -> FrameResult<Table> {
    if spec.names_from == spec.values_from {
        return Err(FrameError::PivotSpec(format!(
            "names_from and values_from are both {}",
            spec.names_from
        )));
    }
    let names = table.column(&spec.names_from)?;
    let values = table.column(&spec.values_from)?;
    let id_cols: Vec<&str> = table
        .column_names()
        .into_iter()
        .filter(|n| *n != spec.names_from && *n != spec.values_from)
        .collect();
    let partition = GroupPartition::new(table, &id_cols)?;
    let groups = partition.group_count();

    // Output names in their final order, and a lookup from name value to output slot.
    let mut order: Vec<String> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    if let Some(expected) = &spec.expected_columns {
        for name in expected {
            if slot_of.insert(name.clone(), order.len()).is_some() {
                return Err(FrameError::PivotSpec(format!(
                    "expected column {name} is listed twice"
                )));
            }
            order.push(name.clone());
        }
    }
    let mut row_slot = Vec::with_capacity(table.row_count());
    for value in names.iter() {
        let name = value.to_string();
        let slot = match slot_of.get(&name) {
            Some(&slot) => slot,
            None if spec.expected_columns.is_some() => {
                return Err(FrameError::PivotSpec(format!(
                    "{} holds {name}, which is not among the expected columns",
                    spec.names_from
                )));
            }
            None => {
                let slot = order.len();
                slot_of.insert(name.clone(), slot);
                order.push(name);
                slot
            }
        };
        row_slot.push(slot);
    }
    let width = order.len();

    let mut cells = vec![NO_ROW; groups * width];
    let mut collisions: HashMap<usize, SmallVec<[usize; 4]>> = HashMap::new();
    for (row, &slot) in row_slot.iter().enumerate() {
        let cell = partition.group_of_row(row) * width + slot;
        if cells[cell] == NO_ROW {
            cells[cell] = row;
            continue;
        }
        match &spec.duplicates {
            DuplicatePolicy::First => {}
            DuplicatePolicy::Last => cells[cell] = row,
            DuplicatePolicy::Error => {
                let keys: Vec<String> = partition
                    .key_values(partition.group_of_row(row))
                    .iter()
                    .map(Value::to_string)
                    .collect();
                return Err(FrameError::PivotSpec(format!(
                    "several rows map to column {} for id ({})",
                    order[slot],
                    keys.join(", ")
                )));
            }
            DuplicatePolicy::Combine(_) => collisions
                .entry(cell)
                .or_insert_with(|| SmallVec::from_elem(cells[cell], 1))
                .push(row),
        }
    }

    let mut columns = partition.key_table(table)?.columns().to_vec();
    for (slot, name) in order.iter().enumerate() {
        let out_name = format!("{}{}", spec.names_prefix, name);
        let rows: Vec<usize> = (0..groups).map(|g| cells[g * width + slot]).collect();
        let column = match &spec.duplicates {
            DuplicatePolicy::Combine(combine) => {
                let mut out = Vec::with_capacity(groups);
                for (g, &row) in rows.iter().enumerate() {
                    // Every filled cell is reduced, including single-row cells.
                    let value = match collisions.get(&(g * width + slot)) {
                        _ if row == NO_ROW => Value::Null,
                        Some(members) => {
                            let vals: Vec<Value> = members.iter().map(|&r| values.get(r)).collect();
                            combine(&vals)?
                        }
                        None => combine(std::slice::from_ref(&values.get(row)))?,
                    };
                    out.push(value);
                }
                Column::infer(out_name, out)
            }
            _ => values.take(&rows).renamed(out_name),
        };
        columns.push(column);
    }

    log::debug!(
        "pivot_wider: {} row(s) -> {} group(s) x {} value column(s), {} collision cell(s)",
        table.row_count(),
        groups,
        width,
        collisions.len()
    );
    let out = Table::new(columns)?;
    Ok(if out.column_count() == 0 {
        Table::with_row_count(groups)
    } else {
        out
    })
}

/// Wide to long: every input row becomes one row per folded column.
pub fn pivot_longer(table: &Table, spec: &PivotLongerSpec) -> FrameResult<Table> {
    if spec.cols.is_empty() {
        return Err(FrameError::PivotSpec("no columns to fold".into()));
    }
    let mut seen = HashSet::new();
    for col in &spec.cols {
        if !table.has_column(col) {
            return Err(FrameError::PivotSpec(format!("unknown column to fold: {col}")));
        }
        if !seen.insert(col.as_str()) {
            return Err(FrameError::PivotSpec(format!("column {col} is folded twice")));
        }
    }
    if spec.names_to == spec.values_to {
        return Err(FrameError::PivotSpec(format!(
            "names_to and values_to are both {}",
            spec.names_to
        )));
    }
    let keep: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| !seen.contains(c.name()))
        .collect();
    for target in [&spec.names_to, &spec.values_to] {
        if keep.iter().any(|c| c.name() == target.as_str()) {
            return Err(FrameError::PivotSpec(format!(
                "output column {target} collides with a kept column"
            )));
        }
    }

    let folded = table.columns_by_name(&spec.cols)?;
    let width = folded.len();
    let rows = table.row_count();
    let total = rows * width;

    let gather: Vec<usize> = (0..rows).flat_map(|r| std::iter::repeat(r).take(width)).collect();
    let labels: Vec<&str> = spec
        .cols
        .iter()
        .map(|c| {
            spec.names_prefix
                .as_deref()
                .and_then(|p| c.strip_prefix(p))
                .unwrap_or(c)
        })
        .collect();
    let value_type = folded
        .iter()
        .map(|c| c.column_type())
        .reduce(ColumnType::widen)
        .unwrap_or(ColumnType::Opaque);
    let mut value_builder = ColumnBuilder::with_capacity(value_type, total);
    for r in 0..rows {
        for column in &folded {
            value_builder.push(&column.get(r));
        }
    }

    let mut columns: Vec<Column> = keep.iter().map(|c| c.take(&gather)).collect();
    columns.push(Column::strings(
        spec.names_to.clone(),
        (0..rows).flat_map(|_| labels.iter().copied()),
    ));
    columns.push(value_builder.finish(spec.values_to.clone()));

    log::debug!(
        "pivot_longer: {rows} row(s) x {width} folded column(s) -> {total} row(s)"
    );
    Ok(Table::new(columns)?)
}
