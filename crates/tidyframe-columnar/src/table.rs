#![forbid(unsafe_code)]

use crate::column::{Column, ColumnBuilder, ColumnSchema};
use crate::error::SchemaError;
use crate::types::{infer_column_type, ColumnType, Value};
use std::collections::HashMap;

/// An immutable, ordered collection of equally long named columns.
///
/// Every operator returns a new table. Columns are reference counted, so structural operators
/// (`select`, `rename`, `with_column`, ...) never copy the storage of untouched columns.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Table {
    /// Build a table from columns. Names must be unique and lengths equal.
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        let rows = columns.first().map_or(0, Column::len);
        let mut index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != rows {
                return Err(SchemaError::LengthMismatch {
                    column: column.name().to_string(),
                    expected: rows,
                    actual: column.len(),
                });
            }
            if index.insert(column.name().to_string(), idx).is_some() {
                return Err(SchemaError::DuplicateColumn(column.name().to_string()));
            }
        }
        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    /// A table with `rows` rows and no columns.
    pub fn with_row_count(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            index: HashMap::new(),
            rows,
        }
    }

    /// Build a table from row-major values, inferring each column's type.
    pub fn from_rows<S: AsRef<str>>(
        names: &[S],
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, SchemaError> {
        let width = names.len();
        let row_count = rows.len();
        let mut cols: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            if row.len() != width {
                return Err(SchemaError::RowWidthMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (col, value) in cols.iter_mut().zip(row) {
                col.push(value);
            }
        }
        let columns = names
            .iter()
            .zip(cols)
            .map(|(name, values)| Column::infer(name.as_ref(), values))
            .collect();
        if width == 0 {
            return Ok(Self::with_row_count(row_count));
        }
        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .map(|c| ColumnSchema::new(c.name(), c.column_type()))
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, SchemaError> {
        self.column_index(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))
    }

    /// Resolve several names at once, failing on the first unknown one.
    pub fn columns_by_name<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Column>, SchemaError> {
        names.iter().map(|n| self.column(n.as_ref())).collect()
    }

    pub fn value(&self, row: usize, name: &str) -> Result<Value, SchemaError> {
        let column = self.column(name)?;
        if row >= self.rows {
            return Err(SchemaError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }
        Ok(column.get(row))
    }

    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.get(row)).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.rows).map(|r| self.row(r)).collect()
    }

    /// Keep only `names`, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, SchemaError> {
        let columns = self
            .columns_by_name(names)?
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let mut out = Table::new(columns)?;
        out.rows = self.rows;
        Ok(out)
    }

    /// Remove `names`; every name must exist.
    pub fn drop<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, SchemaError> {
        self.columns_by_name(names)?;
        let columns = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n.as_ref() == c.name()))
            .cloned()
            .collect();
        let mut out = Table::new(columns)?;
        out.rows = self.rows;
        Ok(out)
    }

    /// Rename columns via `(from, to)` pairs.
    pub fn rename<S: AsRef<str>, T: AsRef<str>>(
        &self,
        mapping: &[(S, T)],
    ) -> Result<Table, SchemaError> {
        for (from, _) in mapping {
            self.column(from.as_ref())?;
        }
        let columns = self
            .columns
            .iter()
            .map(|c| {
                match mapping.iter().find(|(from, _)| from.as_ref() == c.name()) {
                    Some((_, to)) => c.renamed(to.as_ref()),
                    None => c.clone(),
                }
            })
            .collect();
        let mut out = Table::new(columns)?;
        out.rows = self.rows;
        Ok(out)
    }

    /// Replace the column with the same name, or append it at the end.
    pub fn with_column(&self, column: Column) -> Result<Table, SchemaError> {
        if column.len() != self.rows {
            return Err(SchemaError::LengthMismatch {
                column: column.name().to_string(),
                expected: self.rows,
                actual: column.len(),
            });
        }
        let mut columns = self.columns.clone();
        match self.column_index(column.name()) {
            Some(idx) => columns[idx] = column,
            None => columns.push(column),
        }
        let mut out = Table::new(columns)?;
        out.rows = self.rows;
        Ok(out)
    }

    /// Bind rows of `others` below this table.
    ///
    /// Columns are matched by name; the output schema is the union of all columns in first-seen
    /// order. Columns missing from a part are filled with NA; conflicting types widen to
    /// `Opaque`.
    pub fn append(&self, others: &[&Table]) -> Result<Table, SchemaError> {
        let parts: Vec<&Table> = std::iter::once(self).chain(others.iter().copied()).collect();
        let mut names: Vec<&str> = Vec::new();
        let mut types: HashMap<&str, ColumnType> = HashMap::new();
        for part in &parts {
            for column in &part.columns {
                match types.get_mut(column.name()) {
                    Some(ty) => *ty = ty.widen(column.column_type()),
                    None => {
                        names.push(column.name());
                        types.insert(column.name(), column.column_type());
                    }
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let ty = types[name];
            let pieces: Vec<Column> = parts
                .iter()
                .map(|part| match part.column(name) {
                    Ok(c) => c.clone(),
                    Err(_) => Column::nulls(*name, ty, part.rows),
                })
                .collect();
            columns.push(Column::concat(*name, &pieces));
        }
        let mut out = Table::new(columns)?;
        out.rows = parts.iter().map(|p| p.rows).sum();
        Ok(out)
    }

    /// Rows `start..end`, clamped to bounds.
    pub fn slice(&self, start: usize, end: usize) -> Table {
        let end = end.min(self.rows);
        let start = start.min(end);
        self.map_columns(end - start, |c| c.slice(start, end))
    }

    pub fn head(&self, n: usize) -> Table {
        self.slice(0, n)
    }

    pub fn tail(&self, n: usize) -> Table {
        self.slice(self.rows.saturating_sub(n), self.rows)
    }

    /// Gather rows by index; [`crate::NO_ROW`] yields an all-NA row.
    pub fn take(&self, rows: &[usize]) -> Table {
        self.map_columns(rows.len(), |c| c.take(rows))
    }

    fn map_columns(&self, rows: usize, f: impl Fn(&Column) -> Column) -> Table {
        Table {
            columns: self.columns.iter().map(f).collect(),
            index: self.index.clone(),
            rows,
        }
    }
}

/// Row-wise table construction against a fixed schema.
#[derive(Debug)]
pub struct TableBuilder {
    schema: Vec<ColumnSchema>,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: Vec<ColumnSchema>) -> Self {
        let builders = schema
            .iter()
            .map(|s| ColumnBuilder::new(s.column_type))
            .collect();
        Self {
            schema,
            builders,
            rows: 0,
        }
    }

    pub fn append_row(&mut self, row: &[Value]) -> Result<(), SchemaError> {
        if row.len() != self.schema.len() {
            return Err(SchemaError::RowWidthMismatch {
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        // Validate first so a rejected row leaves every builder untouched.
        for (schema, value) in self.schema.iter().zip(row) {
            if !schema.column_type.accepts(value) {
                return Err(SchemaError::TypeMismatch {
                    column: schema.name.clone(),
                    column_type: schema.column_type,
                    value: value.to_string(),
                });
            }
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.push(value);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finalize(self) -> Result<Table, SchemaError> {
        let rows = self.rows;
        let columns = self
            .schema
            .into_iter()
            .zip(self.builders)
            .map(|(schema, builder)| builder.finish(schema.name))
            .collect();
        let mut table = Table::new(columns)?;
        table.rows = rows;
        Ok(table)
    }
}

/// Infer a column type for every column of row-major data.
pub fn infer_schema<S: AsRef<str>>(names: &[S], rows: &[Vec<Value>]) -> Vec<ColumnSchema> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let column_type = infer_column_type(rows.iter().filter_map(|r| r.get(i)));
            ColumnSchema::new(name.as_ref(), column_type)
        })
        .collect()
}
