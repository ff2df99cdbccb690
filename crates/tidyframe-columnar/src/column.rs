#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::error::SchemaError;
use crate::types::{infer_column_type, ColumnType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Gather index that produces NA instead of reading a row.
pub const NO_ROW: usize = usize::MAX;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Physical storage for a column. Shared between tables through an `Arc`.
#[derive(Debug)]
enum ColumnData {
    Number {
        values: Vec<f64>,
        validity: BitVec,
    },
    Date {
        values: Vec<i64>,
        validity: BitVec,
    },
    Boolean {
        values: BitVec,
        validity: BitVec,
    },
    /// Dictionary encoded; dictionary entries are unique and ordered by first occurrence.
    String {
        indices: Vec<u32>,
        validity: BitVec,
        dictionary: Arc<Vec<Arc<str>>>,
    },
    Opaque(Vec<Value>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Number { values, .. } => values.len(),
            ColumnData::Date { values, .. } => values.len(),
            ColumnData::Boolean { values, .. } => values.len(),
            ColumnData::String { indices, .. } => indices.len(),
            ColumnData::Opaque(values) => values.len(),
        }
    }
}

/// A named, typed, immutable column. Cloning is cheap: storage is reference counted.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    data: Arc<ColumnData>,
}

impl Column {
    /// Build a column of an explicit type, rejecting values of another kind.
    pub fn from_values(
        name: impl Into<String>,
        column_type: ColumnType,
        values: Vec<Value>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let mut builder = ColumnBuilder::with_capacity(column_type, values.len());
        for value in &values {
            if !builder.push(value) {
                return Err(SchemaError::TypeMismatch {
                    column: name,
                    column_type,
                    value: value.to_string(),
                });
            }
        }
        Ok(builder.finish(name))
    }

    /// Build a column whose type is inferred from its non-null values.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let column_type = infer_column_type(&values);
        let mut builder = ColumnBuilder::with_capacity(column_type, values.len());
        for value in &values {
            // An inferred type accepts every value it was inferred from.
            builder.push(value);
        }
        builder.finish(name.into())
    }

    pub fn numbers(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::nullable_numbers(name, values.into_iter().map(Some))
    }

    pub fn nullable_numbers(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<f64>>,
    ) -> Self {
        let mut out = Vec::new();
        let mut validity = BitVec::new();
        for v in values {
            validity.push(v.is_some());
            out.push(v.unwrap_or(0.0));
        }
        Self::from_data(
            name.into(),
            ColumnType::Number,
            ColumnData::Number {
                values: out,
                validity,
            },
        )
    }

    pub fn strings<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::nullable_strings(name, values.into_iter().map(Some))
    }

    pub fn nullable_strings<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        let mut builder = DictBuilder::default();
        for v in values {
            match v {
                Some(s) => builder.push_str(s.as_ref()),
                None => builder.push_null(),
            }
        }
        builder.finish(name.into())
    }

    pub fn booleans(name: impl Into<String>, values: impl IntoIterator<Item = bool>) -> Self {
        let values: BitVec = values.into_iter().collect();
        let validity = BitVec::with_len_all_true(values.len());
        Self::from_data(
            name.into(),
            ColumnType::Boolean,
            ColumnData::Boolean { values, validity },
        )
    }

    /// Dates as milliseconds since the Unix epoch.
    pub fn dates(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        let values: Vec<i64> = values.into_iter().collect();
        let validity = BitVec::with_len_all_true(values.len());
        Self::from_data(
            name.into(),
            ColumnType::Date,
            ColumnData::Date { values, validity },
        )
    }

    /// A column of `len` NA values.
    pub fn nulls(name: impl Into<String>, column_type: ColumnType, len: usize) -> Self {
        let mut builder = ColumnBuilder::with_capacity(column_type, len);
        for _ in 0..len {
            builder.push(&Value::Null);
        }
        builder.finish(name.into())
    }

    fn from_data(name: String, column_type: ColumnType, data: ColumnData) -> Self {
        Self {
            name,
            column_type,
            data: Arc::new(data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same storage under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: self.column_type,
            data: Arc::clone(&self.data),
        }
    }

    /// Whether two columns share the same physical storage.
    pub fn shares_storage(&self, other: &Column) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Value at `row`; out-of-range rows read as NA.
    pub fn get(&self, row: usize) -> Value {
        if row >= self.len() {
            return Value::Null;
        }
        match &*self.data {
            ColumnData::Number { values, validity } => {
                if validity.get(row) {
                    Value::Number(values[row])
                } else {
                    Value::Null
                }
            }
            ColumnData::Date { values, validity } => {
                if validity.get(row) {
                    Value::Date(values[row])
                } else {
                    Value::Null
                }
            }
            ColumnData::Boolean { values, validity } => {
                if validity.get(row) {
                    Value::Boolean(values.get(row))
                } else {
                    Value::Null
                }
            }
            ColumnData::String {
                indices,
                validity,
                dictionary,
            } => {
                if validity.get(row) {
                    Value::String(Arc::clone(&dictionary[indices[row] as usize]))
                } else {
                    Value::Null
                }
            }
            ColumnData::Opaque(values) => values[row].clone(),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match &*self.data {
            ColumnData::Number { validity, .. }
            | ColumnData::Date { validity, .. }
            | ColumnData::Boolean { validity, .. }
            | ColumnData::String { validity, .. } => !validity.get(row),
            ColumnData::Opaque(values) => values[row].is_null(),
        }
    }

    pub fn null_count(&self) -> usize {
        match &*self.data {
            ColumnData::Number { validity, .. }
            | ColumnData::Date { validity, .. }
            | ColumnData::Boolean { validity, .. }
            | ColumnData::String { validity, .. } => validity.len() - validity.count_ones(),
            ColumnData::Opaque(values) => values.iter().filter(|v| v.is_null()).count(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |row| self.get(row))
    }

    pub fn values(&self) -> Vec<Value> {
        self.iter().collect()
    }

    /// Raw numeric storage plus validity, for numeric fast paths.
    pub fn numeric_slice(&self) -> Option<(&[f64], &BitVec)> {
        match &*self.data {
            ColumnData::Number { values, validity } => Some((values, validity)),
            _ => None,
        }
    }

    /// Dictionary indices, validity and dictionary for string columns.
    pub fn dictionary_codes(&self) -> Option<(&[u32], &BitVec, &[Arc<str>])> {
        match &*self.data {
            ColumnData::String {
                indices,
                validity,
                dictionary,
            } => Some((indices, validity, dictionary)),
            _ => None,
        }
    }

    /// Gather rows by index. [`NO_ROW`] (or any out-of-range index) yields NA.
    pub fn take(&self, rows: &[usize]) -> Column {
        let len = self.len();
        let data = match &*self.data {
            ColumnData::Number { values, validity } => {
                let mut out = Vec::with_capacity(rows.len());
                let mut valid = BitVec::with_capacity_bits(rows.len());
                for &r in rows {
                    let ok = r < len && validity.get(r);
                    valid.push(ok);
                    out.push(if ok { values[r] } else { 0.0 });
                }
                ColumnData::Number {
                    values: out,
                    validity: valid,
                }
            }
            ColumnData::Date { values, validity } => {
                let mut out = Vec::with_capacity(rows.len());
                let mut valid = BitVec::with_capacity_bits(rows.len());
                for &r in rows {
                    let ok = r < len && validity.get(r);
                    valid.push(ok);
                    out.push(if ok { values[r] } else { 0 });
                }
                ColumnData::Date {
                    values: out,
                    validity: valid,
                }
            }
            ColumnData::Boolean { values, validity } => {
                let mut out = BitVec::with_capacity_bits(rows.len());
                let mut valid = BitVec::with_capacity_bits(rows.len());
                for &r in rows {
                    let ok = r < len && validity.get(r);
                    valid.push(ok);
                    out.push(ok && values.get(r));
                }
                ColumnData::Boolean {
                    values: out,
                    validity: valid,
                }
            }
            ColumnData::String {
                indices,
                validity,
                dictionary,
            } => {
                let mut out = Vec::with_capacity(rows.len());
                let mut valid = BitVec::with_capacity_bits(rows.len());
                for &r in rows {
                    let ok = r < len && validity.get(r);
                    valid.push(ok);
                    out.push(if ok { indices[r] } else { 0 });
                }
                // The dictionary is shared as is; it may hold entries no longer referenced.
                ColumnData::String {
                    indices: out,
                    validity: valid,
                    dictionary: Arc::clone(dictionary),
                }
            }
            ColumnData::Opaque(values) => ColumnData::Opaque(
                rows.iter()
                    .map(|&r| values.get(r).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
        };
        Self::from_data(self.name.clone(), self.column_type, data)
    }

    /// Rows `start..end`, clamped to the column length.
    pub fn slice(&self, start: usize, end: usize) -> Column {
        let end = end.min(self.len());
        let start = start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.take(&rows)
    }

    /// Concatenate columns end to end under `name`, widening to `Opaque` on type conflicts.
    pub fn concat(name: impl Into<String>, parts: &[Column]) -> Column {
        let column_type = parts
            .iter()
            .map(Column::column_type)
            .reduce(ColumnType::widen)
            .unwrap_or(ColumnType::Opaque);
        let total = parts.iter().map(Column::len).sum();
        let mut builder = ColumnBuilder::with_capacity(column_type, total);
        for part in parts {
            for value in part.iter() {
                builder.push(&value);
            }
        }
        builder.finish(name.into())
    }
}

/// Incremental typed column construction.
#[derive(Debug)]
pub struct ColumnBuilder {
    column_type: ColumnType,
    kind: BuilderKind,
}

#[derive(Debug)]
enum BuilderKind {
    Number(Vec<f64>, BitVec),
    Date(Vec<i64>, BitVec),
    Boolean(BitVec, BitVec),
    String(DictBuilder),
    Opaque(Vec<Value>),
}

impl ColumnBuilder {
    pub fn new(column_type: ColumnType) -> Self {
        Self::with_capacity(column_type, 0)
    }

    pub fn with_capacity(column_type: ColumnType, capacity: usize) -> Self {
        let kind = match column_type {
            ColumnType::Number => BuilderKind::Number(
                Vec::with_capacity(capacity),
                BitVec::with_capacity_bits(capacity),
            ),
            ColumnType::Date => BuilderKind::Date(
                Vec::with_capacity(capacity),
                BitVec::with_capacity_bits(capacity),
            ),
            ColumnType::Boolean => BuilderKind::Boolean(
                BitVec::with_capacity_bits(capacity),
                BitVec::with_capacity_bits(capacity),
            ),
            ColumnType::String => BuilderKind::String(DictBuilder::default()),
            ColumnType::Opaque => BuilderKind::Opaque(Vec::with_capacity(capacity)),
        };
        Self { column_type, kind }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Append a value. Returns `false` (and appends nothing) if the value has the wrong kind.
    pub fn push(&mut self, value: &Value) -> bool {
        match (&mut self.kind, value) {
            (BuilderKind::Number(values, validity), Value::Number(v)) => {
                values.push(*v);
                validity.push(true);
            }
            (BuilderKind::Number(values, validity), Value::Null) => {
                values.push(0.0);
                validity.push(false);
            }
            (BuilderKind::Date(values, validity), Value::Date(v)) => {
                values.push(*v);
                validity.push(true);
            }
            (BuilderKind::Date(values, validity), Value::Null) => {
                values.push(0);
                validity.push(false);
            }
            (BuilderKind::Boolean(values, validity), Value::Boolean(v)) => {
                values.push(*v);
                validity.push(true);
            }
            (BuilderKind::Boolean(values, validity), Value::Null) => {
                values.push(false);
                validity.push(false);
            }
            (BuilderKind::String(dict), Value::String(s)) => dict.push_arc(s),
            (BuilderKind::String(dict), Value::Null) => dict.push_null(),
            (BuilderKind::Opaque(values), v) => values.push(v.clone()),
            _ => return false,
        }
        true
    }

    pub fn finish(self, name: impl Into<String>) -> Column {
        let name = name.into();
        let data = match self.kind {
            BuilderKind::Number(values, validity) => ColumnData::Number { values, validity },
            BuilderKind::Date(values, validity) => ColumnData::Date { values, validity },
            BuilderKind::Boolean(values, validity) => ColumnData::Boolean { values, validity },
            BuilderKind::String(dict) => return dict.finish(name),
            BuilderKind::Opaque(values) => ColumnData::Opaque(values),
        };
        Column::from_data(name, self.column_type, data)
    }
}

#[derive(Debug, Default)]
struct DictBuilder {
    lookup: HashMap<Arc<str>, u32>,
    dictionary: Vec<Arc<str>>,
    indices: Vec<u32>,
    validity: BitVec,
}

impl DictBuilder {
    fn code_for(&mut self, s: &Arc<str>) -> u32 {
        if let Some(&code) = self.lookup.get(s) {
            return code;
        }
        let code = self.dictionary.len() as u32;
        self.dictionary.push(Arc::clone(s));
        self.lookup.insert(Arc::clone(s), code);
        code
    }

    fn push_arc(&mut self, s: &Arc<str>) {
        let code = self.code_for(s);
        self.indices.push(code);
        self.validity.push(true);
    }

    fn push_str(&mut self, s: &str) {
        match self.lookup.get(s) {
            Some(&code) => {
                self.indices.push(code);
                self.validity.push(true);
            }
            None => self.push_arc(&Arc::from(s)),
        }
    }

    fn push_null(&mut self) {
        self.indices.push(0);
        self.validity.push(false);
    }

    fn finish(self, name: String) -> Column {
        Column::from_data(
            name,
            ColumnType::String,
            ColumnData::String {
                indices: self.indices,
                validity: self.validity,
                dictionary: Arc::new(self.dictionary),
            },
        )
    }
}
