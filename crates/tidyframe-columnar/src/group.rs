#![forbid(unsafe_code)]

use crate::encoding::encode_keys;
use crate::error::SchemaError;
use crate::table::Table;
use crate::types::Value;

/// A total, disjoint assignment of a table's rows to groups.
///
/// Group ids follow the first appearance of each distinct key tuple. Member rows of a group are
/// kept in their original relative order. NA key values group together.
#[derive(Clone, Debug, Default)]
pub struct GroupPartition {
    keys: Vec<String>,
    row_groups: Vec<u32>,
    // CSR layout: rows of group `g` are `members[offsets[g]..offsets[g + 1]]`.
    offsets: Vec<usize>,
    members: Vec<usize>,
    key_values: Vec<Vec<Value>>,
}

impl GroupPartition {
    pub fn new<S: AsRef<str>>(table: &Table, keys: &[S]) -> Result<Self, SchemaError> {
        let columns = table.columns_by_name(keys)?;
        let rows = table.row_count();
        let encoded = encode_keys(&[columns.clone()], &[rows]);
        let ids = encoded
            .parts
            .into_iter()
            .next()
            .map(|p| p.ids)
            .unwrap_or_default();
        let groups = encoded.distinct;

        let mut offsets = vec![0usize; groups + 1];
        for &g in &ids {
            offsets[g as usize + 1] += 1;
        }
        for g in 0..groups {
            offsets[g + 1] += offsets[g];
        }
        let mut cursor = offsets.clone();
        let mut members = vec![0usize; rows];
        for (row, &g) in ids.iter().enumerate() {
            let slot = &mut cursor[g as usize];
            members[*slot] = row;
            *slot += 1;
        }

        let key_values = (0..groups)
            .map(|g| {
                let first = members[offsets[g]];
                columns.iter().map(|c| c.get(first)).collect()
            })
            .collect();

        log::debug!(
            "partitioned {} row(s) by {:?} into {} group(s)",
            rows,
            keys.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            groups
        );

        Ok(Self {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            row_groups: ids,
            offsets,
            members,
            key_values,
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn group_count(&self) -> usize {
        self.key_values.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_groups.len()
    }

    pub fn group_of_row(&self, row: usize) -> usize {
        self.row_groups[row] as usize
    }

    /// Rows of group `gid`, ascending.
    pub fn rows(&self, gid: usize) -> &[usize] {
        &self.members[self.offsets[gid]..self.offsets[gid + 1]]
    }

    pub fn key_values(&self, gid: usize) -> &[Value] {
        &self.key_values[gid]
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// First row of every group, in group order.
    pub fn first_rows(&self) -> Vec<usize> {
        (0..self.group_count()).map(|g| self.rows(g)[0]).collect()
    }

    /// Position of every row within its own group.
    pub fn index_in_group(&self) -> Vec<usize> {
        let mut out = vec![0usize; self.row_count()];
        for g in 0..self.group_count() {
            for (i, &row) in self.rows(g).iter().enumerate() {
                out[row] = i;
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        (0..self.group_count()).map(move |g| (g, self.rows(g)))
    }

    /// One row per group holding the key columns, with their original column types.
    pub fn key_table(&self, table: &Table) -> Result<Table, SchemaError> {
        Ok(table.select(&self.keys)?.take(&self.first_rows()))
    }
}
