use crate::error::{FrameError, FrameResult};
use std::collections::HashSet;
use tidyframe_columnar::{
    encode_keys, BitVec, Column, ColumnBuilder, ColumnType, PartKeys, Table, Value, NO_ROW,
};

/// Index value marking the side of a pair that has no matching row.
pub const UNMATCHED: usize = NO_ROW;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
    Cross,
}

/// Appended to non-key column names present on both sides. An empty suffix keeps the name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            left: String::new(),
            right: "_y".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinOptions {
    pub suffixes: Suffixes,
}

/// Key pairs, join kind and collision policy for one join call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinSpec {
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub kind: JoinKind,
    pub options: JoinOptions,
}

impl JoinSpec {
    /// Join on one column present under the same name on both sides.
    pub fn on(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            left_keys: vec![name.clone()],
            right_keys: vec![name],
            ..Self::default()
        }
    }

    pub fn on_many<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        Self {
            left_keys: names.clone(),
            right_keys: names,
            ..Self::default()
        }
    }

    /// Join `left[i]` against `right[i]`; the lists must be equally long.
    pub fn pairs<S: AsRef<str>, T: AsRef<str>>(left: &[S], right: &[T]) -> Self {
        Self {
            left_keys: left.iter().map(|n| n.as_ref().to_string()).collect(),
            right_keys: right.iter().map(|n| n.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn cross() -> Self {
        Self::default().kind(JoinKind::Cross)
    }

    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.options.suffixes = Suffixes {
            left: left.into(),
            right: right.into(),
        };
        self
    }

    pub fn with_options(mut self, options: JoinOptions) -> Self {
        self.options = options;
        self
    }
}

/// Parallel row-index arrays describing the joined rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinIndices {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl JoinIndices {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    fn with_capacity(n: usize) -> Self {
        Self {
            left: Vec::with_capacity(n),
            right: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, left: usize, right: usize) {
        self.left.push(left);
        self.right.push(right);
    }
}

fn validate(left: &Table, right: &Table, spec: &JoinSpec) -> FrameResult<()> {
    if spec.kind == JoinKind::Cross {
        if !spec.left_keys.is_empty() || !spec.right_keys.is_empty() {
            return Err(FrameError::JoinSpec(
                "a cross join takes no key columns".into(),
            ));
        }
        return Ok(());
    }
    if spec.left_keys.len() != spec.right_keys.len() {
        return Err(FrameError::JoinSpec(format!(
            "{} left key(s) but {} right key(s)",
            spec.left_keys.len(),
            spec.right_keys.len()
        )));
    }
    if spec.left_keys.is_empty() {
        return Err(FrameError::JoinSpec(format!(
            "{:?} join requires at least one key column",
            spec.kind
        )));
    }
    for (l, r) in spec.left_keys.iter().zip(&spec.right_keys) {
        let left_type = left.column(l)?.column_type();
        let right_type = right.column(r)?.column_type();
        let compatible = left_type == right_type
            || left_type == ColumnType::Opaque
            || right_type == ColumnType::Opaque;
        if !compatible {
            return Err(FrameError::JoinKeyType {
                left: l.clone(),
                right: r.clone(),
                left_type,
                right_type,
            });
        }
    }
    Ok(())
}

/// Compute the row pairs of `left` and `right` under `spec`.
///
/// Rows are paired by hashing: both sides' keys are dictionary-encoded against shared
/// dictionaries, the build side is bucketed by key id and the other side probes it. Duplicate
/// keys yield every combination. NA keys never match.
pub fn join_indices(left: &Table, right: &Table, spec: &JoinSpec) -> FrameResult<JoinIndices> {
    validate(left, right, spec)?;
    let (ln, rn) = (left.row_count(), right.row_count());

    if spec.kind == JoinKind::Cross {
        let mut out = JoinIndices::with_capacity(ln.saturating_mul(rn));
        for l in 0..ln {
            for r in 0..rn {
                out.push(l, r);
            }
        }
        return Ok(out);
    }

    let encoded = encode_keys(
        &[
            left.columns_by_name(&spec.left_keys)?,
            right.columns_by_name(&spec.right_keys)?,
        ],
        &[ln, rn],
    );
    let mut parts = encoded.parts.into_iter();
    let (Some(lkeys), Some(rkeys)) = (parts.next(), parts.next()) else {
        return Err(FrameError::JoinSpec("key encoding produced no parts".into()));
    };
    let distinct = encoded.distinct;

    let out = match spec.kind {
        JoinKind::Right => {
            let probed = probe(&lkeys, &rkeys, distinct, true);
            JoinIndices {
                left: probed.build,
                right: probed.probe,
            }
        }
        kind => {
            let keep = matches!(kind, JoinKind::Left | JoinKind::Outer);
            let probed = probe(&rkeys, &lkeys, distinct, keep);
            let mut out = JoinIndices {
                left: probed.probe,
                right: probed.build,
            };
            if kind == JoinKind::Outer {
                for r in 0..rn {
                    if !probed.matched.get(r) {
                        out.push(UNMATCHED, r);
                    }
                }
            }
            out
        }
    };

    log::debug!(
        "{:?} join of {ln} x {rn} row(s) on {:?} produced {} pair(s)",
        spec.kind,
        spec.left_keys,
        out.len()
    );
    Ok(out)
}

struct Probed {
    probe: Vec<usize>,
    build: Vec<usize>,
    /// Build rows that matched at least once.
    matched: BitVec,
}

fn probe(build: &PartKeys, probing: &PartKeys, distinct: usize, keep_unmatched: bool) -> Probed {
    let build_rows = build.ids.len();

    // Bucket build rows by key id, skipping NA keys.
    let mut offsets = vec![0usize; distinct + 1];
    for (row, &id) in build.ids.iter().enumerate() {
        if !build.has_null.get(row) {
            offsets[id as usize + 1] += 1;
        }
    }
    for i in 0..distinct {
        offsets[i + 1] += offsets[i];
    }
    let mut cursor = offsets.clone();
    let mut bucket = vec![0usize; offsets[distinct]];
    for (row, &id) in build.ids.iter().enumerate() {
        if !build.has_null.get(row) {
            let slot = &mut cursor[id as usize];
            bucket[*slot] = row;
            *slot += 1;
        }
    }

    let mut out = Probed {
        probe: Vec::with_capacity(probing.ids.len()),
        build: Vec::with_capacity(probing.ids.len()),
        matched: BitVec::with_len_all_false(build_rows),
    };
    for (row, &id) in probing.ids.iter().enumerate() {
        let matches = if probing.has_null.get(row) {
            &bucket[0..0]
        } else {
            &bucket[offsets[id as usize]..offsets[id as usize + 1]]
        };
        if matches.is_empty() {
            if keep_unmatched {
                out.probe.push(row);
                out.build.push(UNMATCHED);
            }
            continue;
        }
        for &b in matches {
            out.probe.push(row);
            out.build.push(b);
            out.matched.set(b, true);
        }
    }
    out
}

fn suffixed(name: &str, conflict: bool, suffix: &str) -> String {
    if conflict {
        format!("{name}{suffix}")
    } else {
        name.to_string()
    }
}

/// Left key column whose unmatched rows take the key of the paired right row.
fn coalesce_key(name: &str, left: &Column, right: &Column, pairs: &JoinIndices) -> Column {
    let column_type = left.column_type().widen(right.column_type());
    let mut builder = ColumnBuilder::with_capacity(column_type, pairs.len());
    for (&l, &r) in pairs.left.iter().zip(&pairs.right) {
        let value = if l == UNMATCHED {
            right.get(r)
        } else {
            left.get(l)
        };
        builder.push(&value);
    }
    builder.finish(name)
}

/// Join two tables.
///
/// Output columns are the left columns (keys keep their left names) followed by the right
/// non-key columns. Right key columns are not emitted; for right and outer joins, left key
/// columns take the right key value on rows without a left match.
pub fn join(left: &Table, right: &Table, spec: &JoinSpec) -> FrameResult<Table> {
    let pairs = join_indices(left, right, spec)?;
    let suffixes = &spec.options.suffixes;

    let right_keys: HashSet<&str> = spec.right_keys.iter().map(String::as_str).collect();
    let right_names: HashSet<&str> = right
        .columns()
        .iter()
        .map(Column::name)
        .filter(|n| !right_keys.contains(n))
        .collect();
    let left_names: HashSet<&str> = left.columns().iter().map(Column::name).collect();
    let coalesce = matches!(spec.kind, JoinKind::Right | JoinKind::Outer);

    let mut columns = Vec::with_capacity(left.column_count() + right.column_count());
    for column in left.columns() {
        let name = column.name();
        match spec.left_keys.iter().position(|k| k == name) {
            Some(i) if coalesce => {
                let right_key = right.column(&spec.right_keys[i])?;
                columns.push(coalesce_key(name, column, right_key, &pairs));
            }
            Some(_) => columns.push(column.take(&pairs.left)),
            None => {
                let out = suffixed(name, right_names.contains(name), &suffixes.left);
                columns.push(column.take(&pairs.left).renamed(out));
            }
        }
    }
    for column in right.columns() {
        let name = column.name();
        if right_keys.contains(name) {
            continue;
        }
        let out = suffixed(name, left_names.contains(name), &suffixes.right);
        columns.push(column.take(&pairs.right).renamed(out));
    }

    let mut out = Table::new(columns)?;
    if out.column_count() == 0 {
        out = Table::with_row_count(pairs.len());
    }
    Ok(out)
}

/// Which right row an as-of join picks for a left key `x`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AsofDirection {
    /// Last right row with key `<= x`.
    #[default]
    Backward,
    /// First right row with key `>= x`.
    Forward,
    /// Closest right row; a tie goes to the backward candidate.
    Nearest,
}

/// Ordered key, optional equality keys, direction and tolerance for one as-of join.
#[derive(Clone, Debug, PartialEq)]
pub struct AsofSpec {
    /// Numeric or date column present on both sides.
    pub on: String,
    /// Columns that must be equal on both sides before the ordered key is considered.
    pub by: Vec<String>,
    pub direction: AsofDirection,
    /// Largest accepted distance between the keys, in key units.
    pub tolerance: Option<f64>,
    /// Appended to right column names that clash with a left column.
    pub suffix: String,
}

impl AsofSpec {
    pub fn on(name: impl Into<String>) -> Self {
        Self {
            on: name.into(),
            by: Vec::new(),
            direction: AsofDirection::default(),
            tolerance: None,
            suffix: Suffixes::default().right,
        }
    }

    pub fn by<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.by = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn direction(mut self, direction: AsofDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

/// Ordered key of every row as `f64`; NA (and NaN) rows are `None`.
fn asof_keys(table: &Table, name: &str) -> FrameResult<Vec<Option<f64>>> {
    let column = table.column(name)?;
    column
        .iter()
        .map(|value| match value {
            Value::Null => Ok(None),
            Value::Number(v) if v.is_nan() => Ok(None),
            Value::Number(v) => Ok(Some(v)),
            Value::Date(ms) => Ok(Some(ms as f64)),
            other => Err(FrameError::Type(format!(
                "as-of key {name} holds {other}; expected a number or a date"
            ))),
        })
        .collect()
}

fn validate_asof(left: &Table, right: &Table, spec: &AsofSpec) -> FrameResult<()> {
    if let Some(tolerance) = spec.tolerance {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(FrameError::JoinSpec(format!(
                "as-of tolerance must be a non-negative number, got {tolerance}"
            )));
        }
    }
    if spec.by.iter().any(|b| *b == spec.on) {
        return Err(FrameError::JoinSpec(format!(
            "{} is both the as-of key and an equality key",
            spec.on
        )));
    }
    let left_type = left.column(&spec.on)?.column_type();
    let right_type = right.column(&spec.on)?.column_type();
    let orderable = matches!(left_type, ColumnType::Number | ColumnType::Date);
    if !orderable || left_type != right_type {
        return Err(FrameError::JoinKeyType {
            left: spec.on.clone(),
            right: spec.on.clone(),
            left_type,
            right_type,
        });
    }
    if !spec.by.is_empty() {
        validate(left, right, &JoinSpec::on_many(&spec.by).kind(JoinKind::Left))?;
    }
    Ok(())
}

/// Pair every left row with at most one right row, in left-row order.
///
/// Right rows are bucketed by their `by` key and sorted stably by the ordered key within each
/// bucket; every left row then binary-searches its bucket. NA keys, ordered or not, never match.
pub fn asof_join_indices(
    left: &Table,
    right: &Table,
    spec: &AsofSpec,
) -> FrameResult<JoinIndices> {
    validate_asof(left, right, spec)?;
    let (ln, rn) = (left.row_count(), right.row_count());
    let left_keys = asof_keys(left, &spec.on)?;
    let right_keys = asof_keys(right, &spec.on)?;

    let (lgroups, rgroups, distinct) = if spec.by.is_empty() {
        (PartKeys::default(), PartKeys::default(), 1)
    } else {
        let encoded = encode_keys(
            &[left.columns_by_name(&spec.by)?, right.columns_by_name(&spec.by)?],
            &[ln, rn],
        );
        let mut parts = encoded.parts.into_iter();
        let (Some(l), Some(r)) = (parts.next(), parts.next()) else {
            return Err(FrameError::JoinSpec("key encoding produced no parts".into()));
        };
        (l, r, encoded.distinct)
    };
    let group_of = |part: &PartKeys, row: usize| -> Option<usize> {
        if spec.by.is_empty() {
            Some(0)
        } else if part.has_null.get(row) {
            None
        } else {
            Some(part.ids[row] as usize)
        }
    };

    // Right rows bucketed by group, each bucket sorted by key.
    let mut buckets: Vec<Vec<(f64, usize)>> = vec![Vec::new(); distinct];
    for (row, key) in right_keys.iter().enumerate() {
        if let (Some(key), Some(group)) = (key, group_of(&rgroups, row)) {
            buckets[group].push((*key, row));
        }
    }
    for bucket in &mut buckets {
        bucket.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    let within = |x: f64, k: f64| spec.tolerance.map_or(true, |t| (x - k).abs() <= t);
    let mut out = JoinIndices::with_capacity(ln);
    for (row, key) in left_keys.iter().enumerate() {
        let pick = match (key, group_of(&lgroups, row)) {
            (Some(x), Some(group)) => {
                let bucket = &buckets[group];
                let x = *x;
                // First entry with key > x; its predecessor is the backward candidate.
                let after = bucket.partition_point(|&(k, _)| k <= x);
                let backward = after.checked_sub(1).map(|i| bucket[i]);
                let candidate = match spec.direction {
                    AsofDirection::Backward => backward,
                    AsofDirection::Forward => {
                        let at = bucket.partition_point(|&(k, _)| k < x);
                        bucket.get(at).copied()
                    }
                    AsofDirection::Nearest => match (backward, bucket.get(after).copied()) {
                        (Some(b), Some(f)) if (f.0 - x) < (x - b.0) => Some(f),
                        (Some(b), _) => Some(b),
                        (None, f) => f,
                    },
                };
                candidate
                    .filter(|&(k, _)| within(x, k))
                    .map_or(UNMATCHED, |(_, r)| r)
            }
            _ => UNMATCHED,
        };
        out.push(row, pick);
    }

    log::debug!(
        "{:?} as-of join of {ln} x {rn} row(s) on {} by {:?} matched {} row(s)",
        spec.direction,
        spec.on,
        spec.by,
        out.right.iter().filter(|&&r| r != UNMATCHED).count()
    );
    Ok(out)
}

/// As-of join: every left row, in order, with the columns of its nearest right row.
///
/// Output columns are the left columns followed by the right columns other than the `on` and
/// `by` keys; right names clashing with a left name get `spec.suffix`. Left rows without a
/// match get NA in the right columns.
pub fn asof_join(left: &Table, right: &Table, spec: &AsofSpec) -> FrameResult<Table> {
    let pairs = asof_join_indices(left, right, spec)?;
    let left_names: HashSet<&str> = left.columns().iter().map(Column::name).collect();

    let mut columns: Vec<Column> = left.columns().to_vec();
    for column in right.columns() {
        let name = column.name();
        if name == spec.on || spec.by.iter().any(|b| b == name) {
            continue;
        }
        let out = suffixed(name, left_names.contains(name), &spec.suffix);
        columns.push(column.take(&pairs.right).renamed(out));
    }

    let mut out = Table::new(columns)?;
    if out.column_count() == 0 {
        out = Table::with_row_count(pairs.len());
    }
    Ok(out)
}
