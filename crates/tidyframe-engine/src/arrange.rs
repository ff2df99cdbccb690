use crate::error::FrameResult;
use std::cmp::Ordering;
use tidyframe_columnar::{kernel_for, Column, Table, Value, KERNEL_THRESHOLD};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// NA sorts last in both directions.
fn compare(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.total_cmp(b);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Stable permutation of `rows` ordered by `keys`.
pub(crate) fn sort_rows(table: &Table, rows: &[usize], keys: &[SortKey]) -> FrameResult<Vec<usize>> {
    let columns = keys
        .iter()
        .map(|k| table.column(&k.column))
        .collect::<Result<Vec<&Column>, _>>()?;

    if let [key] = keys {
        if let Some(sorted) = sort_numeric_bulk(columns[0], rows, key.descending) {
            return Ok(sorted);
        }
    }

    let values: Vec<Vec<Value>> = columns
        .iter()
        .map(|c| rows.iter().map(|&r| c.get(r)).collect())
        .collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        keys.iter()
            .zip(&values)
            .map(|(key, vals)| compare(&vals[a], &vals[b], key.descending))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(order.into_iter().map(|i| rows[i]).collect())
}

/// Large single-key numeric sorts go to the numeric kernel. NA is mapped to NaN, which the kernel
/// places last; columns that already hold NaN take the generic path so NaN and NA stay distinct.
fn sort_numeric_bulk(column: &Column, rows: &[usize], descending: bool) -> Option<Vec<usize>> {
    if rows.len() < KERNEL_THRESHOLD {
        return None;
    }
    let (values, validity) = column.numeric_slice()?;
    let mut gathered = Vec::with_capacity(rows.len());
    for &r in rows {
        if validity.get(r) {
            if values[r].is_nan() {
                return None;
            }
            gathered.push(values[r]);
        } else {
            gathered.push(f64::NAN);
        }
    }
    let order = kernel_for(gathered.len()).stable_sort_indices(&gathered, descending);
    Some(order.into_iter().map(|i| rows[i]).collect())
}

pub(crate) fn arrange_table(table: &Table, keys: &[SortKey]) -> FrameResult<Table> {
    let rows: Vec<usize> = (0..table.row_count()).collect();
    let order = sort_rows(table, &rows, keys)?;
    Ok(table.take(&order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_and_generic_paths_agree() {
        let n = KERNEL_THRESHOLD + 10;
        let values: Vec<Option<f64>> = (0..n)
            .map(|i| if i % 17 == 0 { None } else { Some((i % 23) as f64) })
            .collect();
        let table = Table::new(vec![Column::nullable_numbers("x", values)]).unwrap();
        let rows: Vec<usize> = (0..n).collect();

        for descending in [false, true] {
            let key = SortKey {
                column: "x".into(),
                descending,
            };
            let bulk = sort_rows(&table, &rows, std::slice::from_ref(&key)).unwrap();
            // Two keys force the generic comparator.
            let generic = sort_rows(&table, &rows, &[key.clone(), key]).unwrap();
            assert_eq!(bulk, generic);
        }
    }
}
