#![forbid(unsafe_code)]

//! Aggregate and window functions with explicit NA handling.
//!
//! Under [`NaPolicy::Propagate`] any NA input makes the result NA. Under [`NaPolicy::Remove`]
//! NA inputs are skipped, and an aggregate left with nothing to work on fails with
//! [`StatsError::NoValidValues`].

use crate::kernel::kernel_for;
use crate::types::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NaPolicy {
    #[default]
    Propagate,
    Remove,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("no valid values remain after removing NA")]
    NoValidValues,

    #[error("{function} expects numeric input, got {value}")]
    NotNumeric {
        function: &'static str,
        value: String,
    },

    #[error("quantile probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Non-NA numbers of `values`, or `None` if an NA must propagate.
fn numeric(
    function: &'static str,
    values: &[Value],
    na: NaPolicy,
) -> StatsResult<Option<Vec<f64>>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Number(v) => out.push(*v),
            Value::Null => {
                if na == NaPolicy::Propagate {
                    return Ok(None);
                }
            }
            other => {
                return Err(StatsError::NotNumeric {
                    function,
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(Some(out))
}

/// Like [`numeric`], but an empty remainder is an error.
fn non_empty_numeric(
    function: &'static str,
    values: &[Value],
    na: NaPolicy,
) -> StatsResult<Option<Vec<f64>>> {
    match numeric(function, values, na)? {
        Some(v) if v.is_empty() => Err(StatsError::NoValidValues),
        other => Ok(other),
    }
}

fn sum_f64(values: &[f64]) -> f64 {
    kernel_for(values.len()).sum(values)
}

/// Sum of the values. The sum of no values is `0`.
pub fn sum(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    let Some(nums) = numeric("sum", values, na)? else {
        return Ok(Value::Null);
    };
    if nums.is_empty() && na == NaPolicy::Remove && !values.is_empty() {
        return Err(StatsError::NoValidValues);
    }
    Ok(Value::Number(sum_f64(&nums)))
}

/// Product of the values. The product of no values is `1`.
pub fn product(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    let Some(nums) = numeric("product", values, na)? else {
        return Ok(Value::Null);
    };
    if nums.is_empty() && na == NaPolicy::Remove && !values.is_empty() {
        return Err(StatsError::NoValidValues);
    }
    Ok(Value::Number(nums.iter().product()))
}

pub fn mean(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    let Some(nums) = non_empty_numeric("mean", values, na)? else {
        return Ok(Value::Null);
    };
    Ok(Value::Number(sum_f64(&nums) / nums.len() as f64))
}

pub fn median(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    quantile(values, 0.5, na)
}

/// Type-7 quantile (linear interpolation between order statistics).
pub fn quantile(values: &[Value], p: f64, na: NaPolicy) -> StatsResult<Value> {
    if !(0.0..=1.0).contains(&p) {
        return Err(StatsError::InvalidProbability(p));
    }
    let Some(mut nums) = non_empty_numeric("quantile", values, na)? else {
        return Ok(Value::Null);
    };
    Ok(Value::Number(
        kernel_for(nums.len()).select_quantile(&mut nums, p),
    ))
}

/// Sample variance (`n - 1` denominator); NA for fewer than two values.
pub fn variance(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    let Some(nums) = non_empty_numeric("variance", values, na)? else {
        return Ok(Value::Null);
    };
    if nums.len() < 2 {
        return Ok(Value::Null);
    }
    let n = nums.len() as f64;
    let mean = sum_f64(&nums) / n;
    let ss: f64 = nums.iter().map(|v| (v - mean) * (v - mean)).sum();
    Ok(Value::Number(ss / (n - 1.0)))
}

pub fn stdev(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    Ok(match variance(values, na)? {
        Value::Number(v) => Value::Number(v.sqrt()),
        other => other,
    })
}

fn extreme(values: &[Value], na: NaPolicy, want: Ordering) -> StatsResult<Value> {
    let mut best: Option<&Value> = None;
    for value in values {
        if value.is_null() {
            if na == NaPolicy::Propagate {
                return Ok(Value::Null);
            }
            continue;
        }
        match best {
            Some(b) if value.total_cmp(b) != want => {}
            _ => best = Some(value),
        }
    }
    best.cloned().ok_or(StatsError::NoValidValues)
}

/// Smallest value. Works for any kind; mixed kinds order by [`Value::total_cmp`].
pub fn min(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    extreme(values, na, Ordering::Less)
}

pub fn max(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    extreme(values, na, Ordering::Greater)
}

/// Number of non-NA values.
pub fn count(values: &[Value]) -> usize {
    values.iter().filter(|v| !v.is_null()).count()
}

/// Number of distinct values. Under `Propagate` NA counts as one distinct value.
pub fn n_distinct(values: &[Value], na: NaPolicy) -> usize {
    values
        .iter()
        .filter(|v| na == NaPolicy::Propagate || !v.is_null())
        .collect::<HashSet<_>>()
        .len()
}

/// First value; under `Remove` the first non-NA value.
pub fn first(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    match na {
        NaPolicy::Propagate => Ok(values.first().cloned().unwrap_or_default()),
        NaPolicy::Remove => values
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .ok_or(StatsError::NoValidValues),
    }
}

/// Last value; under `Remove` the last non-NA value.
pub fn last(values: &[Value], na: NaPolicy) -> StatsResult<Value> {
    match na {
        NaPolicy::Propagate => Ok(values.last().cloned().unwrap_or_default()),
        NaPolicy::Remove => values
            .iter()
            .rev()
            .find(|v| !v.is_null())
            .cloned()
            .ok_or(StatsError::NoValidValues),
    }
}

/// Shift values forward by `k`, filling the first `k` slots with `default`.
pub fn lag(values: &[Value], k: usize, default: Value) -> Vec<Value> {
    let k = k.min(values.len());
    std::iter::repeat(default)
        .take(k)
        .chain(values[..values.len() - k].iter().cloned())
        .collect()
}

/// Shift values backward by `k`, filling the last `k` slots with `default`.
pub fn lead(values: &[Value], k: usize, default: Value) -> Vec<Value> {
    let k = k.min(values.len());
    values[k..]
        .iter()
        .cloned()
        .chain(std::iter::repeat(default).take(k))
        .collect()
}

/// Running sum. Under `Propagate` any NA makes every output NA; under `Remove` NA positions
/// repeat the running total.
pub fn cumsum(values: &[Value], na: NaPolicy) -> StatsResult<Vec<Value>> {
    let Some(_) = numeric("cumsum", values, na)? else {
        return Ok(vec![Value::Null; values.len()]);
    };
    let mut total = 0.0;
    Ok(values
        .iter()
        .map(|v| {
            if let Value::Number(n) = v {
                total += n;
            }
            Value::Number(total)
        })
        .collect())
}

/// Ascending ranks with ties averaged; NA inputs rank as NA.
pub fn rank(values: &[Value]) -> Vec<Value> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| !values[i].is_null())
        .collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut out = vec![Value::Null; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied positions start+1..=end share their mean.
        let avg = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = Value::Number(avg);
        }
        start = end;
    }
    out
}
