#![forbid(unsafe_code)]

//! Dictionary encoding of key columns into dense integer ids.
//!
//! Each key column is mapped to small codes (`0` is reserved for NA). Codes of several key
//! columns are combined into one composite key, either packed mixed-radix into a `u64` or kept
//! as a tuple when the cardinality product overflows. Composite keys are finally densified into
//! ids assigned in order of first appearance, scanning the parts in order.

use crate::bitmap::BitVec;
use crate::column::Column;
use crate::types::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::hash::Hash;

/// Code reserved for NA in every key column.
pub const NA_CODE: u32 = 0;

/// Direct-address tables are used while the key space stays below this size (or twice the row
/// count, whichever is larger).
const DIRECT_TABLE_MIN: u64 = 1 << 12;

pub type TupleKey = SmallVec<[u32; 4]>;

/// How composite keys were represented while densifying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPacking {
    /// Key space small enough for a direct-address table.
    Direct,
    /// Mixed-radix `u64` keys hashed into a map.
    Packed,
    /// Per-row code tuples; used when the cardinality product overflows `u64`.
    Tuple,
}

/// Dense key ids for one part (one table).
#[derive(Clone, Debug, Default)]
pub struct PartKeys {
    /// Dense id per row.
    pub ids: Vec<u32>,
    /// Rows where at least one key column is NA.
    pub has_null: BitVec,
}

#[derive(Clone, Debug)]
pub struct EncodedKeys {
    pub parts: Vec<PartKeys>,
    /// Number of distinct composite keys across all parts.
    pub distinct: usize,
    pub packing: KeyPacking,
}

/// Per-column dictionary shared across parts, so equal values get equal codes on every side.
#[derive(Debug, Default)]
struct ColumnEncoder {
    codes: HashMap<Value, u32>,
}

impl ColumnEncoder {
    fn code(&mut self, value: Value) -> u32 {
        if value.is_null() {
            return NA_CODE;
        }
        let next = self.codes.len() as u32 + 1;
        *self.codes.entry(value).or_insert(next)
    }

    fn encode(&mut self, column: &Column) -> Vec<u32> {
        if let Some((indices, validity, dictionary)) = column.dictionary_codes() {
            // Translate the dictionary once, then map per-row indices.
            let translated: Vec<u32> = dictionary
                .iter()
                .map(|s| self.code(Value::String(s.clone())))
                .collect();
            return indices
                .iter()
                .enumerate()
                .map(|(row, &idx)| {
                    if validity.get(row) {
                        translated[idx as usize]
                    } else {
                        NA_CODE
                    }
                })
                .collect();
        }
        column.iter().map(|v| self.code(v)).collect()
    }

    /// Number of codes in use, including the NA code.
    fn cardinality(&self) -> u64 {
        self.codes.len() as u64 + 1
    }
}

/// Encode the key columns of one or more tables against shared dictionaries.
///
/// `parts[i]` holds the key columns of part `i`; every part must supply the same number of key
/// columns, each as long as that part's row count `rows[i]`. With no key columns every row of
/// every part shares one key.
pub fn encode_keys(parts: &[Vec<&Column>], rows: &[usize]) -> EncodedKeys {
    debug_assert_eq!(parts.len(), rows.len());
    let key_count = parts.first().map_or(0, Vec::len);
    debug_assert!(parts.iter().all(|p| p.len() == key_count));

    let mut encoders: Vec<ColumnEncoder> =
        (0..key_count).map(|_| ColumnEncoder::default()).collect();
    // codes[part][key] -> per-row codes
    let codes: Vec<Vec<Vec<u32>>> = parts
        .iter()
        .map(|cols| {
            cols.iter()
                .zip(encoders.iter_mut())
                .map(|(col, enc)| enc.encode(col))
                .collect()
        })
        .collect();

    let has_null: Vec<BitVec> = codes
        .iter()
        .zip(rows)
        .map(|(part, &n)| {
            (0..n)
                .map(|r| part.iter().any(|c| c[r] == NA_CODE))
                .collect()
        })
        .collect();

    let cardinalities: Vec<u64> = encoders.iter().map(ColumnEncoder::cardinality).collect();
    let space = cardinalities
        .iter()
        .try_fold(1u64, |acc, &c| acc.checked_mul(c));
    let total_rows: usize = rows.iter().sum();

    let (ids, distinct, packing) = match space {
        Some(space) if space <= DIRECT_TABLE_MIN.max(2 * total_rows as u64) => {
            let packed = pack(&codes, rows, &cardinalities);
            let (ids, distinct) = densify_direct(&packed, space as usize);
            (ids, distinct, KeyPacking::Direct)
        }
        Some(_) => {
            let packed = pack(&codes, rows, &cardinalities);
            let (ids, distinct) = densify(packed);
            (ids, distinct, KeyPacking::Packed)
        }
        None => {
            let tuples: Vec<Vec<TupleKey>> = codes
                .iter()
                .zip(rows)
                .map(|(part, &n)| {
                    (0..n)
                        .map(|r| part.iter().map(|c| c[r]).collect::<TupleKey>())
                        .collect()
                })
                .collect();
            let (ids, distinct) = densify(tuples);
            (ids, distinct, KeyPacking::Tuple)
        }
    };

    log::debug!(
        "encoded {} key column(s) over {} row(s): {} distinct keys ({:?})",
        key_count,
        total_rows,
        distinct,
        packing
    );

    EncodedKeys {
        parts: ids
            .into_iter()
            .zip(has_null)
            .map(|(ids, has_null)| PartKeys { ids, has_null })
            .collect(),
        distinct,
        packing,
    }
}

fn pack(codes: &[Vec<Vec<u32>>], rows: &[usize], cardinalities: &[u64]) -> Vec<Vec<u64>> {
    codes
        .iter()
        .zip(rows)
        .map(|(part, &n)| {
            let mut out = vec![0u64; n];
            let mut radix = 1u64;
            for (col, &card) in part.iter().zip(cardinalities) {
                for (slot, &code) in out.iter_mut().zip(col) {
                    *slot += u64::from(code) * radix;
                }
                // Cannot overflow: the caller checked the full product fits.
                radix = radix.wrapping_mul(card);
            }
            out
        })
        .collect()
}

fn densify_direct(parts: &[Vec<u64>], space: usize) -> (Vec<Vec<u32>>, usize) {
    let mut table = vec![u32::MAX; space];
    let mut next = 0u32;
    let ids = parts
        .iter()
        .map(|part| {
            part.iter()
                .map(|&key| {
                    let slot = &mut table[key as usize];
                    if *slot == u32::MAX {
                        *slot = next;
                        next += 1;
                    }
                    *slot
                })
                .collect()
        })
        .collect();
    (ids, next as usize)
}

fn densify<K: Hash + Eq>(parts: Vec<Vec<K>>) -> (Vec<Vec<u32>>, usize) {
    let mut seen: HashMap<K, u32> = HashMap::new();
    let ids = parts
        .into_iter()
        .map(|part| {
            part.into_iter()
                .map(|key| {
                    let next = seen.len() as u32;
                    *seen.entry(key).or_insert(next)
                })
                .collect()
        })
        .collect();
    (ids, seen.len())
}
