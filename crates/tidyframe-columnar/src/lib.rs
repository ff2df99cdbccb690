//! Columnar storage for tidyframe.
//!
//! This crate focuses on:
//! - Immutable, reference-counted columns (dictionary-encoded strings, validity bitmaps).
//! - Tables as ordered sets of equally long columns with structural operators that share storage.
//! - Dictionary encoding of key columns and first-appearance group partitions.
//! - NA-aware aggregate and window functions, with a pluggable bulk numeric kernel.

#![forbid(unsafe_code)]

mod bitmap;
mod column;
pub mod encoding;
mod error;
mod group;
mod kernel;
pub mod stats;
mod table;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::column::{Column, ColumnBuilder, ColumnSchema, NO_ROW};
pub use crate::encoding::{encode_keys, EncodedKeys, KeyPacking, PartKeys};
pub use crate::error::SchemaError;
pub use crate::group::GroupPartition;
pub use crate::kernel::{
    install_kernel, kernel, kernel_for, KernelAlreadyInstalled, NumericKernel, SoftwareKernel,
    KERNEL_THRESHOLD,
};
pub use crate::stats::{NaPolicy, StatsError};
pub use crate::table::{infer_schema, Table, TableBuilder};
pub use crate::types::{infer_column_type, ColumnType, Value};
