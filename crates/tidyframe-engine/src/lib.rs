//! Relational operators over tidyframe tables.
//!
//! Joins, pivots, grouped verbs and a transform pipeline whose row and group functions may be
//! synchronous or asynchronous. A stage built only from synchronous functions completes
//! immediately; otherwise it returns a pending [`StageOutput`] that the caller awaits. Pending
//! stages poll their tasks cooperatively on the awaiting task and never spawn.
//!
//! ```ignore
//! use tidyframe_engine::{Mutate, TableVerbs};
//!
//! let out = table
//!     .mutate(&Mutate::new().sync("double", |row| {
//!         Ok(row.get("x")?.as_f64().map(|x| x * 2.0).into())
//!     }))?
//!     .into_ready();
//! ```

#![forbid(unsafe_code)]

mod arrange;
mod concurrency;
mod error;
mod grouped;
mod join;
mod mutate;
mod pipeline;
mod pivot;
mod retry;
mod row;
mod stage;
mod summarise;
mod verbs;

pub use crate::arrange::SortKey;
pub use crate::concurrency::{batch, process_concurrently, task, ConcurrencyOptions, TaskFactory};
pub use crate::error::{FrameError, FrameResult, TaskError, TaskFailure};
pub use crate::grouped::GroupedTable;
pub use crate::join::{
    asof_join, asof_join_indices, join, join_indices, AsofDirection, AsofSpec, JoinIndices,
    JoinKind, JoinOptions, JoinSpec, Suffixes, UNMATCHED,
};
pub use crate::mutate::{Filter, Mutate};
pub use crate::pipeline::{GroupFn, RowFn, TransformFn};
pub use crate::pivot::{
    pivot_longer, pivot_wider, CombineFn, DuplicatePolicy, PivotLongerSpec, PivotWiderSpec,
};
pub use crate::retry::{
    Backoff, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    DEFAULT_MULTIPLIER,
};
pub use crate::row::{GroupView, RowContext};
pub use crate::stage::StageOutput;
pub use crate::summarise::Summary;
pub use crate::verbs::TableVerbs;

pub use tidyframe_columnar::{
    stats, Column, ColumnType, GroupPartition, NaPolicy, SchemaError, StatsError, Table, Value,
};
