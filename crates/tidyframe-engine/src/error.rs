use std::fmt;
use tidyframe_columnar::{ColumnType, SchemaError, StatsError};

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid join specification: {0}")]
    JoinSpec(String),

    #[error(
        "join key columns have incompatible types: left {left} ({left_type}) vs right {right} ({right_type})"
    )]
    JoinKeyType {
        left: String,
        right: String,
        left_type: ColumnType,
        right_type: ColumnType,
    },

    #[error("invalid pivot specification: {0}")]
    PivotSpec(String),

    #[error(transparent)]
    Task(#[from] TaskFailure),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("type error: {0}")]
    Type(String),
}

/// The error a user row, group or work-unit function returns.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<StatsError> for TaskError {
    fn from(err: StatsError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<SchemaError> for TaskError {
    fn from(err: SchemaError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<FrameError> for TaskError {
    fn from(err: FrameError) -> Self {
        Self::new(err.to_string())
    }
}

/// A task that kept failing after its retries were exhausted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "{stage} failed at {}{} after {attempts} attempt(s): {error}",
    .index,
    ColumnLabel(.column.as_deref())
)]
pub struct TaskFailure {
    /// `"mutate"`, `"filter"`, `"summarise"` or `"process"`.
    pub stage: &'static str,
    /// Output column (or predicate label) the task was computing.
    pub column: Option<String>,
    /// Row index, group index or work-unit index, depending on the stage.
    pub index: usize,
    pub attempts: u32,
    #[source]
    pub error: TaskError,
}

struct ColumnLabel<'a>(Option<&'a str>);

impl fmt::Display for ColumnLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(column) => write!(f, " (column {column})"),
            None => Ok(()),
        }
    }
}
