use crate::error::FrameResult;
use futures_util::future::BoxFuture;
use std::fmt;

/// Result of a pipeline stage: ready when every function was synchronous, pending otherwise.
pub enum StageOutput<T> {
    Ready(T),
    Pending(BoxFuture<'static, FrameResult<T>>),
}

impl<T> StageOutput<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, StageOutput::Pending(_))
    }

    /// The value of a synchronous stage; `None` if the stage is pending.
    pub fn into_ready(self) -> Option<T> {
        match self {
            StageOutput::Ready(value) => Some(value),
            StageOutput::Pending(_) => None,
        }
    }

    pub async fn resolve(self) -> FrameResult<T> {
        match self {
            StageOutput::Ready(value) => Ok(value),
            StageOutput::Pending(fut) => fut.await,
        }
    }

    /// Post-process the stage value, now or once it resolves.
    pub(crate) fn and_then<U, F>(self, f: F) -> FrameResult<StageOutput<U>>
    where
        T: 'static,
        U: 'static,
        F: FnOnce(T) -> FrameResult<U> + Send + 'static,
    {
        Ok(match self {
            StageOutput::Ready(value) => StageOutput::Ready(f(value)?),
            StageOutput::Pending(fut) => {
                StageOutput::Pending(Box::pin(async move { f(fut.await?) }))
            }
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for StageOutput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutput::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            StageOutput::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
