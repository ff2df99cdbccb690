use crate::error::TaskError;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

pub type RetryPredicate = Arc<dyn Fn(&TaskError, u32) -> bool + Send + Sync>;
pub type RetryCallback = Arc<dyn Fn(&TaskError, u32, usize) + Send + Sync>;
pub type DelayFn = Arc<dyn Fn(&TaskError, u32, usize) -> Duration + Send + Sync>;

/// Delay schedule between attempts. `attempt` is the 1-based number of the attempt that failed.
#[derive(Clone)]
pub enum Backoff {
    None,
    /// `base * attempt`.
    Linear { base: Duration },
    /// `base * multiplier^(attempt - 1)`.
    Exponential { base: Duration, multiplier: f64 },
    /// Delay computed by the caller from the error, the failed attempt and the task index;
    /// not capped by `max_delay`.
    Custom(DelayFn),
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::None => f.write_str("None"),
            Backoff::Linear { base } => f.debug_struct("Linear").field("base", base).finish(),
            Backoff::Exponential { base, multiplier } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("multiplier", multiplier)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Backoff {
    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base }
    }

    pub fn exponential(base: Duration, multiplier: f64) -> Self {
        Backoff::Exponential { base, multiplier }
    }

    pub fn custom(
        f: impl Fn(&TaskError, u32, usize) -> Duration + Send + Sync + 'static,
    ) -> Self {
        Backoff::Custom(Arc::new(f))
    }

    /// Delay to wait after `attempt` of task `index` failed with `error`.
    pub fn delay(
        &self,
        error: &TaskError,
        attempt: u32,
        index: usize,
        max_delay: Duration,
    ) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Linear { base } => base.saturating_mul(attempt).min(max_delay),
            Backoff::Exponential { base, multiplier } => {
                let exp = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let nanos = base.as_nanos() as f64 * multiplier.powi(exp);
                if nanos.is_finite() && nanos < max_delay.as_nanos() as f64 {
                    Duration::from_nanos(nanos.max(0.0).round() as u64)
                } else {
                    max_delay
                }
            }
            Backoff::Custom(f) => f(error, attempt, index),
        }
    }
}

/// How failed tasks are retried.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub max_delay: Duration,
    /// Decides whether a failure is retryable; every failure is when unset.
    pub should_retry: Option<RetryPredicate>,
    /// Called before sleeping with the error, the failed attempt and the task index.
    pub on_retry: Option<RetryCallback>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
            max_delay: DEFAULT_MAX_DELAY,
            should_retry: None,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("max_delay", &self.max_delay)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_should_retry(
        mut self,
        f: impl Fn(&TaskError, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(f));
        self
    }

    pub fn with_on_retry(mut self, f: impl Fn(&TaskError, u32, usize) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(f));
        self
    }

    fn retryable(&self, error: &TaskError, attempt: u32) -> bool {
        attempt <= self.max_retries
            && self
                .should_retry
                .as_ref()
                .map_or(true, |predicate| predicate(error, attempt))
    }
}

/// A task that failed for good.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Exhausted {
    pub index: usize,
    pub attempts: u32,
    pub error: TaskError,
}

/// Run the work unit built by `factory`, rebuilding it for every retry.
pub(crate) async fn run_with_retry<T>(
    index: usize,
    factory: &(dyn Fn() -> BoxFuture<'static, Result<T, TaskError>> + Send + Sync),
    policy: Option<&RetryPolicy>,
) -> Result<T, Exhausted> {
    let mut attempt = 1u32;
    loop {
        let error = match factory().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let Some(policy) = policy.filter(|p| p.retryable(&error, attempt)) else {
            return Err(Exhausted {
                index,
                attempts: attempt,
                error,
            });
        };
        let delay = policy.backoff.delay(&error, attempt, index, policy.max_delay);
        log::warn!(
            "task {index} failed on attempt {attempt}: {error}; retrying in {delay:?}"
        );
        if let Some(on_retry) = &policy.on_retry {
            on_retry(&error, attempt, index);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
