//! Retry with exponential backoff, driven by an explicit failure classifier.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::data_source::{SourceError, SourceErrorKind, SourceFuture};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `min(base * 2^attempt, max)`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay after the failed attempt numbered `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max, jitter } => {
                let scale = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
                let delay = base.checked_mul(scale).unwrap_or(max).min(max);
                if jitter {
                    apply_jitter(delay)
                } else {
                    delay
                }
            }
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let spread = millis / 2;
    let offset = fastrand::u64(0..=spread.saturating_mul(2));
    Duration::from_millis(millis.saturating_sub(spread).saturating_add(offset))
}

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// Decides retry eligibility per error; swappable per data kind.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, error: &SourceError) -> FailureClass;
}

impl<F> FailureClassifier for F
where
    F: Fn(&SourceError) -> FailureClass + Send + Sync,
{
    fn classify(&self, error: &SourceError) -> FailureClass {
        self(error)
    }
}

/// Network trouble, timeouts and remote throttling are transient; everything
/// describing the request itself is permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn classify(&self, error: &SourceError) -> FailureClass {
        match error.kind() {
            SourceErrorKind::RateLimited
            | SourceErrorKind::Unavailable
            | SourceErrorKind::Timeout => FailureClass::Transient,
            SourceErrorKind::NotFound
            | SourceErrorKind::InvalidRequest
            | SourceErrorKind::Malformed
            | SourceErrorKind::Internal => FailureClass::Permanent,
        }
    }
}

/// Successful outcome with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Final failure: the last error and how many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: SourceError,
    pub attempts: u32,
    pub class: FailureClass,
}

impl RetryFailure {
    /// True when the retry budget, not a permanent error, ended the loop.
    pub const fn exhausted(&self) -> bool {
        matches!(self.class, FailureClass::Transient)
    }
}

/// Retry policy. Total attempts = `max_retries + 1`.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    attempt_timeout: Option<Duration>,
    classifier: Arc<dyn FailureClassifier>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            attempt_timeout: None,
            classifier: Arc::new(DefaultClassifier),
        }
    }
}

impl RetryPolicy {
    pub fn exponential(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base,
                max,
                jitter: true,
            },
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Bound each attempt; an elapsed attempt fails as [`SourceErrorKind::Timeout`].
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn classify(&self, error: &SourceError) -> FailureClass {
        self.classifier.classify(error)
    }

    /// Run `operation` until it succeeds, fails permanently or exhausts the
    /// budget. Dropping the returned future abandons the loop between or
    /// during attempts.
    pub async fn run<'a, T, F>(&self, mut operation: F) -> Result<Retried<T>, RetryFailure>
    where
        F: FnMut() -> SourceFuture<'a, T>,
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let error = match self.attempt(operation()).await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    })
                }
                Err(error) => error,
            };

            let class = self.classify(&error);
            if class == FailureClass::Permanent {
                debug!(attempt, error = %error, "permanent failure; not retrying");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    class,
                });
            }
            if attempt > self.max_retries {
                warn!(attempts = attempt, error = %error, "retry budget exhausted");
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                    class,
                });
            }

            let delay = self.backoff.delay(attempt - 1);
            warn!(
                attempt,
                max_attempts = self.max_attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "transient failure; backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt<T>(&self, call: SourceFuture<'_, T>) -> Result<T, SourceError> {
        match self.attempt_timeout {
            None => call.await,
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(SourceError::timeout(format!(
                    "attempt exceeded {}ms",
                    limit.as_millis()
                )))
            }),
        }
    }
}

impl Debug for RetryPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}
