//! Token-bucket admission for upstream calls.
//!
//! Backed by `governor`'s GCRA limiter: a bucket of `burst` tokens refilled
//! continuously at `refill_per_second`. The check-and-consume is a single
//! atomic compare-and-swap on the limiter state, so concurrent callers never
//! overdraw it, and a blocked caller waits outside of it. Dropping a pending
//! `acquire` consumes nothing.

use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as GovernorLimiter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ConfigError;

type DirectRateLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// What `acquire` does when the bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Suspend until a token is available.
    #[default]
    Blocking,
    /// Fail immediately with [`RateLimitExceeded`].
    NonBlocking,
}

/// Admission denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no rate-limit token available; next slot in {retry_after:?}")]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
}

/// Shared limiter instance. Construct once and hand an `Arc` to every fetcher
/// that should draw from the same budget.
pub struct RateLimiter {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
    refill_per_second: f64,
    burst: NonZeroU32,
    mode: AdmissionMode,
    max_wait: Option<Duration>,
}

impl RateLimiter {
    pub fn new(refill_per_second: f64, burst: u32) -> Result<Self, ConfigError> {
        let period = refill_period(refill_per_second)?;
        let burst = NonZeroU32::new(burst).ok_or(ConfigError::NotPositive {
            field: "rate_limit_burst",
        })?;

        let quota = Quota::with_period(period)
            .ok_or(ConfigError::RateOutOfRange {
                rate: refill_per_second,
            })?
            .allow_burst(burst);

        Ok(Self {
            limiter: GovernorLimiter::direct(quota),
            clock: DefaultClock::default(),
            refill_per_second,
            burst,
            mode: AdmissionMode::Blocking,
            max_wait: None,
        })
    }

    #[must_use]
    pub fn with_mode(mut self, mode: AdmissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bound a blocking wait; past it the caller is denied.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Take one token according to the configured mode.
    pub async fn acquire(&self) -> Result<(), RateLimitExceeded> {
        match self.mode {
            AdmissionMode::NonBlocking => self.try_acquire(),
            AdmissionMode::Blocking => match self.max_wait {
                None => {
                    self.limiter.until_ready().await;
                    Ok(())
                }
                Some(max_wait) => {
                    if tokio::time::timeout(max_wait, self.limiter.until_ready())
                        .await
                        .is_ok()
                    {
                        return Ok(());
                    }
                    debug!(max_wait_ms = max_wait.as_millis() as u64, "rate limiter wait expired");
                    self.try_acquire()
                }
            },
        }
    }

    /// Take one token or fail without waiting.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        self.limiter.check().map_err(|not_until| RateLimitExceeded {
            retry_after: not_until.wait_time_from(self.clock.now()),
        })
    }

    pub const fn refill_per_second(&self) -> f64 {
        self.refill_per_second
    }

    pub const fn burst(&self) -> u32 {
        self.burst.get()
    }

    pub const fn mode(&self) -> AdmissionMode {
        self.mode
    }
}

/// Interval between two refills at `refill_per_second`.
///
/// Rejects rates whose period does not fit a `Duration` or rounds down to
/// zero nanoseconds.
pub(crate) fn refill_period(refill_per_second: f64) -> Result<Duration, ConfigError> {
    if !refill_per_second.is_finite() || refill_per_second <= 0.0 {
        return Err(ConfigError::NotPositive {
            field: "rate_limit_per_second",
        });
    }
    match Duration::try_from_secs_f64(refill_per_second.recip()) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(ConfigError::RateOutOfRange {
            rate: refill_per_second,
        }),
    }
}

impl Debug for RateLimiter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("refill_per_second", &self.refill_per_second)
            .field("burst", &self.burst)
            .field("mode", &self.mode)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn admits_exactly_burst_without_elapsed_time() {
        let limiter = RateLimiter::new(1.0, 5)
            .expect("limiter")
            .with_mode(AdmissionMode::NonBlocking);

        let admitted = (0..20).filter(|_| limiter.try_acquire().is_ok()).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn denial_reports_time_until_next_token() {
        let limiter = RateLimiter::new(1.0, 1).expect("limiter");
        limiter.try_acquire().expect("first token");

        let denied = limiter.try_acquire().expect_err("bucket is empty");
        assert!(denied.retry_after > Duration::ZERO);
        assert!(denied.retry_after <= Duration::from_secs(1));
    }

    #[test]
    fn rejects_non_positive_settings() {
        assert!(RateLimiter::new(0.0, 1).is_err());
        assert!(RateLimiter::new(f64::NAN, 1).is_err());
        assert!(matches!(
            RateLimiter::new(2.0, 0),
            Err(ConfigError::NotPositive { field: "rate_limit_burst" })
        ));
    }

    #[test]
    fn rejects_rates_whose_period_does_not_fit_a_duration() {
        assert_eq!(
            RateLimiter::new(1e-20, 1).map(|_| ()),
            Err(ConfigError::RateOutOfRange { rate: 1e-20 })
        );
        assert_eq!(
            RateLimiter::new(1e12, 1).map(|_| ()),
            Err(ConfigError::RateOutOfRange { rate: 1e12 })
        );
        assert!(RateLimiter::new(1e-6, 1).is_ok());
    }

    #[tokio::test]
    async fn non_blocking_acquire_fails_fast() {
        let limiter = RateLimiter::new(0.1, 1)
            .expect("limiter")
            .with_mode(AdmissionMode::NonBlocking);
        limiter.acquire().await.expect("first");

        let started = Instant::now();
        assert!(limiter.acquire().await.is_err());
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrent_callers_never_overdraw_the_bucket() {
        let limiter = Arc::new(
            RateLimiter::new(0.5, 4)
                .expect("limiter")
                .with_mode(AdmissionMode::NonBlocking),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move { limiter.acquire().await.is_ok() });
        }

        let mut admitted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.expect("task") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 4);
    }

    #[tokio::test]
    async fn sustained_throughput_converges_to_refill_rate() {
        let limiter = RateLimiter::new(20.0, 1).expect("limiter");

        let started = Instant::now();
        for _ in 0..11 {
            limiter.acquire().await.expect("blocking acquire");
        }
        let elapsed = started.elapsed();

        // 10 refills at 50ms each after the initial token.
        assert!(elapsed >= Duration::from_millis(400), "too fast: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_500), "too slow: {elapsed:?}");
    }

    #[tokio::test]
    async fn bounded_wait_denies_after_max_wait() {
        let limiter = RateLimiter::new(0.2, 1)
            .expect("limiter")
            .with_max_wait(Duration::from_millis(30));
        limiter.acquire().await.expect("first");

        let denied = limiter.acquire().await.expect_err("second must time out");
        assert!(denied.retry_after > Duration::from_secs(1));
    }
}
