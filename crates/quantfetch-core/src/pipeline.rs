//! Cache-aside fetch path shared by every fetcher.
//!
//! ```text
//! cache get ──hit──▶ return
//!     │ miss / refresh
//!     ▼
//! rate limiter ─▶ retry(source call) ─▶ validator ─▶ cache put ─▶ return
//! ```
//!
//! Cache failures never fail a fetch: they are logged at `warn` and reported
//! in [`Fetched::warnings`], and the fetch proceeds against the source.

use std::sync::Arc;
use std::time::Duration;

use quantfetch_cache::{CacheBackend, CacheEntry, CacheError, CacheTable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::data_source::{MarketDataSource, SourceErrorKind, SourceFuture};
use crate::domain::{Frame, OptionChain, RealtimeQuote, TickerInfo, TradingDate};
use crate::error::IngestError;
use crate::request::{CacheKey, DataKind, FetchRequest};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::throttling::RateLimiter;
use crate::validator::{ValidationReport, Validator};

/// How a fetch interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Return an unexpired entry if present; otherwise fetch and store.
    #[default]
    Use,
    /// Skip the read, fetch, and overwrite the stored entry.
    Refresh,
    /// Neither read nor write.
    Bypass,
}

impl CacheMode {
    /// `use_cache = false` still refreshes the stored copy.
    pub const fn from_use_cache(use_cache: bool) -> Self {
        if use_cache {
            Self::Use
        } else {
            Self::Refresh
        }
    }

    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache { fetched_at: OffsetDateTime },
    Upstream,
}

/// Validation outcome attached to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Passed,
    /// Not validated on this call: a cache hit, a payload without rules, or
    /// validation switched off.
    Skipped,
    /// Returned despite violations because partial data is allowed.
    Failed(ValidationReport),
}

/// A fetched payload with its provenance.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub origin: Origin,
    /// Upstream attempts made; zero on a cache hit.
    pub attempts: u32,
    pub validation: ValidationStatus,
    pub cache_key: CacheKey,
    pub warnings: Vec<String>,
}

impl<T> Fetched<T> {
    pub const fn is_cache_hit(&self) -> bool {
        matches!(self.origin, Origin::Cache { .. })
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            origin: self.origin,
            attempts: self.attempts,
            validation: self.validation,
            cache_key: self.cache_key,
            warnings: self.warnings,
        }
    }
}

/// What to do with data that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub validate_data: bool,
    /// Return failing data with a warning instead of an error.
    pub allow_partial_data: bool,
    /// Store failing data in the cache as well. Only consulted when
    /// `allow_partial_data` lets such data through.
    pub cache_unvalidated: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            validate_data: true,
            allow_partial_data: false,
            cache_unvalidated: false,
        }
    }
}

/// Values the pipeline can cache and, where rules exist, validate.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {
    /// Validation report, or `None` when the payload has no quality rules.
    fn check(&self, validator: &Validator, kind: DataKind) -> Option<ValidationReport>;
}

impl Payload for Frame {
    fn check(&self, validator: &Validator, kind: DataKind) -> Option<ValidationReport> {
        Some(validator.validate(kind, self))
    }
}

impl Payload for OptionChain {
    fn check(&self, validator: &Validator, kind: DataKind) -> Option<ValidationReport> {
        Some(validator.validate(kind, self))
    }
}

impl Payload for RealtimeQuote {
    fn check(&self, _: &Validator, _: DataKind) -> Option<ValidationReport> {
        None
    }
}

impl Payload for TickerInfo {
    fn check(&self, _: &Validator, _: DataKind) -> Option<ValidationReport> {
        None
    }
}

impl Payload for Vec<TradingDate> {
    fn check(&self, _: &Validator, _: DataKind) -> Option<ValidationReport> {
        None
    }
}

/// Shared fetch machinery. Cheap to clone; clones share the source, cache and
/// limiter.
#[derive(Clone)]
pub struct FetchPipeline {
    source: Arc<dyn MarketDataSource>,
    cache: Option<Arc<dyn CacheBackend>>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    validator: Validator,
    policy: ValidationPolicy,
}

impl FetchPipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Option<Arc<dyn CacheBackend>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            source,
            cache,
            limiter,
            retry: RetryPolicy::default(),
            validator: Validator::default(),
            policy: ValidationPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &dyn MarketDataSource {
        self.source.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.cache.as_ref()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub const fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Fetch through cache, limiter, retry and validator.
    pub async fn run<'a, P, F>(
        &'a self,
        request: &FetchRequest,
        mode: CacheMode,
        ttl: Duration,
        mut call: F,
    ) -> Result<Fetched<P>, IngestError>
    where
        P: Payload,
        F: FnMut(&'a dyn MarketDataSource) -> SourceFuture<'a, P>,
    {
        let cache_key = request.cache_key();
        let table = request.kind().table();
        let mut warnings = Vec::new();

        if let (true, Some(cache)) = (mode.reads(), self.cache.as_ref()) {
            match read_entry(cache, table, cache_key.as_str()).await {
                Ok(Some(entry)) => match serde_json::from_str::<P>(&entry.payload) {
                    Ok(data) => {
                        debug!(key = %cache_key, "cache hit");
                        return Ok(Fetched {
                            data,
                            origin: Origin::Cache {
                                fetched_at: entry.fetched_at,
                            },
                            attempts: 0,
                            validation: ValidationStatus::Skipped,
                            cache_key,
                            warnings,
                        });
                    }
                    Err(error) => {
                        warn!(key = %cache_key, error = %error, "cached payload is unreadable; refetching");
                        warnings.push(format!("cached payload for {cache_key} is unreadable: {error}"));
                    }
                },
                Ok(None) => debug!(key = %cache_key, "cache miss"),
                Err(error) => {
                    warn!(key = %cache_key, error = %error, "cache read failed; fetching upstream");
                    warnings.push(format!("cache read failed: {error}"));
                }
            }
        }

        self.limiter
            .acquire()
            .await
            .map_err(|denied| IngestError::RateLimitExceeded {
                request: request.to_string(),
                retry_after: denied.retry_after,
            })?;

        let source = self.source.as_ref();
        let retried = self
            .retry
            .run(|| call(source))
            .await
            .map_err(|failure| fetch_error(request, failure))?;
        info!(
            request = %request,
            source = source.name(),
            attempts = retried.attempts,
            "fetched upstream"
        );

        let report = if self.policy.validate_data {
            retried.value.check(&self.validator, request.kind())
        } else {
            None
        };
        let validation = match report {
            None => ValidationStatus::Skipped,
            Some(report) if report.is_valid() => ValidationStatus::Passed,
            Some(report) if self.policy.allow_partial_data => {
                warn!(request = %request, violations = %report, "returning data that failed validation");
                warnings.push(format!("data failed validation: {report}"));
                ValidationStatus::Failed(report)
            }
            Some(report) => {
                return Err(IngestError::Validation {
                    request: request.to_string(),
                    report,
                })
            }
        };

        let storable = !matches!(validation, ValidationStatus::Failed(_)) || self.policy.cache_unvalidated;
        if let (true, true, Some(cache)) = (mode.writes(), storable, self.cache.as_ref()) {
            if let Err(error) = self
                .write_entry(cache, request, &cache_key, &retried.value, ttl)
                .await
            {
                warn!(key = %cache_key, error = %error, "cache write failed; result not stored");
                warnings.push(format!("cache write failed: {error}"));
            }
        }

        Ok(Fetched {
            data: retried.value,
            origin: Origin::Upstream,
            attempts: retried.attempts,
            validation,
            cache_key,
            warnings,
        })
    }

    async fn write_entry<P: Serialize>(
        &self,
        cache: &Arc<dyn CacheBackend>,
        request: &FetchRequest,
        key: &CacheKey,
        payload: &P,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(payload)
            .map_err(|e| CacheError::Corrupt(format!("payload could not be serialized: {e}")))?;
        let entry = CacheEntry::new(key.as_str(), request.label(), payload, ttl);
        let cache = Arc::clone(cache);
        let table = request.kind().table();

        // The write finishes even if the caller is dropped meanwhile, so a row
        // is either fully stored or not stored at all.
        tokio::task::spawn_blocking(move || cache.put(table, &entry))
            .await
            .map_err(|e| CacheError::Unavailable(format!("cache worker failed: {e}")))?
    }
}

async fn read_entry(
    cache: &Arc<dyn CacheBackend>,
    table: CacheTable,
    key: &str,
) -> Result<Option<CacheEntry>, CacheError> {
    let cache = Arc::clone(cache);
    let key = key.to_owned();
    tokio::task::spawn_blocking(move || cache.get(table, &key))
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache worker failed: {e}")))?
}

fn fetch_error(request: &FetchRequest, failure: RetryFailure) -> IngestError {
    if failure.error.kind() == SourceErrorKind::NotFound {
        IngestError::SymbolNotFound {
            request: request.to_string(),
            attempts: failure.attempts,
            cause: failure.error,
        }
    } else {
        IngestError::Fetch {
            request: request.to_string(),
            attempts: failure.attempts,
            cause: failure.error,
        }
    }
}
