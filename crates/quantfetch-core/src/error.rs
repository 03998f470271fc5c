use std::time::Duration;

use quantfetch_cache::CacheError;
use thiserror::Error;

use crate::data_source::SourceError;
use crate::validator::ValidationReport;

/// Rejected caller input, raised before any cache or network access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error(
        "invalid interval '{value}', expected one of 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 5d, 1wk, 1mo, 3mo"
    )]
    InvalidInterval { value: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD or an RFC3339 timestamp")]
    InvalidDate { value: String },
    #[error("end date {end} must be after start date {start}")]
    InvalidDateRange { start: String, end: String },
    #[error("start date {start} is in the future")]
    StartInFuture { start: String },

    #[error("invalid maturity '{value}', expected one of 3M, 6M, 1Y, 2Y, 5Y, 10Y, 30Y")]
    InvalidMaturity { value: String },
    #[error("invalid option side '{value}', expected call or put")]
    InvalidOptionSide { value: String },

    #[error("symbol list cannot be empty")]
    EmptySymbolList,
}

/// Invalid ingestion configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {name}='{value}' is not a valid {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("rate_limit_per_second {rate} gives a refill period outside 1ns..Duration::MAX")]
    RateOutOfRange { rate: f64 },
    #[error("base_delay ({base:?}) must not exceed max_delay ({max:?})")]
    DelayBounds { base: Duration, max: Duration },
}

/// Failures surfaced by the fetch pipeline, fetchers and cache manager.
///
/// Fetch-path variants carry the request description so a failure can be
/// diagnosed from the message alone.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("symbol not found for {request}: {cause}")]
    SymbolNotFound {
        request: String,
        attempts: u32,
        #[source]
        cause: SourceError,
    },

    #[error("data validation failed for {request}: {report}")]
    Validation {
        request: String,
        report: ValidationReport,
    },

    #[error("rate limit exceeded for {request}; next slot in {retry_after:?}")]
    RateLimitExceeded {
        request: String,
        retry_after: Duration,
    },

    #[error("fetch failed for {request} after {attempts} attempt(s): {cause}")]
    Fetch {
        request: String,
        attempts: u32,
        #[source]
        cause: SourceError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IngestError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::SymbolNotFound { .. } => "symbol_not_found",
            Self::Validation { .. } => "validation_failed",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::Fetch { .. } => "fetch_failed",
            Self::Cache(_) => "cache_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Number of upstream attempts made before the error, when any were.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Fetch { attempts, .. } | Self::SymbolNotFound { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_message_names_request_attempts_and_cause() {
        let error = IngestError::Fetch {
            request: String::from("equity AAPL 2024-01-02..2024-02-01 1d"),
            attempts: 4,
            cause: SourceError::unavailable("HTTP 503"),
        };

        let message = error.to_string();
        assert!(message.contains("equity AAPL 2024-01-02..2024-02-01 1d"));
        assert!(message.contains("4 attempt(s)"));
        assert!(message.contains("HTTP 503"));
        assert_eq!(error.code(), "fetch_failed");
        assert_eq!(error.attempts(), Some(4));
        assert!(std::error::Error::source(&error).is_some());
    }
}
