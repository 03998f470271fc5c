use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use quantfetch_cache::{resolve_cache_home, CacheConfig};

use crate::error::ConfigError;
use crate::retry::{Backoff, RetryPolicy};
use crate::throttling::{refill_period, AdmissionMode, RateLimiter};
use crate::validator::ValidationRules;

/// Settings for the ingestion layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Directory holding the cache database.
    pub cache_dir: PathBuf,
    pub cache_db_name: String,
    pub pool_size: usize,
    /// TTL for equity and fixed-income results.
    pub default_ttl: Duration,
    /// TTL for option chains, which go stale faster.
    pub options_ttl: Duration,

    pub rate_limit_per_second: f64,
    pub rate_limit_burst: u32,
    pub rate_limit_mode: AdmissionMode,

    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Budget for each upstream attempt.
    pub request_timeout: Duration,

    pub validate_data: bool,
    /// Return data that failed validation (with a warning) instead of failing.
    pub allow_partial_data: bool,
    /// Also store data that failed validation in the cache.
    pub cache_unvalidated: bool,
    pub yield_ceiling_percent: f64,

    /// Rescale OHLC by the adjusted close (splits and dividends).
    pub auto_adjust: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_dir: resolve_cache_home(),
            cache_db_name: String::from("cache.duckdb"),
            pool_size: 4,
            default_ttl: Duration::from_secs(3_600),
            options_ttl: Duration::from_secs(1_800),
            rate_limit_per_second: 2.0,
            rate_limit_burst: 10,
            rate_limit_mode: AdmissionMode::Blocking,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
            request_timeout: Duration::from_secs(30),
            validate_data: true,
            allow_partial_data: false,
            cache_unvalidated: false,
            yield_ceiling_percent: 100.0,
            auto_adjust: true,
        }
    }
}

impl IngestConfig {
    /// Defaults overlaid with `QUANT_FINANCE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`IngestConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(home) = lookup("QUANT_FINANCE_HOME").filter(|value| !value.is_empty()) {
            config.cache_dir = PathBuf::from(home);
        }
        if let Some(seconds) = parsed::<u64>(&lookup, "QUANT_FINANCE_CACHE_TTL", "integer")? {
            config.default_ttl = Duration::from_secs(seconds);
        }
        if let Some(seconds) = parsed::<u64>(&lookup, "QUANT_FINANCE_OPTIONS_TTL", "integer")? {
            config.options_ttl = Duration::from_secs(seconds);
        }
        if let Some(rate) = parsed::<f64>(&lookup, "QUANT_FINANCE_RATE_LIMIT", "number")? {
            config.rate_limit_per_second = rate;
        }
        if let Some(burst) = parsed::<u32>(&lookup, "QUANT_FINANCE_RATE_BURST", "integer")? {
            config.rate_limit_burst = burst;
        }
        if let Some(retries) = parsed::<u32>(&lookup, "QUANT_FINANCE_MAX_RETRIES", "integer")? {
            config.max_retries = retries;
        }
        if let Some(flag) = flag(&lookup, "QUANT_FINANCE_VALIDATE_DATA")? {
            config.validate_data = flag;
        }
        if let Some(flag) = flag(&lookup, "QUANT_FINANCE_ALLOW_PARTIAL")? {
            config.allow_partial_data = flag;
        }
        if let Some(flag) = flag(&lookup, "QUANT_FINANCE_CACHE_UNVALIDATED")? {
            config.cache_unvalidated = flag;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        refill_period(self.rate_limit_per_second)?;
        if self.rate_limit_burst == 0 {
            return Err(ConfigError::NotPositive {
                field: "rate_limit_burst",
            });
        }
        if self.default_ttl.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "default_ttl",
            });
        }
        if self.options_ttl.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "options_ttl",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "request_timeout",
            });
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::DelayBounds {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        if !self.yield_ceiling_percent.is_finite() || self.yield_ceiling_percent <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "yield_ceiling_percent",
            });
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_db_name)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            db_path: self.db_path(),
            max_pool_size: self.pool_size,
        }
    }

    pub fn rate_limiter(&self) -> Result<RateLimiter, ConfigError> {
        Ok(RateLimiter::new(self.rate_limit_per_second, self.rate_limit_burst)?
            .with_mode(self.rate_limit_mode))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_retries, self.base_delay, self.max_delay)
            .with_backoff(Backoff::Exponential {
                base: self.base_delay,
                max: self.max_delay,
                jitter: self.jitter,
            })
            .with_attempt_timeout(self.request_timeout)
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            yield_ceiling: self.yield_ceiling_percent,
            reject_null_prices: !self.allow_partial_data,
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value,
            expected,
        })
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            expected: "boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = IngestConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.default_ttl, Duration::from_secs(3_600));
        assert_eq!(config.options_ttl, Duration::from_secs(1_800));
        assert!(!config.cache_unvalidated);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("QUANT_FINANCE_HOME", "/tmp/qf"),
            ("QUANT_FINANCE_CACHE_TTL", "60"),
            ("QUANT_FINANCE_RATE_LIMIT", "0.5"),
            ("QUANT_FINANCE_ALLOW_PARTIAL", "yes"),
        ]))
        .expect("config");

        assert_eq!(config.db_path(), PathBuf::from("/tmp/qf/cache.duckdb"));
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert!((config.rate_limit_per_second - 0.5).abs() < f64::EPSILON);
        assert!(config.allow_partial_data);
    }

    #[test]
    fn malformed_environment_values_are_rejected() {
        let error = IngestConfig::from_lookup(lookup(&[("QUANT_FINANCE_RATE_BURST", "many")]))
            .expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                name: "QUANT_FINANCE_RATE_BURST",
                ..
            }
        ));

        let error = IngestConfig::from_lookup(lookup(&[("QUANT_FINANCE_RATE_LIMIT", "0")]))
            .expect_err("zero rate");
        assert_eq!(
            error,
            ConfigError::NotPositive {
                field: "rate_limit_per_second"
            }
        );
    }

    #[test]
    fn unrepresentable_rates_fail_validation_instead_of_panicking() {
        let error = IngestConfig::from_lookup(lookup(&[("QUANT_FINANCE_RATE_LIMIT", "1e-20")]))
            .expect_err("period overflows");
        assert_eq!(error, ConfigError::RateOutOfRange { rate: 1e-20 });

        let config = IngestConfig {
            rate_limit_per_second: 1e-20,
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.rate_limiter().is_err());
    }

    #[test]
    fn delay_bounds_are_checked() {
        let config = IngestConfig {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            ..IngestConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DelayBounds { .. })));
    }
}
