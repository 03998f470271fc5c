//! Wiring of source, cache, limiter and policies into ready fetchers.

use std::sync::Arc;

use quantfetch_cache::{CacheBackend, DuckDbCache};
use tracing::{info, warn};

use crate::adapters::YahooSource;
use crate::cache_manager::CacheManager;
use crate::config::IngestConfig;
use crate::data_source::MarketDataSource;
use crate::error::IngestError;
use crate::fetchers::{EquityFetcher, FixedIncomeFetcher, OptionsFetcher};
use crate::http_client::ReqwestHttpClient;
use crate::pipeline::{FetchPipeline, ValidationPolicy};
use crate::retry::RetryPolicy;
use crate::throttling::RateLimiter;
use crate::validator::Validator;

/// The ingestion layer: one shared limiter and cache behind three fetchers.
#[derive(Clone)]
pub struct DataIngestion {
    config: IngestConfig,
    equity: EquityFetcher,
    options: OptionsFetcher,
    fixed_income: FixedIncomeFetcher,
    cache_manager: Option<CacheManager>,
    limiter: Arc<RateLimiter>,
    warnings: Vec<String>,
}

impl DataIngestion {
    /// Yahoo source over the `DuckDB` cache described by `config`.
    pub fn open(config: IngestConfig) -> Result<Self, IngestError> {
        Self::builder(config).build()
    }

    pub fn builder(config: IngestConfig) -> DataIngestionBuilder {
        DataIngestionBuilder {
            config,
            source: None,
            cache: CacheChoice::Configured,
            limiter: None,
            retry: None,
        }
    }

    pub fn equity(&self) -> &EquityFetcher {
        &self.equity
    }

    pub fn options(&self) -> &OptionsFetcher {
        &self.options
    }

    pub fn fixed_income(&self) -> &FixedIncomeFetcher {
        &self.fixed_income
    }

    /// `None` when running without a cache.
    pub fn cache_manager(&self) -> Option<&CacheManager> {
        self.cache_manager.as_ref()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Degradations noticed while wiring (for example an unusable cache).
    pub fn startup_warnings(&self) -> &[String] {
        &self.warnings
    }
}

enum CacheChoice {
    Configured,
    Disabled,
    Backend(Arc<dyn CacheBackend>),
}

/// Builder for [`DataIngestion`]; every part defaults from the config.
pub struct DataIngestionBuilder {
    config: IngestConfig,
    source: Option<Arc<dyn MarketDataSource>>,
    cache: CacheChoice,
    limiter: Option<Arc<RateLimiter>>,
    retry: Option<RetryPolicy>,
}

impl DataIngestionBuilder {
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn MarketDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = CacheChoice::Backend(cache);
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = CacheChoice::Disabled;
        self
    }

    /// Share a limiter with other ingestion instances.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Result<DataIngestion, IngestError> {
        let config = self.config;
        config.validate()?;
        let mut warnings = Vec::new();

        let source: Arc<dyn MarketDataSource> = match self.source {
            Some(source) => source,
            None => Arc::new(
                YahooSource::new(Arc::new(ReqwestHttpClient::new()))
                    .with_auto_adjust(config.auto_adjust)
                    .with_timeout(config.request_timeout),
            ),
        };

        let cache: Option<Arc<dyn CacheBackend>> = match self.cache {
            CacheChoice::Backend(cache) => Some(cache),
            CacheChoice::Disabled => None,
            CacheChoice::Configured => match DuckDbCache::open(config.cache_config()) {
                Ok(cache) => {
                    let cache: Arc<dyn CacheBackend> = Arc::new(cache);
                    Some(cache)
                }
                Err(error) => {
                    warn!(
                        path = %config.db_path().display(),
                        error = %error,
                        "cache unavailable; fetching without it"
                    );
                    warnings.push(format!("cache unavailable: {error}"));
                    None
                }
            },
        };

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => Arc::new(config.rate_limiter()?),
        };
        let retry = self.retry.unwrap_or_else(|| config.retry_policy());

        let pipeline = FetchPipeline::new(source, cache.clone(), Arc::clone(&limiter))
            .with_retry(retry)
            .with_validator(Validator::new(config.validation_rules()))
            .with_policy(ValidationPolicy {
                validate_data: config.validate_data,
                allow_partial_data: config.allow_partial_data,
                cache_unvalidated: config.cache_unvalidated,
            });

        info!(
            cache = cache.is_some(),
            rate_limit_per_second = config.rate_limit_per_second,
            burst = config.rate_limit_burst,
            max_retries = config.max_retries,
            "ingestion layer ready"
        );

        Ok(DataIngestion {
            equity: EquityFetcher::new(pipeline.clone(), config.default_ttl),
            options: OptionsFetcher::new(pipeline.clone(), config.options_ttl),
            fixed_income: FixedIncomeFetcher::new(pipeline, config.default_ttl),
            cache_manager: cache.map(CacheManager::new),
            limiter,
            warnings,
            config,
        })
    }
}
