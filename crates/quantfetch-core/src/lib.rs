//! # quantfetch core
//!
//! Market-data ingestion for quantitative research: historical equity bars,
//! quotes, option chains and treasury yields, fetched through a shared rate
//! limiter, a retry policy with failure classification, a validator and a
//! persistent TTL cache.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo Finance source |
//! | [`cache_manager`] | Cache statistics, sweeps and confirmed invalidation |
//! | [`config`] | `IngestConfig` and its environment overlay |
//! | [`data_source`] | Source trait and structured source errors |
//! | [`domain`] | Symbols, dates, maturities, frames, chains, quotes |
//! | [`fetchers`] | Equity, options and fixed-income entry points |
//! | [`pipeline`] | Cache-aside fetch path |
//! | [`request`] | Fetch requests and cache keys |
//! | [`retry`] | Backoff and failure classification |
//! | [`throttling`] | Token-bucket rate limiter |
//! | [`validator`] | Data quality rules |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quantfetch_core::{DataIngestion, IngestConfig, Interval};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ingestion = DataIngestion::open(IngestConfig::from_env()?)?;
//!
//!     let bars = ingestion
//!         .equity()
//!         .fetch_historical("AAPL", "2023-01-01", "2023-12-31", Interval::OneDay, true)
//!         .await?;
//!     println!("{} rows, cache hit: {}", bars.data.len(), bars.is_cache_hit());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Equity / Options / Yields    │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐     ┌──────────────────┐
//! │ FetchPipeline                │────▶│ Cache (DuckDB)   │
//! │ limiter → retry → validator  │     └──────────────────┘
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐     ┌──────────────────┐
//! │ MarketDataSource (Yahoo)     │────▶│ HTTP client      │
//! └──────────────────────────────┘     └──────────────────┘
//! ```

pub mod adapters;
pub mod cache_manager;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetchers;
pub mod http_client;
mod ingest;
pub mod pipeline;
pub mod request;
pub mod retry;
pub mod throttling;
pub mod validator;

pub use adapters::{YahooAuthManager, YahooSource};
pub use cache_manager::{AutoCleanup, CacheManager, CacheSummary, Invalidation};
pub use config::IngestConfig;
pub use data_source::{MarketDataSource, SourceError, SourceErrorKind, SourceFuture};
pub use domain::{
    DateRange, Frame, Interval, IntoTradingDate, Maturity, OptionChain, OptionSide,
    RealtimeQuote, Symbol, Tabular, TickerInfo, TradingDate,
};
pub use error::{ConfigError, IngestError, ValidationError};
pub use fetchers::{EquityFetcher, FixedIncomeFetcher, MultiFetch, OptionsFetcher};
pub use http_client::{HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use ingest::{DataIngestion, DataIngestionBuilder};
pub use pipeline::{CacheMode, FetchPipeline, Fetched, Origin, Payload, ValidationPolicy, ValidationStatus};
pub use request::{CacheKey, DataKind, FetchRequest, HistoryRequest, OptionChainRequest, YieldRequest};
pub use retry::{Backoff, DefaultClassifier, FailureClass, FailureClassifier, RetryPolicy};
pub use throttling::{AdmissionMode, RateLimitExceeded, RateLimiter};
pub use validator::{Rule, ValidationReport, ValidationRules, Validator, Violation};

pub use quantfetch_cache::{
    CacheBackend, CacheConfig, CacheEntry, CacheError, CacheStats, CacheTable, DuckDbCache,
    MemoryCache,
};
