use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::data_source::SourceError;
use crate::domain::{DateRange, Frame, Interval, IntoTradingDate, RealtimeQuote, Symbol, TickerInfo};
use crate::error::{IngestError, ValidationError};
use crate::pipeline::{CacheMode, FetchPipeline, Fetched};
use crate::request::{FetchRequest, HistoryRequest};

/// Historical bars and quotes for equities and indices.
#[derive(Clone)]
pub struct EquityFetcher {
    pipeline: FetchPipeline,
    ttl: Duration,
}

/// Outcome of a multi-symbol fetch: one entry per input symbol in exactly one
/// of the two maps.
#[derive(Debug)]
pub struct MultiFetch {
    pub results: BTreeMap<String, Fetched<Frame>>,
    pub errors: BTreeMap<String, IngestError>,
}

impl MultiFetch {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EquityFetcher {
    pub fn new(pipeline: FetchPipeline, ttl: Duration) -> Self {
        Self { pipeline, ttl }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// OHLCV bars for `symbol` over `[start, end)`.
    pub async fn fetch_historical(
        &self,
        symbol: &str,
        start: impl IntoTradingDate,
        end: impl IntoTradingDate,
        interval: Interval,
        use_cache: bool,
    ) -> Result<Fetched<Frame>, IngestError> {
        let request = HistoryRequest::new(Symbol::parse(symbol)?, DateRange::parse(start, end)?, interval);
        self.fetch_history(request, CacheMode::from_use_cache(use_cache))
            .await
    }

    pub async fn fetch_history(
        &self,
        request: HistoryRequest,
        mode: CacheMode,
    ) -> Result<Fetched<Frame>, IngestError> {
        let fetch = FetchRequest::History(request.clone());
        self.pipeline
            .run(&fetch, mode, self.ttl, move |source| source.history(request.clone()))
            .await
    }

    /// Independent concurrent fetches, one per distinct symbol. A failing
    /// symbol (including one that does not parse) lands in
    /// [`MultiFetch::errors`] and never aborts the others; only an invalid
    /// date range or an empty list fails the whole call.
    pub async fn fetch_multiple<S: AsRef<str>>(
        &self,
        symbols: &[S],
        start: impl IntoTradingDate,
        end: impl IntoTradingDate,
        interval: Interval,
    ) -> Result<MultiFetch, IngestError> {
        if symbols.is_empty() {
            return Err(ValidationError::EmptySymbolList.into());
        }
        let range = DateRange::parse(start, end)?;

        let mut outcome = MultiFetch {
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
        };
        let mut pending = BTreeSet::new();
        let mut tasks = JoinSet::new();

        for raw in symbols {
            let raw = raw.as_ref().trim();
            let symbol = match Symbol::parse(raw) {
                Ok(symbol) => symbol,
                Err(error) => {
                    outcome.errors.insert(raw.to_ascii_uppercase(), error.into());
                    continue;
                }
            };
            if !pending.insert(symbol.to_string()) {
                continue;
            }

            let fetcher = self.clone();
            let request = HistoryRequest::new(symbol.clone(), range, interval);
            tasks.spawn(async move {
                let result = fetcher.fetch_history(request, CacheMode::Use).await;
                (symbol.to_string(), result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((symbol, Ok(fetched))) => {
                    pending.remove(&symbol);
                    outcome.results.insert(symbol, fetched);
                }
                Ok((symbol, Err(error))) => {
                    debug!(symbol = %symbol, error = %error, "symbol failed in batch");
                    pending.remove(&symbol);
                    outcome.errors.insert(symbol, error);
                }
                Err(error) => warn!(error = %error, "batch fetch task aborted"),
            }
        }

        for symbol in pending {
            let request = FetchRequest::History(HistoryRequest::new(
                Symbol::parse(&symbol)?,
                range,
                interval,
            ));
            outcome.errors.insert(
                symbol,
                IngestError::Fetch {
                    request: request.to_string(),
                    attempts: 0,
                    cause: SourceError::internal("fetch task aborted before completing"),
                },
            );
        }

        Ok(outcome)
    }

    /// Latest quote. Never cached; still rate limited and retried.
    pub async fn fetch_realtime_quote(
        &self,
        symbol: &str,
    ) -> Result<Fetched<RealtimeQuote>, IngestError> {
        let symbol = Symbol::parse(symbol)?;
        let request = FetchRequest::Quote(symbol.clone());
        self.pipeline
            .run(&request, CacheMode::Bypass, self.ttl, move |source| {
                source.quote(symbol.clone())
            })
            .await
    }

    /// Company profile: name, sector, industry, market cap, exchange.
    /// Cached under the equity TTL.
    pub async fn fetch_info(
        &self,
        symbol: &str,
        use_cache: bool,
    ) -> Result<Fetched<TickerInfo>, IngestError> {
        let symbol = Symbol::parse(symbol)?;
        let request = FetchRequest::Info(symbol.clone());
        self.pipeline
            .run(&request, CacheMode::from_use_cache(use_cache), self.ttl, move |source| {
                source.info(symbol.clone())
            })
            .await
    }
}
