//! Scripted market-data source shared by the behavior suites.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quantfetch_core::{
    CacheBackend, DataIngestion, Frame, HistoryRequest, IngestConfig, MarketDataSource, MemoryCache,
    OptionChain, OptionChainRequest, RateLimiter, RealtimeQuote, RetryPolicy, SourceError,
    SourceFuture, Symbol, TickerInfo, TradingDate, YieldRequest,
};

pub const START: &str = "2024-01-02";
pub const END: &str = "2024-01-05";

/// Source whose answers are scripted per test and whose calls are counted.
#[derive(Default)]
pub struct ScriptedSource {
    history_calls: AtomicU32,
    quote_calls: AtomicU32,
    info_calls: AtomicU32,
    chain_calls: AtomicU32,
    expiration_calls: AtomicU32,
    yield_calls: AtomicU32,
    /// Errors returned, in order, before any call succeeds.
    failures: Mutex<VecDeque<SourceError>>,
    unknown: BTreeSet<String>,
    bars: Option<Frame>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols answered with `NotFound`.
    pub fn with_unknown(mut self, symbol: &str) -> Self {
        self.unknown.insert(symbol.to_owned());
        self
    }

    pub fn with_bars(mut self, bars: Frame) -> Self {
        self.bars = Some(bars);
        self
    }

    pub fn with_failures(self, failures: impl IntoIterator<Item = SourceError>) -> Self {
        if let Ok(mut queue) = self.failures.lock() {
            queue.extend(failures);
        }
        self
    }

    /// Sleep inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> u32 {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> u32 {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn chain_calls(&self) -> u32 {
        self.chain_calls.load(Ordering::SeqCst)
    }

    pub fn expiration_calls(&self) -> u32 {
        self.expiration_calls.load(Ordering::SeqCst)
    }

    pub fn yield_calls(&self) -> u32 {
        self.yield_calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, symbol: Option<&Symbol>) -> Result<(), SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.failures.lock().ok().and_then(|mut queue| queue.pop_front());
        if let Some(error) = scripted {
            return Err(error);
        }
        match symbol {
            Some(symbol) if self.unknown.contains(symbol.as_str()) => Err(SourceError::not_found(
                format!("no data for {symbol}"),
            )),
            _ => Ok(()),
        }
    }
}

impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, Frame> {
        Box::pin(async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Some(req.symbol())).await?;
            Ok(self.bars.clone().unwrap_or_else(healthy_bars))
        })
    }

    fn quote<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, RealtimeQuote> {
        Box::pin(async move {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Some(&symbol)).await?;
            Ok(RealtimeQuote {
                symbol,
                price: 187.5,
                previous_close: Some(185.0),
                open: Some(185.5),
                day_high: Some(188.0),
                day_low: Some(184.9),
                volume: Some(48_000_000),
                currency: Some(String::from("USD")),
                market_cap: Some(2.9e12),
                as_of: Some(1_704_398_400),
            })
        })
    }

    fn info<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, TickerInfo> {
        Box::pin(async move {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Some(&symbol)).await?;
            Ok(TickerInfo {
                symbol,
                name: Some(String::from("Apple Inc.")),
                sector: Some(String::from("Technology")),
                industry: Some(String::from("Consumer Electronics")),
                market_cap: Some(2.9e12),
                currency: Some(String::from("USD")),
                exchange: Some(String::from("NasdaqGS")),
                quote_type: Some(String::from("EQUITY")),
                country: None,
                website: None,
                employees: None,
            })
        })
    }

    fn option_expirations<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, Vec<TradingDate>> {
        Box::pin(async move {
            self.expiration_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Some(&symbol)).await?;
            ["2024-01-19", "2024-02-16"]
                .into_iter()
                .map(|raw| TradingDate::parse(raw).map_err(|e| SourceError::internal(e.to_string())))
                .collect()
        })
    }

    fn option_chain<'a>(&'a self, req: OptionChainRequest) -> SourceFuture<'a, OptionChain> {
        Box::pin(async move {
            self.chain_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Some(req.symbol())).await?;
            let expiration = match req.expiration() {
                Some(expiration) => expiration,
                None => TradingDate::parse("2024-01-19")
                    .map_err(|e| SourceError::internal(e.to_string()))?,
            };
            Ok(OptionChain {
                symbol: req.symbol().clone(),
                expiration,
                calls: chain_side("C", &[(180.0, 8.1), (185.0, 4.2)]),
                puts: chain_side("P", &[(180.0, 1.3)]),
            })
        })
    }

    fn treasury_yields<'a>(&'a self, req: YieldRequest) -> SourceFuture<'a, Frame> {
        Box::pin(async move {
            self.yield_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(None).await?;
            let mut frame = Frame::new(req.maturities().iter().map(|maturity| maturity.as_str()));
            let width = req.maturities().len();
            frame.push_row("2024-01-02", vec![Some(3.95); width]);
            frame.push_row("2024-01-03", vec![Some(3.91); width]);
            Ok(frame)
        })
    }
}

pub fn healthy_bars() -> Frame {
    let mut frame = Frame::new(["Open", "High", "Low", "Close", "Volume"]);
    frame.push_row(
        "2024-01-02",
        vec![Some(187.15), Some(188.44), Some(183.89), Some(185.64), Some(82_488_700.0)],
    );
    frame.push_row(
        "2024-01-03",
        vec![Some(184.22), Some(185.88), Some(183.43), Some(184.25), Some(58_414_500.0)],
    );
    frame
}

/// Bars with one row whose High is below its Low.
pub fn inverted_bars() -> Frame {
    let mut frame = healthy_bars();
    frame.push_row(
        "2024-01-04",
        vec![Some(182.15), Some(181.0), Some(183.09), Some(181.91), Some(71_983_600.0)],
    );
    frame
}

/// Bars with one row missing its High.
pub fn gapped_bars() -> Frame {
    let mut frame = healthy_bars();
    frame.push_row(
        "2024-01-04",
        vec![Some(182.15), None, Some(180.88), Some(181.91), Some(71_983_600.0)],
    );
    frame
}

fn chain_side(prefix: &str, contracts: &[(f64, f64)]) -> Frame {
    let mut frame = Frame::new(["Strike", "Last", "Bid", "Ask", "Volume", "OpenInterest"]);
    for (strike, last) in contracts {
        frame.push_row(
            format!("AAPL240119{prefix}{strike:08.0}"),
            vec![
                Some(*strike),
                Some(*last),
                Some(last - 0.05),
                Some(last + 0.05),
                Some(120.0),
                Some(3_400.0),
            ],
        );
    }
    frame
}

/// Log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        self.0
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Config that never waits: generous limiter, millisecond backoff.
pub fn fast_config() -> IngestConfig {
    IngestConfig {
        rate_limit_per_second: 1_000.0,
        rate_limit_burst: 1_000,
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
        ..IngestConfig::default()
    }
}

pub fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1), max_retries)
}

/// Ingestion over a scripted source and an in-memory cache.
pub fn ingestion(source: &Arc<ScriptedSource>) -> (DataIngestion, Arc<MemoryCache>) {
    ingestion_with(source, fast_config())
}

pub fn ingestion_with(
    source: &Arc<ScriptedSource>,
    config: IngestConfig,
) -> (DataIngestion, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let backend: Arc<dyn CacheBackend> = cache.clone();
    let upstream: Arc<dyn MarketDataSource> = source.clone();
    let ingestion = DataIngestion::builder(config)
        .with_source(upstream)
        .with_cache(backend)
        .build()
        .expect("ingestion builds");
    (ingestion, cache)
}

pub fn shared_limiter(per_second: f64, burst: u32) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(per_second, burst).expect("valid limiter"))
}
