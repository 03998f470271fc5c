//! Yahoo Finance adapter.
//!
//! History, quotes and treasury index series come from the v8 chart endpoint,
//! which needs no authentication. Option chains come from the v7 options
//! endpoint and company metadata from the v10 quoteSummary endpoint; both
//! require a session cookie plus a crumb token. The crumb is cached for an
//! hour and dropped when Yahoo answers 401/403.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::data_source::{MarketDataSource, SourceError, SourceFuture};
use crate::domain::{Frame, Interval, OptionChain, RealtimeQuote, Symbol, TickerInfo, TradingDate};
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::request::{HistoryRequest, OptionChainRequest, YieldRequest};
use crate::validator::OHLCV_COLUMNS;

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const OPTIONS_ENDPOINT: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const QUOTE_SUMMARY_ENDPOINT: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const INFO_MODULES: &str = "price,assetProfile,summaryDetail";
const COOKIE_ENDPOINT: &str = "https://fc.yahoo.com";
const CRUMB_ENDPOINTS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const REFERER: &str = "https://finance.yahoo.com/";
const AUTH_TIMEOUT_MS: u64 = 10_000;

/// Columns of each side of an option chain.
pub const OPTION_CHAIN_COLUMNS: [&str; 10] = [
    "Strike",
    "Last",
    "Bid",
    "Ask",
    "Change",
    "PercentChange",
    "Volume",
    "OpenInterest",
    "ImpliedVolatility",
    "InTheMoney",
];

/// Cookie/crumb session for the authenticated endpoints.
///
/// The slot lock is held across the refresh so concurrent callers wait for a
/// single handshake instead of racing their own.
#[derive(Debug)]
pub struct YahooAuthManager {
    crumb: Mutex<Option<CachedCrumb>>,
    ttl: Duration,
}

#[derive(Debug, Clone)]
struct CachedCrumb {
    value: String,
    obtained: Instant,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(3_600))
    }
}

impl YahooAuthManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            crumb: Mutex::new(None),
            ttl,
        }
    }

    /// Current crumb, performing the cookie and crumb handshake when none is
    /// cached or the cached one is older than the TTL.
    pub async fn crumb(&self, http: &dyn HttpClient) -> Result<String, SourceError> {
        let mut slot = self.crumb.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.obtained.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let value = handshake(http).await?;
        debug!("obtained a new yahoo crumb");
        *slot = Some(CachedCrumb {
            value: value.clone(),
            obtained: Instant::now(),
        });
        Ok(value)
    }

    /// Forget the cached crumb; the next call redoes the handshake.
    pub async fn invalidate(&self) {
        *self.crumb.lock().await = None;
    }
}

async fn handshake(http: &dyn HttpClient) -> Result<String, SourceError> {
    // The cookie lands in the client's jar; the response itself is irrelevant.
    let cookie_request = HttpRequest::get(COOKIE_ENDPOINT)
        .with_header("referer", REFERER)
        .with_timeout_ms(AUTH_TIMEOUT_MS);
    http.execute(cookie_request)
        .await
        .map_err(|e| SourceError::unavailable(format!("failed to fetch yahoo cookie: {}", e.message())))?;

    for endpoint in CRUMB_ENDPOINTS {
        let crumb_request = HttpRequest::get(endpoint)
            .with_header("referer", REFERER)
            .with_timeout_ms(AUTH_TIMEOUT_MS);

        let response = match http.execute(crumb_request).await {
            Ok(response) => response,
            Err(error) => {
                debug!(endpoint, error = %error, "crumb endpoint unreachable");
                continue;
            }
        };
        if response.status == 429 {
            return Err(SourceError::rate_limited("yahoo throttled the crumb request"));
        }
        if !response.is_success() {
            continue;
        }

        let body = response.body.trim();
        if body.contains("<html") || body.contains("<!DOCTYPE") {
            continue;
        }
        if body.to_ascii_lowercase().contains("too many requests") {
            return Err(SourceError::rate_limited("yahoo throttled the crumb request"));
        }
        if !body.is_empty() && body.len() < 100 && !body.contains(' ') {
            return Ok(body.to_string());
        }
    }

    Err(SourceError::unavailable("failed to fetch yahoo crumb from all endpoints"))
}

/// [`MarketDataSource`] backed by Yahoo Finance.
#[derive(Clone)]
pub struct YahooSource {
    http: Arc<dyn HttpClient>,
    auth: Arc<YahooAuthManager>,
    auto_adjust: bool,
    timeout_ms: u64,
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::default()))
    }
}

impl YahooSource {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            auth: Arc::new(YahooAuthManager::default()),
            auto_adjust: true,
            timeout_ms: 30_000,
        }
    }

    /// Rescale OHLC by the adjusted close (splits and dividends).
    #[must_use]
    pub fn with_auto_adjust(mut self, auto_adjust: bool) -> Self {
        self.auto_adjust = auto_adjust;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn auth(&self) -> &YahooAuthManager {
        &self.auth
    }

    fn chart_request(&self, symbol: &str) -> HttpRequest {
        HttpRequest::get(format!("{CHART_ENDPOINT}/{}", urlencoding::encode(symbol)))
            .with_header("referer", REFERER)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn chart(&self, request: HttpRequest, subject: &str) -> Result<ChartResult, SourceError> {
        let envelope: ChartEnvelope = self.get_json(request, subject).await?;
        if let Some(error) = envelope.chart.error {
            return Err(error.into_source_error(subject));
        }
        envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found(format!("yahoo returned no chart for {subject}")))
    }

    async fn daily_chart(
        &self,
        symbol: &str,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<ChartResult, SourceError> {
        let request = self
            .chart_request(symbol)
            .with_query("period1", start.unix_start().to_string())
            .with_query("period2", end.unix_start().to_string())
            .with_query("interval", Interval::OneDay.as_str());
        self.chart(request, symbol).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        subject: &str,
    ) -> Result<T, SourceError> {
        let response = self.http.execute(request).await.map_err(transport_error)?;
        decode(response, subject)
    }

    /// GET an endpoint that needs the crumb. A 401/403 drops the session and
    /// the request is sent once more with a fresh crumb.
    async fn authenticated_get(
        &self,
        request: HttpRequest,
        subject: &str,
    ) -> Result<HttpResponse, SourceError> {
        let response = self.with_crumb(request.clone()).await?;
        if !matches!(response.status, 401 | 403) {
            return Ok(response);
        }
        warn!(
            subject,
            status = response.status,
            "yahoo rejected the crumb; refreshing session"
        );
        self.auth.invalidate().await;
        self.with_crumb(request).await
    }

    async fn with_crumb(&self, request: HttpRequest) -> Result<HttpResponse, SourceError> {
        let crumb = self.auth.crumb(self.http.as_ref()).await?;
        self.http
            .execute(request.with_query("crumb", crumb))
            .await
            .map_err(transport_error)
    }

    async fn options_document(
        &self,
        symbol: &Symbol,
        expiration: Option<TradingDate>,
    ) -> Result<OptionResult, SourceError> {
        let mut request = HttpRequest::get(format!(
            "{OPTIONS_ENDPOINT}/{}",
            urlencoding::encode(symbol.as_str())
        ))
        .with_header("referer", REFERER)
        .with_timeout_ms(self.timeout_ms);
        if let Some(expiration) = expiration {
            request = request.with_query("date", expiration.unix_start().to_string());
        }

        let response = self.authenticated_get(request, symbol.as_str()).await?;
        let envelope: OptionsEnvelope = decode(response, symbol.as_str())?;
        if let Some(error) = envelope.option_chain.error {
            return Err(error.into_source_error(symbol.as_str()));
        }
        envelope
            .option_chain
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found(format!("yahoo lists no options for {symbol}")))
    }

    async fn quote_summary(&self, symbol: &Symbol, modules: &str) -> Result<SummaryResult, SourceError> {
        let request = HttpRequest::get(format!(
            "{QUOTE_SUMMARY_ENDPOINT}/{}",
            urlencoding::encode(symbol.as_str())
        ))
        .with_header("referer", REFERER)
        .with_query("modules", modules)
        .with_timeout_ms(self.timeout_ms);

        let response = self.authenticated_get(request, symbol.as_str()).await?;
        let envelope: SummaryEnvelope = decode(response, symbol.as_str())?;
        if let Some(error) = envelope.quote_summary.error {
            return Err(error.into_source_error(symbol.as_str()));
        }
        envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found(format!("yahoo has no profile for {symbol}")))
    }

    /// Market capitalization from the price module. The chart endpoint does
    /// not carry it, so a failed lookup leaves the quote without one.
    async fn market_cap(&self, symbol: &Symbol) -> Option<f64> {
        match self.quote_summary(symbol, "price").await {
            Ok(summary) => summary.price.and_then(|price| raw(price.market_cap.as_ref())),
            Err(error) => {
                debug!(symbol = %symbol, error = %error, "market cap lookup failed");
                None
            }
        }
    }
}

impl MarketDataSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, Frame> {
        Box::pin(async move {
            let range = req.range();
            let request = self
                .chart_request(req.symbol().as_str())
                .with_query("period1", range.start().unix_start().to_string())
                .with_query("period2", range.end().unix_start().to_string())
                .with_query("interval", req.interval().as_str())
                .with_query("events", "div,splits")
                .with_query("includeAdjustedClose", "true");

            let result = self.chart(request, req.symbol().as_str()).await?;
            Ok(bars_frame(&result, req.interval(), self.auto_adjust))
        })
    }

    fn quote<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, RealtimeQuote> {
        Box::pin(async move {
            let request = self
                .chart_request(symbol.as_str())
                .with_query("range", "5d")
                .with_query("interval", Interval::OneDay.as_str());
            let result = self.chart(request, symbol.as_str()).await?;
            let mut quote = quote_from_chart(symbol, &result)?;
            quote.market_cap = self.market_cap(&quote.symbol).await;
            Ok(quote)
        })
    }

    fn info<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, TickerInfo> {
        Box::pin(async move {
            let summary = self.quote_summary(&symbol, INFO_MODULES).await?;
            Ok(info_from_summary(symbol, summary))
        })
    }

    fn option_expirations<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, Vec<TradingDate>> {
        Box::pin(async move {
            let document = self.options_document(&symbol, None).await?;
            let mut dates = document
                .expiration_dates
                .iter()
                .filter_map(|seconds| TradingDate::from_unix(*seconds))
                .collect::<Vec<_>>();
            dates.sort_unstable();
            dates.dedup();
            Ok(dates)
        })
    }

    fn option_chain<'a>(&'a self, req: OptionChainRequest) -> SourceFuture<'a, OptionChain> {
        Box::pin(async move {
            let document = self.options_document(req.symbol(), req.expiration()).await?;
            chain_from_document(req, document)
        })
    }

    fn treasury_yields<'a>(&'a self, req: YieldRequest) -> SourceFuture<'a, Frame> {
        Box::pin(async move {
            let range = req.range();
            let mut series: BTreeMap<&'static str, BTreeMap<String, f64>> = BTreeMap::new();
            for maturity in req.maturities() {
                let ticker = maturity.index_ticker();
                if series.contains_key(ticker) {
                    continue;
                }
                let result = self.daily_chart(ticker, range.start(), range.end()).await?;
                series.insert(ticker, closes_by_date(&result));
            }

            let frame = yield_frame(req.maturities(), &series);
            if frame.is_empty() {
                return Err(SourceError::not_found(format!(
                    "no treasury yield data between {} and {}",
                    range.start(),
                    range.end()
                )));
            }
            Ok(frame)
        })
    }
}

fn transport_error(error: HttpError) -> SourceError {
    if error.timed_out() {
        SourceError::timeout(format!("yahoo request timed out: {}", error.message()))
    } else {
        SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
    }
}

fn decode<T: DeserializeOwned>(response: HttpResponse, subject: &str) -> Result<T, SourceError> {
    if !response.is_success() {
        return Err(status_error(&response, subject));
    }
    serde_json::from_str(&response.body).map_err(|e| {
        SourceError::malformed(format!("yahoo response for {subject} could not be decoded: {e}"))
    })
}

/// Map a non-2xx response onto an error kind.
fn status_error(response: &HttpResponse, subject: &str) -> SourceError {
    let detail = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .ok()
        .and_then(ErrorEnvelope::into_error)
        .map(|error| error.description)
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    let message = format!("yahoo returned status {} for {subject}: {detail}", response.status);

    match response.status {
        404 => SourceError::not_found(message),
        400 | 422 => SourceError::invalid_request(message),
        429 => SourceError::rate_limited(message),
        408 => SourceError::timeout(message),
        _ => SourceError::unavailable(message),
    }
}

fn cell(values: &[Option<f64>], position: usize) -> Option<f64> {
    values.get(position).copied().flatten()
}

fn bar_label(timestamp: i64, interval: Interval) -> String {
    if interval.is_intraday() {
        OffsetDateTime::from_unix_timestamp(timestamp)
            .ok()
            .and_then(|value| value.format(&Rfc3339).ok())
            .unwrap_or_else(|| timestamp.to_string())
    } else {
        TradingDate::from_unix(timestamp)
            .map(|date| date.to_string())
            .unwrap_or_else(|| timestamp.to_string())
    }
}

/// OHLCV frame from a chart result. Rows whose prices are all missing
/// (holidays Yahoo pads in) are dropped.
fn bars_frame(result: &ChartResult, interval: Interval, auto_adjust: bool) -> Frame {
    let mut frame = Frame::new(OHLCV_COLUMNS);
    let (Some(timestamps), Some(quote)) = (&result.timestamp, result.indicators.quote.first()) else {
        return frame;
    };
    let adjusted = result
        .indicators
        .adjclose
        .first()
        .map(|series| series.adjclose.as_slice())
        .unwrap_or_default();

    for (position, timestamp) in timestamps.iter().enumerate() {
        let open = cell(&quote.open, position);
        let high = cell(&quote.high, position);
        let low = cell(&quote.low, position);
        let close = cell(&quote.close, position);
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        let factor = match (auto_adjust, cell(adjusted, position), close) {
            (true, Some(adjusted), Some(close)) if close != 0.0 => adjusted / close,
            _ => 1.0,
        };
        let scale = |value: Option<f64>| value.map(|price| price * factor);

        frame.push_row(
            bar_label(*timestamp, interval),
            vec![
                scale(open),
                scale(high),
                scale(low),
                scale(close),
                cell(&quote.volume, position),
            ],
        );
    }
    frame
}

fn closes_by_date(result: &ChartResult) -> BTreeMap<String, f64> {
    let bars = bars_frame(result, Interval::OneDay, false);
    let Some(closes) = bars.column("Close") else {
        return BTreeMap::new();
    };
    bars.index
        .iter()
        .zip(closes)
        .filter_map(|(date, close)| close.map(|close| (date.clone(), close)))
        .collect()
}

/// Outer join of the per-index close series, one column per maturity.
fn yield_frame(
    maturities: &[crate::domain::Maturity],
    series: &BTreeMap<&'static str, BTreeMap<String, f64>>,
) -> Frame {
    let mut frame = Frame::new(maturities.iter().map(|maturity| maturity.as_str()));
    let mut dates = series
        .values()
        .flat_map(|closes| closes.keys())
        .collect::<Vec<_>>();
    dates.sort_unstable();
    dates.dedup();

    for date in dates {
        let cells = maturities
            .iter()
            .map(|maturity| {
                series
                    .get(maturity.index_ticker())
                    .and_then(|closes| closes.get(date))
                    .copied()
            })
            .collect();
        frame.push_row(date.clone(), cells);
    }
    frame
}

fn quote_from_chart(symbol: Symbol, result: &ChartResult) -> Result<RealtimeQuote, SourceError> {
    let meta = &result.meta;
    let last_of = |values: &[Option<f64>]| values.iter().rev().find_map(|value| *value);
    let quote = result.indicators.quote.first();

    let closes = quote
        .map(|quote| quote.close.iter().filter_map(|close| *close).collect::<Vec<_>>())
        .unwrap_or_default();

    let price = meta
        .regular_market_price
        .or_else(|| closes.last().copied())
        .ok_or_else(|| SourceError::not_found(format!("yahoo has no price for {symbol}")))?;

    // chartPreviousClose is the close before the whole window, so it is only
    // the prior session when the window holds a single bar.
    let previous_close = meta.previous_close.or_else(|| match closes.as_slice() {
        [.., prior, _] => Some(*prior),
        _ => meta.chart_previous_close,
    });

    Ok(RealtimeQuote {
        price,
        previous_close,
        open: quote.and_then(|quote| last_of(&quote.open)),
        day_high: meta.regular_market_day_high,
        day_low: meta.regular_market_day_low,
        volume: meta
            .regular_market_volume
            .filter(|volume| volume.is_finite() && *volume >= 0.0)
            .map(|volume| volume as u64),
        currency: meta.currency.clone(),
        market_cap: None,
        as_of: meta.regular_market_time,
        symbol,
    })
}

fn info_from_summary(symbol: Symbol, summary: SummaryResult) -> TickerInfo {
    let price = summary.price.unwrap_or_default();
    let profile = summary.asset_profile.unwrap_or_default();
    let detail = summary.summary_detail.unwrap_or_default();
    TickerInfo {
        name: price.long_name.or(price.short_name),
        sector: profile.sector,
        industry: profile.industry,
        market_cap: raw(price.market_cap.as_ref()).or_else(|| raw(detail.market_cap.as_ref())),
        currency: price.currency.or(detail.currency),
        exchange: price.exchange_name,
        quote_type: price.quote_type,
        country: profile.country,
        website: profile.website,
        employees: profile.full_time_employees,
        symbol,
    }
}

fn chain_from_document(
    req: OptionChainRequest,
    document: OptionResult,
) -> Result<OptionChain, SourceError> {
    let listing = document.options.into_iter().next();
    let expiration = req
        .expiration()
        .or_else(|| {
            listing
                .as_ref()
                .and_then(|listing| TradingDate::from_unix(listing.expiration_date))
        })
        .or_else(|| {
            document
                .expiration_dates
                .iter()
                .filter_map(|seconds| TradingDate::from_unix(*seconds))
                .min()
        })
        .ok_or_else(|| {
            SourceError::not_found(format!("yahoo lists no expirations for {}", req.symbol()))
        })?;

    let (calls, puts) = match listing {
        Some(listing) => (contracts_frame(&listing.calls), contracts_frame(&listing.puts)),
        None => (
            Frame::new(OPTION_CHAIN_COLUMNS),
            Frame::new(OPTION_CHAIN_COLUMNS),
        ),
    };

    Ok(OptionChain {
        symbol: req.symbol().clone(),
        expiration,
        calls,
        puts,
    })
}

fn contracts_frame(contracts: &[OptionContract]) -> Frame {
    let mut frame = Frame::new(OPTION_CHAIN_COLUMNS);
    for contract in contracts {
        frame.push_row(
            contract.contract_symbol.clone(),
            vec![
                contract.strike,
                contract.last_price,
                contract.bid,
                contract.ask,
                contract.change,
                contract.percent_change,
                contract.volume,
                contract.open_interest,
                contract.implied_volatility,
                contract.in_the_money.map(|itm| if itm { 1.0 } else { 0.0 }),
            ],
        );
    }
    frame
}

#[derive(Debug, Clone, Deserialize)]
struct YahooApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

impl YahooApiError {
    fn into_source_error(self, subject: &str) -> SourceError {
        let message = format!("yahoo error for {subject}: {} ({})", self.description, self.code);
        if self.code.eq_ignore_ascii_case("not found") {
            SourceError::not_found(message)
        } else if self.code.eq_ignore_ascii_case("unauthorized") {
            SourceError::unavailable(message)
        } else {
            SourceError::invalid_request(message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorHolder {
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    chart: Option<ErrorHolder>,
    option_chain: Option<ErrorHolder>,
    quote_summary: Option<ErrorHolder>,
    finance: Option<ErrorHolder>,
}

impl ErrorEnvelope {
    fn into_error(self) -> Option<YahooApiError> {
        [self.chart, self.option_chain, self.quote_summary, self.finance]
            .into_iter()
            .flatten()
            .find_map(|holder| holder.error)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsEnvelope {
    option_chain: OptionsBody,
}

#[derive(Debug, Deserialize)]
struct OptionsBody {
    result: Option<Vec<OptionResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionListing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionListing {
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<OptionContract>,
    #[serde(default)]
    puts: Vec<OptionContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionContract {
    contract_symbol: String,
    strike: Option<f64>,
    last_price: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    change: Option<f64>,
    percent_change: Option<f64>,
    volume: Option<f64>,
    open_interest: Option<f64>,
    implied_volatility: Option<f64>,
    in_the_money: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    price: Option<SummaryPrice>,
    asset_profile: Option<AssetProfile>,
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryPrice {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    quote_type: Option<String>,
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    country: Option<String>,
    website: Option<String>,
    full_time_employees: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDetail {
    currency: Option<String>,
    market_cap: Option<RawNumber>,
}

/// quoteSummary numbers arrive as `{"raw": 1.0, "fmt": "1.00"}`; `{}` or
/// `null` when Yahoo has no value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNumber {
    raw: Option<f64>,
}

fn raw(number: Option<&RawNumber>) -> Option<f64> {
    number.and_then(|number| number.raw).filter(|value| value.is_finite())
}
