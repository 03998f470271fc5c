//! Contract tests for the Yahoo adapter
//!
//! A scripted transport stands in for Yahoo; each test checks the requests
//! the adapter sends and how it reads the documented response shapes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use quantfetch_core::{
    DateRange, HistoryRequest, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
    Interval, MarketDataSource, Maturity, OptionChainRequest, SourceErrorKind, Symbol,
    TradingDate, YahooSource, YieldRequest,
};

/// Transport answering by URL substring. The last queued answer of a route
/// repeats once the others are used up.
#[derive(Default)]
struct ScriptedHttp {
    routes: Mutex<Vec<(String, VecDeque<Result<HttpResponse, HttpError>>)>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    fn route(self, pattern: &str, answers: Vec<Result<HttpResponse, HttpError>>) -> Self {
        self.routes
            .lock()
            .expect("routes")
            .push((pattern.to_owned(), answers.into()));
        self
    }

    fn requests(&self) -> Vec<String> {
        self.log.lock().expect("log").clone()
    }

    fn count(&self, pattern: &str) -> usize {
        self.requests().iter().filter(|url| url.contains(pattern)).count()
    }
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            self.log.lock().expect("log").push(request.url.clone());
            let mut routes = self.routes.lock().expect("routes");
            let answers = routes
                .iter_mut()
                .find(|(pattern, _)| request.url.contains(pattern.as_str()))
                .map(|(_, answers)| answers);
            match answers {
                Some(answers) if answers.len() > 1 => answers.pop_front().expect("answer"),
                Some(answers) => answers
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(HttpError::new("route exhausted"))),
                None => Ok(HttpResponse::with_status(404, "")),
            }
        })
    }
}

fn ok(body: &str) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::ok_json(body))
}

fn status(code: u16, body: &str) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::with_status(code, body))
}

fn source(http: &Arc<ScriptedHttp>) -> YahooSource {
    let transport: Arc<dyn HttpClient> = http.clone();
    YahooSource::new(transport).with_auto_adjust(false)
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("symbol")
}

fn date(raw: &str) -> TradingDate {
    TradingDate::parse(raw).expect("date")
}

fn range() -> DateRange {
    DateRange::new(date("2024-01-02"), date("2024-01-05")).expect("range")
}

const AAPL_CHART: &str = r#"{"chart":{"result":[{
    "meta":{"currency":"USD","regularMarketPrice":181.91,"chartPreviousClose":184.25,
            "regularMarketDayHigh":183.09,"regularMarketDayLow":180.88,
            "regularMarketVolume":71983600,"regularMarketTime":1704402000},
    "timestamp":[1704205800,1704292200,1704378600],
    "indicators":{
        "quote":[{"open":[187.15,null,182.15],"high":[188.44,null,183.09],
                  "low":[183.89,null,180.88],"close":[185.64,null,181.91],
                  "volume":[82488700,null,71983600]}],
        "adjclose":[{"adjclose":[184.94,null,181.22]}]}
}],"error":null}}"#;

const OPTIONS_DOC: &str = r#"{"optionChain":{"result":[{
    "expirationDates":[1708041600,1705622400],
    "options":[{"expirationDate":1705622400,
        "calls":[{"contractSymbol":"AAPL240119C00180000","strike":180.0,"lastPrice":8.1,
                  "bid":8.0,"ask":8.2,"volume":120,"openInterest":3400,
                  "impliedVolatility":0.24,"inTheMoney":true}],
        "puts":[]}]
}],"error":null}}"#;

const MSFT_SUMMARY: &str = r#"{"quoteSummary":{"result":[{
    "price":{"longName":"Microsoft Corporation","shortName":"Microsoft","currency":"USD",
             "exchangeName":"NasdaqGS","quoteType":"EQUITY",
             "marketCap":{"raw":2790000000000,"fmt":"2.79T"}},
    "assetProfile":{"sector":"Technology","industry":"Software - Infrastructure",
                    "country":"United States","website":"https://www.microsoft.com",
                    "fullTimeEmployees":221000},
    "summaryDetail":{"currency":"USD","marketCap":{"raw":2790000000000,"fmt":"2.79T"}}
}],"error":null}}"#;

fn index_chart(closes: &str) -> String {
    format!(
        r#"{{"chart":{{"result":[{{"meta":{{}},"timestamp":[1704205800,1704292200],
            "indicators":{{"quote":[{{"open":{closes},"high":{closes},"low":{closes},
            "close":{closes},"volume":[0,0]}}]}}}}],"error":null}}}}"#
    )
}

// =============================================================================
// Contract: Chart Endpoint
// =============================================================================

#[tokio::test]
async fn history_request_carries_the_window_and_drops_padding_rows() {
    // Given: A chart document with a null holiday row
    let http = Arc::new(ScriptedHttp::default().route("/v8/finance/chart/AAPL", vec![ok(AAPL_CHART)]));

    // When: Daily history is requested
    let frame = source(&http)
        .history(HistoryRequest::new(symbol("AAPL"), range(), Interval::OneDay))
        .await
        .expect("history");

    // Then: The request names the window and the null row is gone
    let url = &http.requests()[0];
    assert!(url.contains("period1=1704153600"), "{url}");
    assert!(url.contains("period2=1704412800"), "{url}");
    assert!(url.contains("interval=1d"), "{url}");
    assert!(url.contains("includeAdjustedClose=true"), "{url}");
    assert_eq!(frame.columns, vec!["Open", "High", "Low", "Close", "Volume"]);
    assert_eq!(frame.index, vec!["2024-01-02", "2024-01-04"]);
    assert_eq!(frame.rows[1][3], Some(181.91));
}

#[tokio::test]
async fn auto_adjusted_history_is_scaled_by_the_adjusted_close() {
    let http = Arc::new(ScriptedHttp::default().route("/v8/finance/chart/AAPL", vec![ok(AAPL_CHART)]));
    let transport: Arc<dyn HttpClient> = http.clone();

    let frame = YahooSource::new(transport)
        .history(HistoryRequest::new(symbol("AAPL"), range(), Interval::OneDay))
        .await
        .expect("history");

    let close = frame.rows[0][3].expect("close");
    assert!((close - 184.94).abs() < 1e-9);
    assert_eq!(frame.rows[0][4], Some(82_488_700.0));
}

#[tokio::test]
async fn quote_is_read_from_chart_metadata() {
    let http = Arc::new(ScriptedHttp::default().route("/v8/finance/chart/AAPL", vec![ok(AAPL_CHART)]));

    let quote = source(&http).quote(symbol("AAPL")).await.expect("quote");

    assert!(http.requests()[0].contains("range=5d"));
    assert_eq!(quote.price, 181.91);
    // Prior session close, not chartPreviousClose from before the window
    assert_eq!(quote.previous_close, Some(185.64));
    assert_eq!(quote.open, Some(182.15));
    assert_eq!(quote.volume, Some(71_983_600));
    assert_eq!(quote.currency.as_deref(), Some("USD"));
    assert_eq!(quote.market_cap, None);
}

#[tokio::test]
async fn quote_prefers_the_reported_previous_close_and_adds_market_cap() {
    // Given: A 5-day chart whose window starts well below the prior session
    let chart = r#"{"chart":{"result":[{
        "meta":{"currency":"USD","regularMarketPrice":100.0,"chartPreviousClose":80.0,"previousClose":99.0},
        "timestamp":[1704205800,1704292200,1704378600,1704465000,1704724200],
        "indicators":{"quote":[{"close":[81.0,86.0,91.0,99.0,100.0]}]}
    }],"error":null}}"#;
    let http = Arc::new(
        ScriptedHttp::default()
            .route("/v8/finance/chart/MSFT", vec![ok(chart)])
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("crumb1")])
            .route("/v10/finance/quoteSummary/MSFT", vec![ok(MSFT_SUMMARY)]),
    );

    // When: The quote is read
    let quote = source(&http).quote(symbol("MSFT")).await.expect("quote");

    // Then: The change is measured against the prior session
    assert_eq!(quote.previous_close, Some(99.0));
    assert_eq!(quote.change(), Some(1.0));
    assert_eq!(quote.market_cap, Some(2_790_000_000_000.0));
    let summary_url = http
        .requests()
        .into_iter()
        .find(|url| url.contains("/quoteSummary/"))
        .expect("summary request");
    assert!(summary_url.contains("modules=price"), "{summary_url}");
}

#[tokio::test]
async fn chart_statuses_and_error_bodies_map_to_error_kinds() {
    let delisted = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
    let http = Arc::new(
        ScriptedHttp::default()
            .route("/chart/GONE", vec![status(404, delisted)])
            .route("/chart/SLOW", vec![status(429, "Too Many Requests")])
            .route("/chart/DOWN", vec![status(503, "<html>")])
            .route("/chart/HUSH", vec![ok(delisted)])
            .route("/chart/JUNK", vec![ok("{not json")])
            .route("/chart/LATE", vec![Err(HttpError::timeout("deadline elapsed"))]),
    );
    let yahoo = source(&http);

    let cases = [
        ("GONE", SourceErrorKind::NotFound),
        ("SLOW", SourceErrorKind::RateLimited),
        ("DOWN", SourceErrorKind::Unavailable),
        ("HUSH", SourceErrorKind::NotFound),
        ("JUNK", SourceErrorKind::Malformed),
        ("LATE", SourceErrorKind::Timeout),
    ];
    for (ticker, kind) in cases {
        let error = yahoo
            .history(HistoryRequest::new(symbol(ticker), range(), Interval::OneDay))
            .await
            .expect_err(ticker);
        assert_eq!(error.kind(), kind, "{ticker}: {error}");
    }
}

#[tokio::test]
async fn treasury_yields_join_one_index_series_per_maturity() {
    // Given: Two yield indices with overlapping dates
    let http = Arc::new(
        ScriptedHttp::default()
            .route("/chart/%5ETNX", vec![ok(&index_chart("[3.95,3.91]"))])
            .route("/chart/%5ETYX", vec![ok(&index_chart("[4.11,null]"))]),
    );

    // When: 10Y and 30Y are requested
    let frame = source(&http)
        .treasury_yields(YieldRequest::new(
            &[Maturity::ThirtyYear, Maturity::TenYear],
            range(),
        ))
        .await
        .expect("yields");

    // Then: Columns follow tenor order and missing cells stay empty
    assert_eq!(http.count("/v8/finance/chart/"), 2);
    assert_eq!(frame.columns, vec!["10Y", "30Y"]);
    assert_eq!(frame.index, vec!["2024-01-02", "2024-01-03"]);
    assert_eq!(frame.rows[0], vec![Some(3.95), Some(4.11)]);
    assert_eq!(frame.rows[1], vec![Some(3.91), None]);
}

#[tokio::test]
async fn tenors_sharing_an_index_fetch_it_once() {
    let http = Arc::new(ScriptedHttp::default().route("/chart/%5EIRX", vec![ok(&index_chart("[5.24,5.22]"))]));

    let frame = source(&http)
        .treasury_yields(YieldRequest::new(
            &[Maturity::ThreeMonth, Maturity::SixMonth],
            range(),
        ))
        .await
        .expect("yields");

    assert_eq!(http.count("/chart/%5EIRX"), 1);
    assert_eq!(frame.rows[0], vec![Some(5.24), Some(5.24)]);
}

// =============================================================================
// Contract: Quote Summary Endpoint
// =============================================================================

#[tokio::test]
async fn company_info_is_read_from_the_quote_summary_modules() {
    // Given: A profile document behind the crumb session
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("crumb1")])
            .route("/v10/finance/quoteSummary/MSFT", vec![ok(MSFT_SUMMARY)]),
    );

    // When: The profile is requested
    let info = source(&http).info(symbol("MSFT")).await.expect("info");

    // Then: The request names every module and carries the crumb
    let url = http
        .requests()
        .into_iter()
        .find(|url| url.contains("/quoteSummary/"))
        .expect("summary request");
    assert!(url.contains("modules=price%2CassetProfile%2CsummaryDetail"), "{url}");
    assert!(url.contains("crumb=crumb1"), "{url}");
    assert_eq!(info.name.as_deref(), Some("Microsoft Corporation"));
    assert_eq!(info.sector.as_deref(), Some("Technology"));
    assert_eq!(info.industry.as_deref(), Some("Software - Infrastructure"));
    assert_eq!(info.market_cap, Some(2_790_000_000_000.0));
    assert_eq!(info.currency.as_deref(), Some("USD"));
    assert_eq!(info.exchange.as_deref(), Some("NasdaqGS"));
    assert_eq!(info.employees, Some(221_000));
}

#[tokio::test]
async fn unknown_company_info_maps_to_not_found() {
    let missing = r#"{"quoteSummary":{"result":null,"error":{"code":"Not Found","description":"Quote not found for symbol: ZZZZ"}}}"#;
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("crumb1")])
            .route("/v10/finance/quoteSummary/ZZZZ", vec![status(404, missing)]),
    );

    let error = source(&http).info(symbol("ZZZZ")).await.expect_err("unknown");

    assert_eq!(error.kind(), SourceErrorKind::NotFound);
    assert!(error.message().contains("Quote not found"), "{error}");
}

// =============================================================================
// Contract: Options Endpoint and Crumb Session
// =============================================================================

#[tokio::test]
async fn option_chain_request_carries_crumb_and_expiration() {
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("abc.DEF/12")])
            .route("/v7/finance/options/AAPL", vec![ok(OPTIONS_DOC)]),
    );

    let chain = source(&http)
        .option_chain(OptionChainRequest::new(symbol("AAPL"), Some(date("2024-01-19"))))
        .await
        .expect("chain");

    let options_url = http
        .requests()
        .into_iter()
        .find(|url| url.contains("/v7/finance/options/"))
        .expect("options request");
    assert!(options_url.contains("date=1705622400"), "{options_url}");
    assert!(options_url.contains("crumb=abc.DEF%2F12"), "{options_url}");
    assert_eq!(chain.expiration, date("2024-01-19"));
    assert_eq!(chain.calls.index, vec!["AAPL240119C00180000"]);
    assert!(chain.puts.is_empty());
}

#[tokio::test]
async fn crumb_is_reused_across_option_requests() {
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("crumb1")])
            .route("/v7/finance/options/AAPL", vec![ok(OPTIONS_DOC)]),
    );
    let yahoo = source(&http);

    let expirations = yahoo
        .option_expirations(symbol("AAPL"))
        .await
        .expect("expirations");
    yahoo
        .option_chain(OptionChainRequest::new(symbol("AAPL"), None))
        .await
        .expect("chain");

    assert_eq!(expirations, vec![date("2024-01-19"), date("2024-02-16")]);
    assert_eq!(http.count("getcrumb"), 1);
    assert_eq!(http.count("fc.yahoo.com"), 1);
}

#[tokio::test]
async fn rejected_crumb_is_refreshed_and_the_request_retried_once() {
    // Given: Yahoo rejects the first crumb
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![ok("stale"), ok("fresh")])
            .route(
                "/v7/finance/options/AAPL",
                vec![status(401, r#"{"finance":{"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#), ok(OPTIONS_DOC)],
            ),
    );

    // When: A chain is requested
    let chain = source(&http)
        .option_chain(OptionChainRequest::new(symbol("AAPL"), None))
        .await
        .expect("chain after refresh");

    // Then: The handshake ran twice and the retry used the new crumb
    let options = http
        .requests()
        .into_iter()
        .filter(|url| url.contains("/v7/finance/options/"))
        .collect::<Vec<_>>();
    assert_eq!(options.len(), 2);
    assert!(options[0].contains("crumb=stale"));
    assert!(options[1].contains("crumb=fresh"));
    assert_eq!(chain.expiration, date("2024-01-19"));
}

#[tokio::test]
async fn html_crumb_page_falls_back_to_the_second_endpoint() {
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("query1.finance.yahoo.com/v1/test/getcrumb", vec![ok("<!DOCTYPE html><html></html>")])
            .route("query2.finance.yahoo.com/v1/test/getcrumb", vec![ok("backup")])
            .route("/v7/finance/options/AAPL", vec![ok(OPTIONS_DOC)]),
    );

    source(&http)
        .option_expirations(symbol("AAPL"))
        .await
        .expect("expirations");

    assert!(http
        .requests()
        .iter()
        .any(|url| url.contains("/v7/finance/options/") && url.contains("crumb=backup")));
}

#[tokio::test]
async fn throttled_crumb_request_is_reported_as_rate_limited() {
    let http = Arc::new(
        ScriptedHttp::default()
            .route("fc.yahoo.com", vec![status(404, "")])
            .route("getcrumb", vec![status(429, "Too Many Requests")]),
    );

    let error = source(&http)
        .option_expirations(symbol("AAPL"))
        .await
        .expect_err("throttled");

    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    assert_eq!(http.count("/v7/finance/options/"), 0);
}
