//! Fetch requests and the cache keys derived from them.
//!
//! Every input is normalized when a request is built (symbols upper-cased,
//! dates rendered `YYYY-MM-DD`, maturities sorted and de-duplicated). Two
//! requests for the same data therefore always render the same key.

use std::fmt::{Display, Formatter};

use quantfetch_cache::CacheTable;
use serde::Serialize;

use crate::domain::{DateRange, Interval, Maturity, Symbol, TradingDate};

/// Data family, one cache table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Equity,
    Options,
    FixedIncome,
}

impl DataKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Options => "options",
            Self::FixedIncome => "fixed_income",
        }
    }

    pub const fn table(self) -> CacheTable {
        match self {
            Self::Equity => CacheTable::Equity,
            Self::Options => CacheTable::Options,
            Self::FixedIncome => CacheTable::FixedIncome,
        }
    }
}

impl Display for DataKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic storage key of a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Historical bars for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryRequest {
    symbol: Symbol,
    range: DateRange,
    interval: Interval,
}

impl HistoryRequest {
    pub fn new(symbol: Symbol, range: DateRange, interval: Interval) -> Self {
        Self {
            symbol,
            range,
            interval,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub const fn range(&self) -> DateRange {
        self.range
    }

    pub const fn interval(&self) -> Interval {
        self.interval
    }
}

/// Option chain for one expiration; `None` selects the nearest listed one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionChainRequest {
    symbol: Symbol,
    expiration: Option<TradingDate>,
}

impl OptionChainRequest {
    pub fn new(symbol: Symbol, expiration: Option<TradingDate>) -> Self {
        Self { symbol, expiration }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub const fn expiration(&self) -> Option<TradingDate> {
        self.expiration
    }
}

/// Treasury yield series for a set of tenors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct YieldRequest {
    maturities: Vec<Maturity>,
    range: DateRange,
}

impl YieldRequest {
    pub fn new(maturities: &[Maturity], range: DateRange) -> Self {
        Self {
            maturities: Maturity::normalize_set(maturities),
            range,
        }
    }

    pub fn maturities(&self) -> &[Maturity] {
        &self.maturities
    }

    pub const fn range(&self) -> DateRange {
        self.range
    }

    fn maturity_list(&self) -> String {
        self.maturities
            .iter()
            .map(|maturity| maturity.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// An immutable description of one upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    History(HistoryRequest),
    Quote(Symbol),
    Info(Symbol),
    OptionChain(OptionChainRequest),
    Expirations(Symbol),
    Yields(YieldRequest),
}

impl FetchRequest {
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::History(_) | Self::Quote(_) | Self::Info(_) => DataKind::Equity,
            Self::OptionChain(_) | Self::Expirations(_) => DataKind::Options,
            Self::Yields(_) => DataKind::FixedIncome,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        let key = match self {
            Self::History(request) => format!(
                "equity:{}:{}:{}:{}",
                request.symbol,
                request.range.start(),
                request.range.end(),
                request.interval
            ),
            Self::Quote(symbol) => format!("quote:{symbol}"),
            Self::Info(symbol) => format!("info:{symbol}"),
            Self::OptionChain(request) => match request.expiration {
                Some(expiration) => format!("options:{}:{expiration}", request.symbol),
                None => format!("options:{}:nearest", request.symbol),
            },
            Self::Expirations(symbol) => format!("expirations:{symbol}"),
            Self::Yields(request) => format!(
                "fixed_income:{}:{}:{}",
                request.maturity_list(),
                request.range.start(),
                request.range.end()
            ),
        };
        CacheKey(key)
    }

    /// Symbol or tenor list stored alongside cache entries.
    pub fn label(&self) -> String {
        match self {
            Self::History(request) => request.symbol.to_string(),
            Self::OptionChain(request) => request.symbol.to_string(),
            Self::Quote(symbol) | Self::Info(symbol) | Self::Expirations(symbol) => {
                symbol.to_string()
            }
            Self::Yields(request) => request.maturity_list(),
        }
    }
}

impl Display for FetchRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::History(request) => write!(
                f,
                "equity history {} {} interval={}",
                request.symbol, request.range, request.interval
            ),
            Self::Quote(symbol) => write!(f, "equity quote {symbol}"),
            Self::Info(symbol) => write!(f, "equity info {symbol}"),
            Self::OptionChain(request) => match request.expiration {
                Some(expiration) => {
                    write!(f, "option chain {} expiration={expiration}", request.symbol)
                }
                None => write!(f, "option chain {} expiration=nearest", request.symbol),
            },
            Self::Expirations(symbol) => write!(f, "option expirations {symbol}"),
            Self::Yields(request) => write!(
                f,
                "treasury yields {} {}",
                request.maturity_list(),
                request.range
            ),
        }
    }
}

impl From<HistoryRequest> for FetchRequest {
    fn from(value: HistoryRequest) -> Self {
        Self::History(value)
    }
}

impl From<OptionChainRequest> for FetchRequest {
    fn from(value: OptionChainRequest) -> Self {
        Self::OptionChain(value)
    }
}

impl From<YieldRequest> for FetchRequest {
    fn from(value: YieldRequest) -> Self {
        Self::Yields(value)
    }
}
