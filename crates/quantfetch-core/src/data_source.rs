use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::domain::{Frame, OptionChain, RealtimeQuote, Symbol, TickerInfo, TradingDate};
use crate::request::{HistoryRequest, OptionChainRequest, YieldRequest};

/// Boxed future returned by [`MarketDataSource`] calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Failure categories reported by a market-data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    /// Unknown or delisted symbol, or no data in the requested window.
    NotFound,
    /// The provider refused the parameters.
    InvalidRequest,
    /// The response could not be decoded.
    Malformed,
    /// The provider throttled the call.
    RateLimited,
    /// Network failure, 5xx or an auth handshake that can be redone.
    Unavailable,
    /// An attempt exceeded its time budget.
    Timeout,
    Internal,
}

/// Structured source error consumed by the retry classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Malformed, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Contract for the upstream market-data provider.
///
/// Implementations perform exactly one upstream exchange per call; rate
/// limiting, retries, validation and caching are layered on top by the
/// fetch pipeline.
pub trait MarketDataSource: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// OHLCV bars with columns `Open`, `High`, `Low`, `Close`, `Volume`.
    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, Frame>;

    fn quote<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, RealtimeQuote>;

    /// Company name, sector, industry and market capitalization.
    fn info<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, TickerInfo>;

    /// Listed option expirations, ascending.
    fn option_expirations<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, Vec<TradingDate>>;

    fn option_chain<'a>(&'a self, req: OptionChainRequest) -> SourceFuture<'a, OptionChain>;

    /// One column per requested maturity, in percent, indexed by date.
    fn treasury_yields<'a>(&'a self, req: YieldRequest) -> SourceFuture<'a, Frame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let error = SourceError::timeout("attempt exceeded 30s");
        assert_eq!(error.to_string(), "attempt exceeded 30s (source.timeout)");
        assert_eq!(error.kind(), SourceErrorKind::Timeout);
    }
}
