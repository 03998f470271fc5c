use std::time::Duration;

use crate::domain::{Frame, OptionChain, OptionSide, Symbol, TradingDate};
use crate::error::IngestError;
use crate::pipeline::{CacheMode, FetchPipeline, Fetched};
use crate::request::{FetchRequest, OptionChainRequest};

/// Option chains and expiration calendars.
#[derive(Clone)]
pub struct OptionsFetcher {
    pipeline: FetchPipeline,
    ttl: Duration,
}

impl OptionsFetcher {
    /// `ttl` is normally shorter than the equity TTL; chains go stale fast.
    pub fn new(pipeline: FetchPipeline, ttl: Duration) -> Self {
        Self { pipeline, ttl }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Chain for `expiration` (`YYYY-MM-DD`), or the nearest listed one.
    pub async fn fetch_option_chain(
        &self,
        symbol: &str,
        expiration: Option<&str>,
        use_cache: bool,
    ) -> Result<Fetched<OptionChain>, IngestError> {
        let expiration = expiration.map(TradingDate::parse).transpose()?;
        let request = OptionChainRequest::new(Symbol::parse(symbol)?, expiration);
        self.fetch_chain(request, CacheMode::from_use_cache(use_cache))
            .await
    }

    pub async fn fetch_chain(
        &self,
        request: OptionChainRequest,
        mode: CacheMode,
    ) -> Result<Fetched<OptionChain>, IngestError> {
        let fetch = FetchRequest::OptionChain(request.clone());
        self.pipeline
            .run(&fetch, mode, self.ttl, move |source| {
                source.option_chain(request.clone())
            })
            .await
    }

    /// Only the calls or only the puts of a chain.
    pub async fn fetch_side(
        &self,
        symbol: &str,
        expiration: Option<&str>,
        side: OptionSide,
        use_cache: bool,
    ) -> Result<Fetched<Frame>, IngestError> {
        let chain = self
            .fetch_option_chain(symbol, expiration, use_cache)
            .await?;
        Ok(chain.map(|chain| chain.into_side(side)))
    }

    /// Listed expirations, ascending. Cached under the options TTL.
    pub async fn available_expirations(
        &self,
        symbol: &str,
    ) -> Result<Fetched<Vec<TradingDate>>, IngestError> {
        let symbol = Symbol::parse(symbol)?;
        let request = FetchRequest::Expirations(symbol.clone());
        self.pipeline
            .run(&request, CacheMode::Use, self.ttl, move |source| {
                source.option_expirations(symbol.clone())
            })
            .await
    }
}
