use std::time::Duration;

use crate::domain::{DateRange, Frame, Maturity, TradingDate};
use crate::error::IngestError;
use crate::pipeline::{CacheMode, FetchPipeline, Fetched};
use crate::request::{FetchRequest, YieldRequest};

const DEFAULT_LOOKBACK_DAYS: i64 = 365;
/// Window searched for the last observation on or before a curve date.
const CURVE_WINDOW_DAYS: i64 = 5;

/// Treasury yield series, in percent.
#[derive(Clone)]
pub struct FixedIncomeFetcher {
    pipeline: FetchPipeline,
    ttl: Duration,
}

impl FixedIncomeFetcher {
    pub fn new(pipeline: FetchPipeline, ttl: Duration) -> Self {
        Self { pipeline, ttl }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn available_maturities(&self) -> &'static [Maturity] {
        &Maturity::ALL
    }

    /// One column per maturity (default `10Y, 30Y`) indexed by date. Without
    /// bounds the trailing year up to today is fetched.
    pub async fn fetch_treasury_yields(
        &self,
        maturities: &[Maturity],
        start: Option<&str>,
        end: Option<&str>,
        use_cache: bool,
    ) -> Result<Fetched<Frame>, IngestError> {
        let end = end
            .map(TradingDate::parse)
            .transpose()?
            .unwrap_or_else(TradingDate::today);
        let start = start
            .map(TradingDate::parse)
            .transpose()?
            .unwrap_or_else(|| end.offset_days(-DEFAULT_LOOKBACK_DAYS));
        let request = YieldRequest::new(maturities, DateRange::new(start, end)?);

        self.fetch_yields(request, CacheMode::from_use_cache(use_cache))
            .await
    }

    pub async fn fetch_yields(
        &self,
        request: YieldRequest,
        mode: CacheMode,
    ) -> Result<Fetched<Frame>, IngestError> {
        let fetch = FetchRequest::Yields(request.clone());
        self.pipeline
            .run(&fetch, mode, self.ttl, move |source| {
                source.treasury_yields(request.clone())
            })
            .await
    }

    /// Yield curve on `date` (default today) across `3M 2Y 5Y 10Y 30Y`.
    ///
    /// Uses the observation dated `date` when there is one, otherwise the
    /// latest one in the preceding few days. Rows are maturities, the single
    /// column is `Yield`.
    pub async fn fetch_yield_curve(
        &self,
        date: Option<&str>,
        use_cache: bool,
    ) -> Result<Fetched<Frame>, IngestError> {
        let date = date
            .map(TradingDate::parse)
            .transpose()?
            .unwrap_or_else(TradingDate::today);
        let range = DateRange::new(date.offset_days(-CURVE_WINDOW_DAYS), date.offset_days(1))?;
        let request = YieldRequest::new(&Maturity::CURVE, range);

        let series = self
            .fetch_yields(request, CacheMode::from_use_cache(use_cache))
            .await?;
        Ok(series.map(|frame| curve_on(&frame, date)))
    }
}

fn curve_on(series: &Frame, date: TradingDate) -> Frame {
    let mut curve = Frame::new(["Yield"]);
    let label = date.to_string();
    let row = series
        .row_position(&label)
        .or_else(|| series.index.iter().rposition(|day| *day <= label))
        .and_then(|position| series.rows.get(position));
    let Some(row) = row else {
        return curve;
    };

    for (column, value) in series.columns.iter().zip(row) {
        curve.push_row(column.clone(), vec![*value]);
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> Frame {
        let mut frame = Frame::new(["3M", "10Y"]);
        frame.push_row("2024-03-07", vec![Some(5.22), Some(4.09)]);
        frame.push_row("2024-03-08", vec![Some(5.23), Some(4.07)]);
        frame
    }

    #[test]
    fn curve_uses_the_exact_date_when_present() {
        let curve = curve_on(&series(), TradingDate::parse("2024-03-07").expect("date"));
        assert_eq!(curve.index, vec!["3M", "10Y"]);
        assert_eq!(curve.rows, vec![vec![Some(5.22)], vec![Some(4.09)]]);
    }

    #[test]
    fn curve_falls_back_to_the_latest_prior_observation() {
        // A Sunday: the Friday close is the most recent one.
        let curve = curve_on(&series(), TradingDate::parse("2024-03-10").expect("date"));
        assert_eq!(curve.rows, vec![vec![Some(5.23)], vec![Some(4.07)]]);
    }

    #[test]
    fn curve_is_empty_without_observations() {
        let curve = curve_on(&Frame::new(["10Y"]), TradingDate::parse("2024-03-10").expect("date"));
        assert!(curve.is_empty());
    }
}
