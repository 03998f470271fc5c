use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Frame, Symbol, Tabular, TradingDate};
use crate::ValidationError;

/// Calls and puts for one expiration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: Symbol,
    pub expiration: TradingDate,
    pub calls: Frame,
    pub puts: Frame,
}

impl OptionChain {
    pub fn side(&self, side: OptionSide) -> &Frame {
        match side {
            OptionSide::Call => &self.calls,
            OptionSide::Put => &self.puts,
        }
    }

    pub fn into_side(self, side: OptionSide) -> Frame {
        match side {
            OptionSide::Call => self.calls,
            OptionSide::Put => self.puts,
        }
    }
}

impl Tabular for OptionChain {
    fn frames(&self) -> Vec<(&'static str, &Frame)> {
        vec![("calls", &self.calls), ("puts", &self.puts)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl Display for OptionSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionSide {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "call" | "calls" => Ok(Self::Call),
            "put" | "puts" => Ok(Self::Put),
            other => Err(ValidationError::InvalidOptionSide {
                value: other.to_owned(),
            }),
        }
    }
}

/// Latest trading snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    pub symbol: Symbol,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<u64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Unix seconds of the last regular-market trade.
    pub as_of: Option<i64>,
}

impl RealtimeQuote {
    /// Absolute move against the previous close.
    pub fn change(&self) -> Option<f64> {
        self.previous_close.map(|previous| self.price - previous)
    }

    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .filter(|previous| *previous != 0.0)
            .map(|previous| (self.price - previous) / previous * 100.0)
    }
}

/// Company profile for a ticker. Every field but the symbol may be missing;
/// indices and funds carry no sector or industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerInfo {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    /// Yahoo instrument class, e.g. `EQUITY`, `ETF`, `INDEX`.
    pub quote_type: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
}
