use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Treasury tenor. Ordered from shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Maturity {
    #[serde(rename = "3M")]
    ThreeMonth,
    #[serde(rename = "6M")]
    SixMonth,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    TwoYear,
    #[serde(rename = "5Y")]
    FiveYear,
    #[serde(rename = "10Y")]
    TenYear,
    #[serde(rename = "30Y")]
    ThirtyYear,
}

impl Maturity {
    pub const ALL: [Self; 7] = [
        Self::ThreeMonth,
        Self::SixMonth,
        Self::OneYear,
        Self::TwoYear,
        Self::FiveYear,
        Self::TenYear,
        Self::ThirtyYear,
    ];

    pub const DEFAULT_SET: [Self; 2] = [Self::TenYear, Self::ThirtyYear];

    /// Tenors sampled for a single-date yield curve.
    pub const CURVE: [Self; 5] = [
        Self::ThreeMonth,
        Self::TwoYear,
        Self::FiveYear,
        Self::TenYear,
        Self::ThirtyYear,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThreeMonth => "3M",
            Self::SixMonth => "6M",
            Self::OneYear => "1Y",
            Self::TwoYear => "2Y",
            Self::FiveYear => "5Y",
            Self::TenYear => "10Y",
            Self::ThirtyYear => "30Y",
        }
    }

    /// CBOE yield index quoted by Yahoo for this tenor. Only four indices
    /// exist, so 6M and 1Y read the 13-week bill and 2Y reads the 5-year note.
    pub const fn index_ticker(self) -> &'static str {
        match self {
            Self::ThreeMonth | Self::SixMonth | Self::OneYear => "^IRX",
            Self::TwoYear | Self::FiveYear => "^FVX",
            Self::TenYear => "^TNX",
            Self::ThirtyYear => "^TYX",
        }
    }

    /// Sort and de-duplicate, falling back to the default pair when empty.
    pub fn normalize_set(maturities: &[Self]) -> Vec<Self> {
        if maturities.is_empty() {
            return Self::DEFAULT_SET.to_vec();
        }
        let mut set = maturities.to_vec();
        set.sort_unstable();
        set.dedup();
        set
    }
}

impl Display for Maturity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Maturity {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|maturity| maturity.as_str() == normalized)
            .ok_or(ValidationError::InvalidMaturity { value: normalized })
    }
}
