use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, Month, OffsetDateTime, Time};

use crate::ValidationError;

/// Calendar date used in requests and cache keys, always rendered `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingDate(Date);

impl TradingDate {
    /// Accepts `YYYY-MM-DD` or an RFC3339 timestamp (its UTC date is kept).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        parse_calendar_date(trimmed)
            .or_else(|| {
                OffsetDateTime::parse(trimmed, &Rfc3339)
                    .ok()
                    .map(|value| value.to_offset(time::UtcOffset::UTC).date())
            })
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidDate {
                value: trimmed.to_string(),
            })
    }

    pub fn today() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    pub const fn date(self) -> Date {
        self.0
    }

    /// Shift by whole days, saturating at the calendar bounds.
    #[must_use]
    pub fn offset_days(self, days: i64) -> Self {
        Self(
            self.0
                .checked_add(time::Duration::days(days))
                .unwrap_or(self.0),
        )
    }

    /// Midnight UTC as unix seconds.
    pub fn unix_start(self) -> i64 {
        self.0.with_time(Time::MIDNIGHT).assume_utc().unix_timestamp()
    }

    /// UTC date of a unix timestamp.
    pub fn from_unix(seconds: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .ok()
            .map(|value| Self(value.date()))
    }
}

fn parse_calendar_date(value: &str) -> Option<Date> {
    let mut parts = value.splitn(3, '-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }

    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    Date::from_calendar_date(year.parse().ok()?, month, day.parse().ok()?).ok()
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for TradingDate {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl From<Date> for TradingDate {
    fn from(value: Date) -> Self {
        Self(value)
    }
}

impl From<OffsetDateTime> for TradingDate {
    fn from(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC).date())
    }
}

impl TryFrom<String> for TradingDate {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TradingDate> for String {
    fn from(value: TradingDate) -> Self {
        value.to_string()
    }
}

/// Anything a caller may pass where a date is expected.
pub trait IntoTradingDate {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError>;
}

impl IntoTradingDate for TradingDate {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        Ok(self)
    }
}

impl IntoTradingDate for Date {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        Ok(TradingDate::from(self))
    }
}

impl IntoTradingDate for OffsetDateTime {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        Ok(TradingDate::from(self))
    }
}

impl IntoTradingDate for &str {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        TradingDate::parse(self)
    }
}

impl IntoTradingDate for String {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        TradingDate::parse(&self)
    }
}

impl IntoTradingDate for &String {
    fn into_trading_date(self) -> Result<TradingDate, ValidationError> {
        TradingDate::parse(self)
    }
}

/// Inclusive start, exclusive end; `end` is strictly after `start` and
/// `start` is not in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: TradingDate,
    end: TradingDate,
}

impl DateRange {
    pub fn new(start: TradingDate, end: TradingDate) -> Result<Self, ValidationError> {
        Self::new_as_of(start, end, TradingDate::today())
    }

    /// Same checks as [`DateRange::new`] against an explicit "today".
    pub fn new_as_of(
        start: TradingDate,
        end: TradingDate,
        today: TradingDate,
    ) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        if start > today {
            return Err(ValidationError::StartInFuture {
                start: start.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(
        start: impl IntoTradingDate,
        end: impl IntoTradingDate,
    ) -> Result<Self, ValidationError> {
        Self::new(start.into_trading_date()?, end.into_trading_date()?)
    }

    /// The `days` days ending today.
    pub fn trailing_days(days: i64) -> Result<Self, ValidationError> {
        let today = TradingDate::today();
        Self::new(today.offset_days(-days), today)
    }

    pub const fn start(&self) -> TradingDate {
        self.start
    }

    pub const fn end(&self) -> TradingDate {
        self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).expect("valid date")
    }

    #[test]
    fn string_timestamp_and_date_inputs_normalize_identically() {
        let from_str = TradingDate::parse("2023-01-01").expect("plain");
        let from_timestamp = TradingDate::parse("2023-01-01T15:30:00Z").expect("rfc3339");
        let from_date = TradingDate::from(date(2023, Month::January, 1));

        assert_eq!(from_str, from_date);
        assert_eq!(from_timestamp, from_date);
        assert_eq!(from_date.to_string(), "2023-01-01");
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in ["2023-1-01", "2023-02-30", "01/02/2023", ""] {
            assert!(
                matches!(TradingDate::parse(raw), Err(ValidationError::InvalidDate { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn range_requires_end_after_start_and_start_not_in_future() {
        let today = TradingDate::from(date(2024, Month::March, 1));
        let start = TradingDate::from(date(2024, Month::January, 2));

        assert!(DateRange::new_as_of(start, start, today).is_err());
        assert!(matches!(
            DateRange::new_as_of(today.offset_days(1), today.offset_days(5), today),
            Err(ValidationError::StartInFuture { .. })
        ));
        let range = DateRange::new_as_of(start, today, today).expect("valid range");
        assert_eq!(range.to_string(), "2024-01-02..2024-03-01");
    }

    #[test]
    fn unix_start_is_midnight_utc() {
        let day = TradingDate::from(date(2024, Month::January, 2));
        assert_eq!(day.unix_start(), 1_704_153_600);
        assert_eq!(TradingDate::from_unix(1_704_200_000), Some(day));
    }
}
