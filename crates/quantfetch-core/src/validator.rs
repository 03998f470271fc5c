//! Post-fetch sanity checks, one rule set per data kind.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::domain::{Frame, Tabular};
use crate::request::DataKind;

pub const OHLCV_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];
const PRICE_COLUMNS: [&str; 4] = ["Open", "High", "Low", "Close"];
pub const OPTION_COLUMNS: [&str; 4] = ["Strike", "Last", "Volume", "OpenInterest"];
const OPTION_PRICE_COLUMNS: [&str; 3] = ["Last", "Bid", "Ask"];

/// A rule that can be violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    EmptyData,
    MissingColumns,
    NonPositivePrice,
    HighBelowLow,
    NullRow,
    NullPrice,
    NonPositiveStrike,
    NegativeOptionPrice,
    NoNumericColumns,
    NegativeYield,
    YieldAboveCeiling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: Rule,
    /// Which frame of the payload (`data`, `calls`, `puts`).
    pub frame: &'static str,
    pub message: String,
}

/// Outcome of validating one payload. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub kind: DataKind,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(kind: DataKind) -> Self {
        Self {
            kind,
            violations: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has(&self, rule: Rule) -> bool {
        self.violations.iter().any(|violation| violation.rule == rule)
    }

    fn push(&mut self, rule: Rule, frame: &'static str, message: impl Into<String>) {
        self.violations.push(Violation {
            rule,
            frame,
            message: message.into(),
        });
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "{} data passed validation", self.kind);
        }
        let messages = self
            .violations
            .iter()
            .map(|violation| format!("[{}] {}", violation.frame, violation.message))
            .collect::<Vec<_>>();
        f.write_str(&messages.join("; "))
    }
}

/// Thresholds used by the rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRules {
    /// Yields (in percent) at or above this are rejected.
    pub yield_ceiling: f64,
    /// Strict mode: any missing Open/High/Low/Close cell fails the bars,
    /// not only fully null rows.
    pub reject_null_prices: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            yield_ceiling: 100.0,
            reject_null_prices: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub const fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub const fn rules(&self) -> ValidationRules {
        self.rules
    }

    pub fn validate<P: Tabular + ?Sized>(&self, kind: DataKind, payload: &P) -> ValidationReport {
        let frames = payload.frames();
        let mut report = ValidationReport::new(kind);
        match kind {
            DataKind::Equity => {
                for (name, frame) in frames {
                    check_ohlcv(name, frame, self.rules.reject_null_prices, &mut report);
                }
            }
            DataKind::Options => {
                if frames.iter().all(|(_, frame)| frame.is_empty()) {
                    report.push(Rule::EmptyData, "chain", "option chain has no calls and no puts");
                }
                for (name, frame) in frames.into_iter().filter(|(_, frame)| !frame.is_empty()) {
                    check_option_side(name, frame, &mut report);
                }
            }
            DataKind::FixedIncome => {
                for (name, frame) in frames {
                    self.check_yields(name, frame, &mut report);
                }
            }
        }
        report
    }

    fn check_yields(&self, name: &'static str, frame: &Frame, report: &mut ValidationReport) {
        if frame.is_empty() {
            report.push(Rule::EmptyData, name, "yield data is empty");
            return;
        }
        let numeric = (0..frame.columns.len())
            .filter(|position| frame.rows.iter().any(|row| row.get(*position).copied().flatten().is_some()))
            .count();
        if numeric == 0 {
            report.push(Rule::NoNumericColumns, name, "yield data has no numeric columns");
            return;
        }

        let values = frame.rows.iter().flatten().filter_map(|cell| *cell);
        let (mut negative, mut above) = (0_usize, 0_usize);
        for value in values {
            if value < 0.0 || value.is_nan() {
                negative += 1;
            } else if value >= self.rules.yield_ceiling {
                above += 1;
            }
        }
        if negative > 0 {
            report.push(Rule::NegativeYield, name, format!("{negative} negative yield value(s)"));
        }
        if above > 0 {
            report.push(
                Rule::YieldAboveCeiling,
                name,
                format!(
                    "{above} yield value(s) at or above the {}% ceiling",
                    self.rules.yield_ceiling
                ),
            );
        }
    }
}

fn missing_columns(frame: &Frame, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|column| !frame.has_column(column))
        .map(|column| (*column).to_string())
        .collect()
}

fn check_ohlcv(
    name: &'static str,
    frame: &Frame,
    reject_null_prices: bool,
    report: &mut ValidationReport,
) {
    if frame.is_empty() {
        report.push(Rule::EmptyData, name, "no rows returned");
        return;
    }
    let missing = missing_columns(frame, &OHLCV_COLUMNS);
    if !missing.is_empty() {
        report.push(
            Rule::MissingColumns,
            name,
            format!("missing required columns: {}", missing.join(", ")),
        );
        return;
    }

    let prices = PRICE_COLUMNS
        .iter()
        .filter_map(|column| frame.column_index(column))
        .collect::<Vec<_>>();
    let high = frame.column_index("High");
    let low = frame.column_index("Low");

    let mut non_positive = Vec::new();
    let mut inverted = Vec::new();
    let mut null_rows = Vec::new();
    let mut null_prices = Vec::new();
    for (label, row) in frame.index.iter().zip(&frame.rows) {
        if row.iter().all(Option::is_none) {
            null_rows.push(label.as_str());
            continue;
        }
        let cell = |position: usize| row.get(position).copied().flatten();
        if reject_null_prices && prices.iter().any(|position| cell(*position).is_none()) {
            null_prices.push(label.as_str());
        }
        if prices
            .iter()
            .filter_map(|position| cell(*position))
            .any(|price| price <= 0.0 || price.is_nan())
        {
            non_positive.push(label.as_str());
        }
        if let (Some(high), Some(low)) = (high.and_then(cell), low.and_then(cell)) {
            if high < low {
                inverted.push(label.as_str());
            }
        }
    }

    if !non_positive.is_empty() {
        report.push(
            Rule::NonPositivePrice,
            name,
            summarize("row(s) with non-positive prices", &non_positive),
        );
    }
    if !inverted.is_empty() {
        report.push(Rule::HighBelowLow, name, summarize("row(s) with High < Low", &inverted));
    }
    if !null_rows.is_empty() {
        report.push(Rule::NullRow, name, summarize("fully null row(s)", &null_rows));
    }
    if !null_prices.is_empty() {
        report.push(
            Rule::NullPrice,
            name,
            summarize("row(s) with missing prices", &null_prices),
        );
    }
}

fn check_option_side(name: &'static str, frame: &Frame, report: &mut ValidationReport) {
    let missing = missing_columns(frame, &OPTION_COLUMNS);
    if !missing.is_empty() {
        report.push(
            Rule::MissingColumns,
            name,
            format!("missing required columns: {}", missing.join(", ")),
        );
        return;
    }

    let strikes = frame
        .column("Strike")
        .map(|cells| cells.flatten().filter(|strike| *strike <= 0.0 || strike.is_nan()).count())
        .unwrap_or(0);
    if strikes > 0 {
        report.push(Rule::NonPositiveStrike, name, format!("{strikes} non-positive strike(s)"));
    }

    let negative_prices = OPTION_PRICE_COLUMNS
        .iter()
        .filter_map(|column| frame.column(column))
        .map(|cells| cells.flatten().filter(|price| *price < 0.0).count())
        .sum::<usize>();
    if negative_prices > 0 {
        report.push(
            Rule::NegativeOptionPrice,
            name,
            format!("{negative_prices} negative option price(s)"),
        );
    }
}

fn summarize(what: &str, labels: &[&str]) -> String {
    match labels.first() {
        Some(first) => format!("{} {what} (first: {first})", labels.len()),
        None => format!("0 {what}"),
    }
}
