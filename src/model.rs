use std::fmt;

use chrono::{DateTime, Utc};
use error_stack::{Report, bail};
use serde::Serialize;

use crate::engine::IndicatorConfig;
use crate::error::AnalysisError;

/// Relative slack for the high/low envelope check. Adjusted prices are
/// products of two floats and can land a few ulps outside the raw range.
const ENVELOPE_TOLERANCE: f64 = 1e-6;

/// Bar sampling interval supported by the application.
///
/// String representations match the config file format (e.g. `"1d"`, `"1wk"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Interval {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Day1,
    Week1,
    Month1,
}

impl Interval {
    /// Parse a config-format string into an `Interval`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "1h" => Some(Self::Hour1),
            "1d" => Some(Self::Day1),
            "1wk" => Some(Self::Week1),
            "1mo" => Some(Self::Month1),
            _ => None,
        }
    }

    /// Return the config-format string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
        }
    }

    /// Return the Yahoo chart API `interval` query value.
    pub fn yahoo_interval(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hour1 => "60m",
            Self::Day1 => "1d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trading session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Chronologically ordered bars with unique timestamps.
///
/// Construction validates the invariants, so every `PriceSeries` in the
/// program is non-empty, strictly increasing and has sane prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, Report<AnalysisError>> {
        if bars.is_empty() {
            bail!(AnalysisError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        for bar in &bars {
            check_bar(bar)?;
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            bail!(AnalysisError::MalformedInput {
                reason: format!(
                    "timestamps not strictly increasing: {} followed by {}",
                    pair[0].timestamp, pair[1].timestamp
                ),
            });
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }
}

fn check_bar(bar: &PriceBar) -> Result<(), Report<AnalysisError>> {
    let prices = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ];
    for (name, value) in prices {
        if !value.is_finite() || value <= 0.0 {
            bail!(AnalysisError::MalformedInput {
                reason: format!("{name} at {} is not a positive price: {value}", bar.timestamp),
            });
        }
    }

    let slack = bar.high * ENVELOPE_TOLERANCE;
    let inside = |v: f64| v >= bar.low - slack && v <= bar.high + slack;
    if bar.low > bar.high + slack || !inside(bar.open) || !inside(bar.close) {
        bail!(AnalysisError::MalformedInput {
            reason: format!(
                "bar at {} violates low <= open,close <= high (o={} h={} l={} c={})",
                bar.timestamp, bar.open, bar.high, bar.low, bar.close
            ),
        });
    }
    Ok(())
}

/// Column label as delivered by a data supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Single(String),
    /// Two-level label pairing the field name with a ticker symbol.
    Compound { field: String, ticker: String },
}

impl ColumnLabel {
    pub fn field(&self) -> &str {
        match self {
            Self::Single(field) => field,
            Self::Compound { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

/// Untrusted tabular price data straight from a supplier.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub ticker: String,
    pub labels: Vec<ColumnLabel>,
    pub rows: Vec<RawRow>,
}

/// A price bar with every derived indicator value for that row.
///
/// Fields are `None` before the indicator's warm-up and whenever the
/// indicator is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: PriceBar,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_mid: Option<f64>,
    pub bb_upper: Option<f64>,
    pub macd: Option<f64>,
    pub macd_hist: Option<f64>,
    pub macd_signal: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub rsi: Option<f64>,
}

impl IndicatorRow {
    pub fn bare(bar: PriceBar) -> Self {
        Self {
            bar,
            sma_short: None,
            sma_long: None,
            ema_short: None,
            ema_long: None,
            bb_lower: None,
            bb_mid: None,
            bb_upper: None,
            macd: None,
            macd_hist: None,
            macd_signal: None,
            stoch_k: None,
            stoch_d: None,
            rsi: None,
        }
    }

    pub fn close(&self) -> f64 {
        self.bar.close
    }

    /// True when every indicator enabled in `config` is defined on this row.
    pub fn is_complete(&self, config: &IndicatorConfig) -> bool {
        config.missing_fields(self).is_empty()
    }
}

/// Fundamentals lookup for a ticker. Any field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub sector: Option<String>,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
}
