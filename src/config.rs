use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::engine::IndicatorConfig;
use crate::error::ConfigError;
use crate::model::Interval;
use crate::pipeline::AnalysisConfig;
use crate::scoring::{ScoringConfig, TrendBasis};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_interval() -> String {
    "1d".into()
}

fn default_min_rows() -> usize {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Upper bound on market data requests per second, shared by all tickers.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Emit indicator rows that precede the warm-up of every indicator.
    #[serde(default = "default_true")]
    pub keep_warmup_rows: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            requests_per_second: default_requests_per_second(),
            keep_warmup_rows: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Inclusive, `"YYYY-MM-DD"`.
    pub start: Option<NaiveDate>,
    /// Exclusive, `"YYYY-MM-DD"`.
    pub end: Option<NaiveDate>,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_true")]
    pub auto_adjust: bool,
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    /// Read prices from this yfinance CSV export instead of the network.
    pub csv: Option<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            start: None,
            end: None,
            interval: default_interval(),
            auto_adjust: true,
            min_rows: default_min_rows(),
            csv: None,
        }
    }
}

impl AppConfig {
    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            min_rows: self.query.min_rows,
            keep_warmup_rows: self.general.keep_warmup_rows,
            indicators: self.indicators.clone(),
            scoring: self.scoring.clone(),
        }
    }

    /// Validated interval; falls back to daily only if `validate` was skipped.
    pub fn interval(&self) -> Interval {
        Interval::from_str(&self.query.interval).unwrap_or(Interval::Day1)
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_query(config)?;
    validate_indicator_windows(&config.indicators)?;
    validate_rule_references(config)?;
    validate_thresholds(&config.scoring)?;
    validate_labels(&config.scoring)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !["text", "json"].contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" must be \"text\" or \"json\"",
            config.general.log_format
        )));
    }
    if config.general.requests_per_second == 0 {
        return Err(invalid("general.requests_per_second must be > 0".into()));
    }
    Ok(())
}

fn validate_query(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let query = &config.query;
    if Interval::from_str(&query.interval).is_none() {
        return Err(invalid(format!(
            "query.interval: unknown interval \"{}\"",
            query.interval
        )));
    }
    if let (Some(start), Some(end)) = (query.start, query.end)
        && start >= end
    {
        return Err(invalid(format!(
            "query.start ({start}) must be before query.end ({end})"
        )));
    }
    if query.min_rows == 0 {
        return Err(invalid("query.min_rows must be > 0".into()));
    }
    let mut seen = HashSet::new();
    for ticker in &query.tickers {
        if ticker.trim().is_empty() {
            return Err(invalid("query.tickers: empty ticker".into()));
        }
        if !seen.insert(ticker.to_ascii_uppercase()) {
            return Err(invalid(format!("query.tickers: duplicate ticker \"{ticker}\"")));
        }
    }
    Ok(())
}

fn validate_indicator_windows(indicators: &IndicatorConfig) -> Result<(), Report<ConfigError>> {
    let mut periods: Vec<(&str, usize)> = Vec::new();
    if indicators.sma.enabled {
        periods.extend([("sma.short", indicators.sma.short), ("sma.long", indicators.sma.long)]);
        if indicators.sma.short >= indicators.sma.long {
            return Err(invalid("indicators.sma.short must be < indicators.sma.long".into()));
        }
    }
    if indicators.ema.enabled {
        periods.extend([("ema.short", indicators.ema.short), ("ema.long", indicators.ema.long)]);
        if indicators.ema.short >= indicators.ema.long {
            return Err(invalid("indicators.ema.short must be < indicators.ema.long".into()));
        }
    }
    if indicators.bollinger.enabled {
        periods.push(("bollinger.period", indicators.bollinger.period));
        let std_dev = indicators.bollinger.std_dev;
        if !(std_dev.is_finite() && std_dev > 0.0) {
            return Err(invalid("indicators.bollinger.std_dev must be > 0".into()));
        }
    }
    if indicators.macd.enabled {
        periods.extend([
            ("macd.fast", indicators.macd.fast),
            ("macd.slow", indicators.macd.slow),
            ("macd.signal", indicators.macd.signal),
        ]);
        if indicators.macd.fast >= indicators.macd.slow {
            return Err(invalid("indicators.macd.fast must be < indicators.macd.slow".into()));
        }
    }
    if indicators.stochastic.enabled {
        periods.extend([
            ("stochastic.lookback", indicators.stochastic.lookback),
            ("stochastic.smoothing", indicators.stochastic.smoothing),
        ]);
    }
    if indicators.rsi.enabled {
        periods.push(("rsi.period", indicators.rsi.period));
    }

    match periods.into_iter().find(|(_, period)| *period == 0) {
        Some((name, _)) => Err(invalid(format!("indicators.{name} must be > 0"))),
        None => Ok(()),
    }
}

/// Every enabled scoring rule must read indicators that are computed.
fn validate_rule_references(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let scoring = &config.scoring;
    let indicators = &config.indicators;

    let mut references: Vec<(&str, bool, &str)> = Vec::new();
    if scoring.trend.enabled {
        match scoring.trend.basis {
            TrendBasis::Ema => references.push(("trend", indicators.ema.enabled, "ema")),
            TrendBasis::Sma => references.push(("trend", indicators.sma.enabled, "sma")),
        }
    }
    if scoring.macd.enabled {
        references.push(("macd", indicators.macd.enabled, "macd"));
    }
    if scoring.stochastic.enabled {
        references.push(("stochastic", indicators.stochastic.enabled, "stochastic"));
    }
    if scoring.rsi.enabled {
        references.push(("rsi", indicators.rsi.enabled, "rsi"));
    }
    if scoring.bollinger.enabled {
        references.push(("bollinger", indicators.bollinger.enabled, "bollinger"));
    }

    match references.into_iter().find(|(_, computed, _)| !computed) {
        Some((rule, _, indicator)) => Err(invalid(format!(
            "scoring.{rule} is enabled but indicators.{indicator} is disabled"
        ))),
        None => Ok(()),
    }
}

fn validate_thresholds(scoring: &ScoringConfig) -> Result<(), Report<ConfigError>> {
    let rsi = &scoring.rsi;
    if rsi.enabled && !(0.0..=100.0).contains(&rsi.oversold) {
        return Err(invalid("scoring.rsi.oversold must be within 0..=100".into()));
    }
    if rsi.enabled && !(0.0..=100.0).contains(&rsi.overbought) {
        return Err(invalid("scoring.rsi.overbought must be within 0..=100".into()));
    }
    if rsi.enabled && rsi.oversold >= rsi.overbought {
        return Err(invalid(
            "scoring.rsi.oversold must be < scoring.rsi.overbought".into(),
        ));
    }

    let fundamentals = &scoring.fundamentals;
    if fundamentals.enabled {
        if fundamentals.cheap_pe >= fundamentals.expensive_pe {
            return Err(invalid(
                "scoring.fundamentals.cheap_pe must be < expensive_pe".into(),
            ));
        }
        if !(fundamentals.near_high_ratio > 0.0 && fundamentals.near_high_ratio <= 1.0) {
            return Err(invalid(
                "scoring.fundamentals.near_high_ratio must be within (0, 1]".into(),
            ));
        }
    }
    Ok(())
}

/// Bands must be ordered by strictly descending `min` and end with a
/// catch-all band that has no `min`.
fn validate_labels(scoring: &ScoringConfig) -> Result<(), Report<ConfigError>> {
    let labels = &scoring.labels;
    let Some((last, bounded)) = labels.split_last() else {
        return Err(invalid("scoring.labels must not be empty".into()));
    };
    if last.min.is_some() {
        return Err(invalid(format!(
            "scoring.labels: last band \"{}\" must omit min",
            last.label
        )));
    }

    let mut previous: Option<i32> = None;
    for band in bounded {
        let Some(min) = band.min else {
            return Err(invalid(format!(
                "scoring.labels: only the last band may omit min (\"{}\")",
                band.label
            )));
        };
        if previous.is_some_and(|p| min >= p) {
            return Err(invalid(format!(
                "scoring.labels: min values must descend (\"{}\")",
                band.label
            )));
        }
        previous = Some(min);
    }
    Ok(())
}
