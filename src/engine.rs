use error_stack::Report;
use serde::Deserialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::ma::{Ema, Sma};
use crate::indicator::macd::Macd;
use crate::indicator::rsi::Rsi;
use crate::indicator::stochastic::Stochastic;
use crate::indicator::{Indicator, insufficient};
use crate::model::{IndicatorRow, PriceSeries};

/// Which indicators to compute and with which windows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma: SmaParams,
    pub ema: EmaParams,
    pub bollinger: BollingerParams,
    pub macd: MacdParams,
    pub stochastic: StochasticParams,
    pub rsi: RsiParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmaParams {
    pub enabled: bool,
    pub short: usize,
    pub long: usize,
}

impl Default for SmaParams {
    fn default() -> Self {
        Self {
            enabled: true,
            short: 20,
            long: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmaParams {
    pub enabled: bool,
    pub short: usize,
    pub long: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self {
            enabled: true,
            short: 10,
            long: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BollingerParams {
    pub enabled: bool,
    pub period: usize,
    pub std_dev: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 20,
            std_dev: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MacdParams {
    pub enabled: bool,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            enabled: true,
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StochasticParams {
    pub enabled: bool,
    pub lookback: usize,
    pub smoothing: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback: 14,
            smoothing: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub enabled: bool,
    pub period: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 14,
        }
    }
}

impl IndicatorConfig {
    /// Names of the enabled indicator fields that are `None` on `row`.
    pub fn missing_fields(&self, row: &IndicatorRow) -> Vec<&'static str> {
        let mut checks: Vec<(&'static str, Option<f64>)> = Vec::new();
        if self.sma.enabled {
            checks.extend([("sma_short", row.sma_short), ("sma_long", row.sma_long)]);
        }
        if self.ema.enabled {
            checks.extend([("ema_short", row.ema_short), ("ema_long", row.ema_long)]);
        }
        if self.bollinger.enabled {
            checks.extend([
                ("bb_lower", row.bb_lower),
                ("bb_mid", row.bb_mid),
                ("bb_upper", row.bb_upper),
            ]);
        }
        if self.macd.enabled {
            checks.extend([
                ("macd", row.macd),
                ("macd_hist", row.macd_hist),
                ("macd_signal", row.macd_signal),
            ]);
        }
        if self.stochastic.enabled {
            checks.extend([("stoch_k", row.stoch_k), ("stoch_d", row.stoch_d)]);
        }
        if self.rsi.enabled {
            checks.push(("rsi", row.rsi));
        }
        checks
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Concrete indicator instances built from a validated `IndicatorConfig`.
struct IndicatorSet {
    sma: Option<(Sma, Sma)>,
    ema: Option<(Ema, Ema)>,
    bollinger: Option<BollingerBands>,
    macd: Option<Macd>,
    stochastic: Option<Stochastic>,
    rsi: Option<Rsi>,
}

impl IndicatorSet {
    fn build(config: &IndicatorConfig) -> Result<Self, Report<AnalysisError>> {
        let sma = if config.sma.enabled {
            Some((Sma::new(config.sma.short)?, Sma::new(config.sma.long)?))
        } else {
            None
        };
        let ema = if config.ema.enabled {
            Some((Ema::new(config.ema.short)?, Ema::new(config.ema.long)?))
        } else {
            None
        };
        let bollinger = if config.bollinger.enabled {
            Some(BollingerBands::new(
                config.bollinger.period,
                config.bollinger.std_dev,
            )?)
        } else {
            None
        };
        let macd = if config.macd.enabled {
            Some(Macd::new(
                config.macd.fast,
                config.macd.slow,
                config.macd.signal,
            )?)
        } else {
            None
        };
        let stochastic = if config.stochastic.enabled {
            Some(Stochastic::new(
                config.stochastic.lookback,
                config.stochastic.smoothing,
            )?)
        } else {
            None
        };
        let rsi = if config.rsi.enabled {
            Some(Rsi::new(config.rsi.period)?)
        } else {
            None
        };

        Ok(Self {
            sma,
            ema,
            bollinger,
            macd,
            stochastic,
            rsi,
        })
    }

    /// Enabled indicators keyed by the row field they feed.
    fn enabled(&self) -> Vec<(&'static str, &dyn Indicator)> {
        let mut out: Vec<(&'static str, &dyn Indicator)> = Vec::new();
        if let Some((short, long)) = &self.sma {
            out.push(("sma_short", short));
            out.push(("sma_long", long));
        }
        if let Some((short, long)) = &self.ema {
            out.push(("ema_short", short));
            out.push(("ema_long", long));
        }
        if let Some(bb) = &self.bollinger {
            out.push(("bollinger", bb));
        }
        if let Some(macd) = &self.macd {
            out.push(("macd", macd));
        }
        if let Some(stoch) = &self.stochastic {
            out.push(("stochastic", stoch));
        }
        if let Some(rsi) = &self.rsi {
            out.push(("rsi", rsi));
        }
        out
    }

    /// Fail with the widest enabled window that `available` rows cannot fill.
    fn check_window(&self, available: usize) -> Result<(), Report<AnalysisError>> {
        let widest = self
            .enabled()
            .into_iter()
            .filter(|(_, indicator)| indicator.required_bars() > available)
            .max_by_key(|(_, indicator)| indicator.required_bars());

        match widest {
            Some((field, indicator)) => {
                Err(insufficient(field, indicator.required_bars(), available))
            }
            None => Ok(()),
        }
    }
}

/// Smallest series length every enabled indicator can handle.
pub fn required_bars(config: &IndicatorConfig) -> Result<usize, Report<AnalysisError>> {
    let set = IndicatorSet::build(config)?;
    Ok(set
        .enabled()
        .into_iter()
        .map(|(_, indicator)| indicator.required_bars())
        .max()
        .unwrap_or(1))
}

fn fill(
    rows: &mut [IndicatorRow],
    values: Vec<Option<f64>>,
    set: impl Fn(&mut IndicatorRow, Option<f64>),
) {
    for (row, value) in rows.iter_mut().zip(values) {
        set(row, value);
    }
}

/// Compute every enabled indicator over `series`, one row per bar.
pub fn compute(
    series: &PriceSeries,
    config: &IndicatorConfig,
) -> Result<Vec<IndicatorRow>, Report<AnalysisError>> {
    let set = IndicatorSet::build(config)?;
    set.check_window(series.len())?;

    let bars = series.bars();
    let mut rows: Vec<IndicatorRow> = bars.iter().copied().map(IndicatorRow::bare).collect();

    if let Some((short, long)) = &set.sma {
        fill(&mut rows, short.calculate(bars)?, |r, v| r.sma_short = v);
        fill(&mut rows, long.calculate(bars)?, |r, v| r.sma_long = v);
    }

    if let Some((short, long)) = &set.ema {
        fill(&mut rows, short.calculate(bars)?, |r, v| r.ema_short = v);
        fill(&mut rows, long.calculate(bars)?, |r, v| r.ema_long = v);
    }

    if let Some(bb) = &set.bollinger {
        let bands = bb.calculate_bands(bars)?;
        let offset = rows.len() - bands.len();
        for (row, band) in rows[offset..].iter_mut().zip(bands) {
            row.bb_upper = Some(band.upper);
            row.bb_mid = Some(band.middle);
            row.bb_lower = Some(band.lower);
        }
    }

    if let Some(macd) = &set.macd {
        let points = macd.calculate_full(bars)?;
        let offset = rows.len() - points.len();
        for (row, point) in rows[offset..].iter_mut().zip(points) {
            row.macd = Some(point.macd);
            row.macd_signal = Some(point.signal);
            row.macd_hist = Some(point.histogram);
        }
    }

    if let Some(stoch) = &set.stochastic {
        let lines = stoch.calculate_lines(bars)?;
        fill(&mut rows, lines.k, |r, v| r.stoch_k = v);
        fill(&mut rows, lines.d, |r, v| r.stoch_d = v);
    }

    if let Some(rsi) = &set.rsi {
        fill(&mut rows, rsi.calculate(bars)?, |r, v| r.rsi = v);
    }

    debug!(
        rows = rows.len(),
        indicators = set.enabled().len(),
        "indicators computed"
    );

    Ok(rows)
}

/// Rows on which every enabled indicator is defined.
pub fn complete_rows(rows: &[IndicatorRow], config: &IndicatorConfig) -> Vec<IndicatorRow> {
    rows.iter()
        .filter(|row| row.is_complete(config))
        .copied()
        .collect()
}
