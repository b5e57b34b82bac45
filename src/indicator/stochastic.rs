use error_stack::{Report, bail};

use crate::error::AnalysisError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, insufficient};
use crate::model::PriceBar;

/// %K and %D lines, each aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticLines {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Slow stochastic oscillator: `%K = SMA(%K_raw, smoothing)` and
/// `%D = SMA(%K, smoothing)`.
pub struct Stochastic {
    lookback: usize,
    smoothing: usize,
}

impl Stochastic {
    pub fn new(lookback: usize, smoothing: usize) -> Result<Self, Report<AnalysisError>> {
        if lookback == 0 || smoothing == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "stochastic lookback and smoothing must be > 0".into(),
            });
        }
        Ok(Self {
            lookback,
            smoothing,
        })
    }

    /// Unsmoothed %K. Undefined before the lookback fills and wherever the
    /// window has zero width (highest high equals lowest low).
    fn raw_k(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let mut raw = vec![None; bars.len()];
        for (index, window) in bars.windows(self.lookback).enumerate() {
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range > 0.0 {
                let close = window[window.len() - 1].close;
                raw[index + self.lookback - 1] = Some(100.0 * (close - lowest) / range);
            }
        }
        raw
    }

    pub fn calculate_lines(
        &self,
        bars: &[PriceBar],
    ) -> Result<StochasticLines, Report<AnalysisError>> {
        if bars.len() < self.required_bars() {
            return Err(insufficient(self.name(), self.required_bars(), bars.len()));
        }
        let smoother = Sma::new(self.smoothing)?;
        let k = smoother.calculate_optional(&self.raw_k(bars));
        let d = smoother.calculate_optional(&k);
        Ok(StochasticLines { k, d })
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn required_bars(&self) -> usize {
        self.lookback + 2 * self.smoothing - 2
    }

    /// Returns %K values only.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        Ok(self.calculate_lines(bars)?.k)
    }
}
