use error_stack::{Report, bail};

use crate::error::AnalysisError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, align_series, close_prices, insufficient};
use crate::model::PriceBar;

/// One row of MACD output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<AnalysisError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "macd periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(AnalysisError::InvalidParameter {
                name: "macd fast period must be < slow period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    /// MACD line, signal line and histogram for every row where all three
    /// are defined, trimmed to that region.
    pub fn calculate_full(&self, bars: &[PriceBar]) -> Result<Vec<MacdPoint>, Report<AnalysisError>> {
        let prices = close_prices(bars);
        if prices.len() < self.required_bars() {
            return Err(insufficient(self.name(), self.required_bars(), prices.len()));
        }

        let fast_ema = Ema::new(self.fast_period)?.calculate_prices(&prices)?;
        let slow_ema = Ema::new(self.slow_period)?.calculate_prices(&prices)?;

        // slow_ema is shorter by (slow_period - fast_period) elements
        let offset = self.slow_period - self.fast_period;
        let macd_line: Vec<f64> = fast_ema[offset..]
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = Ema::new(self.signal_period)?.calculate_prices(&macd_line)?;
        let signal_offset = self.signal_period - 1;

        Ok(macd_line[signal_offset..]
            .iter()
            .zip(signal_line.iter())
            .map(|(&macd, &signal)| MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect())
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn required_bars(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    /// Returns MACD line values only.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        let line = self
            .calculate_full(bars)?
            .into_iter()
            .map(|p| p.macd)
            .collect();
        Ok(align_series(bars.len(), line))
    }
}
