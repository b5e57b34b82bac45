use error_stack::{Report, bail};

use crate::error::AnalysisError;
use crate::indicator::{Indicator, align_series, close_prices, insufficient};
use crate::model::PriceBar;

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<AnalysisError>> {
        if period == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "rsi period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    /// RSI over a price slice, trimmed to the defined region (first value at
    /// index `period`).
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<AnalysisError>> {
        if prices.len() < self.required_bars() {
            return Err(insufficient(self.name(), self.required_bars(), prices.len()));
        }

        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

        // Seed with the simple average of the first `period` gains/losses
        let mut avg_gain: f64 =
            deltas[..self.period].iter().map(|&d| d.max(0.0)).sum::<f64>() / self.period as f64;
        let mut avg_loss: f64 =
            deltas[..self.period].iter().map(|&d| (-d).max(0.0)).sum::<f64>() / self.period as f64;

        let mut results = vec![rsi_value(avg_gain, avg_loss)];

        for &delta in &deltas[self.period..] {
            let gain = delta.max(0.0);
            let loss = (-delta).max(0.0);
            avg_gain = (avg_gain * (self.period - 1) as f64 + gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period - 1) as f64 + loss) / self.period as f64;
            results.push(rsi_value(avg_gain, avg_loss));
        }

        Ok(results)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        let values = self.calculate_prices(&close_prices(bars))?;
        Ok(align_series(bars.len(), values))
    }
}

/// A window without movement reads as neutral 50; gains with no losses as 100.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::bars_from_closes;

    #[test]
    fn rsi_insufficient_data() {
        let rsi = Rsi::new(14).unwrap();
        assert!(rsi.calculate(&bars_from_closes(&[1.0; 14])).is_err());
    }

    #[test]
    fn rsi_period_zero_invalid() {
        assert!(Rsi::new(0).is_err());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = Rsi::new(3).unwrap();
        let values = rsi
            .calculate_prices(&[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        assert_eq!(values, vec![100.0]);
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = Rsi::new(3).unwrap();
        let values = rsi.calculate_prices(&[4.0, 3.0, 2.0, 1.0]).unwrap();
        assert!(values[0].abs() < 1e-9);
    }

    #[test]
    fn rsi_constant_series_is_exactly_50() {
        let rsi = Rsi::new(14).unwrap();
        let values = rsi.calculate(&bars_from_closes(&[100.0_f64; 30])).unwrap();
        assert!(values.iter().flatten().all(|&v| v == 50.0));
    }

    #[test]
    fn rsi_known_value() {
        let rsi = Rsi::new(2).unwrap();
        // deltas +2, -1 -> avg_gain 1, avg_loss 0.5 -> rs 2 -> 66.67
        let values = rsi.calculate_prices(&[10.0, 12.0, 11.0]).unwrap();
        assert!((values[0] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_first_defined_row_is_period() {
        let rsi = Rsi::new(14).unwrap();
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let values = rsi.calculate(&bars_from_closes(&closes)).unwrap();
        assert_eq!(values.iter().position(Option::is_some), Some(14));
        assert_eq!(values.iter().flatten().count(), 20 - 14);
    }
}
