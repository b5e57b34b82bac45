use error_stack::{Report, bail};

use crate::error::AnalysisError;
use crate::indicator::{Indicator, align_series, close_prices, insufficient};
use crate::model::PriceBar;

/// Simple Moving Average.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<AnalysisError>> {
        if period == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "sma period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    /// SMA over a price slice, trimmed to the defined region.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<AnalysisError>> {
        if prices.len() < self.period {
            return Err(insufficient("sma", self.period, prices.len()));
        }
        Ok(prices
            .windows(self.period)
            .map(|w| w.iter().sum::<f64>() / self.period as f64)
            .collect())
    }

    /// SMA over a series with holes. A window containing an undefined value
    /// is itself undefined. Output is aligned with the input.
    pub fn calculate_optional(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut output = vec![None; values.len()];
        if values.len() < self.period {
            return output;
        }
        for (index, window) in values.windows(self.period).enumerate() {
            let sum: Option<f64> = window.iter().copied().sum();
            output[index + self.period - 1] = sum.map(|s| s / self.period as f64);
        }
        output
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        let values = self.calculate_prices(&close_prices(bars))?;
        Ok(align_series(bars.len(), values))
    }
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<AnalysisError>> {
        if period == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "ema period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    /// EMA over a price slice, trimmed to the defined region.
    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<AnalysisError>> {
        if prices.len() < self.period {
            return Err(insufficient("ema", self.period, prices.len()));
        }

        let k = 2.0 / (self.period as f64 + 1.0);
        let seed: f64 = prices[..self.period].iter().sum::<f64>() / self.period as f64;
        let mut ema = seed;
        let mut results = Vec::with_capacity(prices.len() - self.period + 1);
        results.push(ema);

        for &price in &prices[self.period..] {
            ema = price * k + ema * (1.0 - k);
            results.push(ema);
        }

        Ok(results)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        let values = self.calculate_prices(&close_prices(bars))?;
        Ok(align_series(bars.len(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::bars_from_closes;

    #[test]
    fn sma_period_zero_invalid() {
        assert!(Sma::new(0).is_err());
    }

    #[test]
    fn sma_insufficient_data() {
        let sma = Sma::new(5).unwrap();
        let err = sma.calculate(&bars_from_closes(&[1.0; 4])).unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalysisError::InsufficientWindow {
                required: 5,
                available: 4,
                ..
            }
        ));
    }

    #[test]
    fn sma_defined_for_exactly_len_minus_period_plus_one_rows() {
        let sma = Sma::new(3).unwrap();
        let values = sma.calculate(&bars_from_closes(&[10.0; 7])).unwrap();
        assert_eq!(values.len(), 7);
        assert_eq!(values.iter().filter(|v| v.is_some()).count(), 7 - 3 + 1);
        assert!(values[..2].iter().all(Option::is_none));
    }

    #[test]
    fn sma_known_value() {
        let sma = Sma::new(3).unwrap();
        let values = sma
            .calculate(&bars_from_closes(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        // (1+2+3)/3 = 2.0, (2+3+4)/3 = 3.0
        assert!((values[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((values[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn sma_of_one_is_identity() {
        let closes = [3.0, 1.5, 4.0, 1.0, 5.9, 2.6];
        let first = Sma::new(3).unwrap().calculate_prices(&closes).unwrap();
        let second = Sma::new(1).unwrap().calculate_prices(&first).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sma_optional_window_with_hole_is_undefined() {
        let sma = Sma::new(2).unwrap();
        let values = sma.calculate_optional(&[Some(1.0), None, Some(3.0), Some(5.0)]);
        assert_eq!(values, vec![None, None, None, Some(4.0)]);
    }

    #[test]
    fn ema_period_zero_invalid() {
        assert!(Ema::new(0).is_err());
    }

    #[test]
    fn ema_insufficient_data() {
        let ema = Ema::new(5).unwrap();
        assert!(ema.calculate(&bars_from_closes(&[1.0; 4])).is_err());
    }

    #[test]
    fn ema_flat_prices() {
        let ema = Ema::new(3).unwrap();
        let values = ema.calculate(&bars_from_closes(&[10.0; 6])).unwrap();
        for v in values.iter().flatten() {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn ema_seed_equals_sma() {
        let ema = Ema::new(3).unwrap();
        let values = ema
            .calculate(&bars_from_closes(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_eq!(values[1], None);
        // seed = (1+2+3)/3 = 2.0, then 4*0.5 + 2*0.5 = 3.0
        assert!((values[2].unwrap() - 2.0).abs() < 1e-9);
        assert!((values[3].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn ema_bounded_by_closes_on_monotonic_input() {
        let closes: Vec<f64> = (1..=40).map(|i| 100.0 + i as f64 * 1.5).collect();
        let values = Ema::new(10).unwrap().calculate_prices(&closes).unwrap();
        let (min, max) = (closes[0], closes[closes.len() - 1]);
        assert!(values.iter().all(|v| *v >= min && *v <= max));
    }
}
