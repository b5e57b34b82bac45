use error_stack::{Report, bail};

use crate::error::AnalysisError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, align_series, close_prices, insufficient};
use crate::model::PriceBar;

/// One row of Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger Bands around an SMA, using the population standard deviation
/// (denominator `period`) of the window.
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<AnalysisError>> {
        if period == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "bollinger period must be > 0".into(),
            });
        }
        if !(std_dev_multiplier > 0.0 && std_dev_multiplier.is_finite()) {
            bail!(AnalysisError::InvalidParameter {
                name: "bollinger std_dev must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }

    /// Band values for every full window, trimmed to the defined region.
    pub fn calculate_bands(&self, bars: &[PriceBar]) -> Result<Vec<Bands>, Report<AnalysisError>> {
        let prices = close_prices(bars);
        if prices.len() < self.period {
            return Err(insufficient(self.name(), self.period, prices.len()));
        }

        let sma = Sma::new(self.period)?.calculate_prices(&prices)?;

        let bands = prices
            .windows(self.period)
            .zip(sma.iter())
            .map(|(window, &middle)| {
                let variance =
                    window.iter().map(|&p| (p - middle).powi(2)).sum::<f64>() / self.period as f64;
                let spread = self.std_dev_multiplier * variance.sqrt();
                Bands {
                    upper: middle + spread,
                    middle,
                    lower: middle - spread,
                }
            })
            .collect();

        Ok(bands)
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>> {
        let middle = self
            .calculate_bands(bars)?
            .into_iter()
            .map(|b| b.middle)
            .collect();
        Ok(align_series(bars.len(), middle))
    }
}
