pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod stochastic;

use error_stack::Report;

use crate::error::AnalysisError;
use crate::model::PriceBar;

/// A technical analysis indicator that operates on a slice of price bars.
///
/// Bars must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Short name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one output value.
    fn required_bars(&self) -> usize;

    /// Calculate the indicator's primary line.
    ///
    /// Returns exactly one value per input bar; entries before the warm-up
    /// (or otherwise undefined) are `None`.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<Option<f64>>, Report<AnalysisError>>;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Right-align a trimmed output against `total_len` input rows.
pub fn align_series(total_len: usize, values: Vec<f64>) -> Vec<Option<f64>> {
    align_optional(total_len, values.into_iter().map(Some).collect())
}

pub fn align_optional(total_len: usize, values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let offset = total_len.saturating_sub(values.len());
    let mut output = vec![None; total_len];
    for (index, value) in values.into_iter().enumerate() {
        output[offset + index] = value;
    }
    output
}

pub(crate) fn insufficient(
    indicator: &str,
    required: usize,
    available: usize,
) -> Report<AnalysisError> {
    Report::new(AnalysisError::InsufficientWindow {
        indicator: indicator.to_string(),
        required,
        available,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_pads_front_with_none() {
        let aligned = align_series(4, vec![1.0, 2.0]);
        assert_eq!(aligned, vec![None, None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn align_keeps_holes() {
        let aligned = align_optional(3, vec![None, Some(5.0)]);
        assert_eq!(aligned, vec![None, None, Some(5.0)]);
    }
}
