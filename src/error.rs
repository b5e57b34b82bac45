use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SupplierError {
    #[display("request to {supplier} failed")]
    Request { supplier: String },
    #[display("failed to parse response from {supplier}")]
    ResponseParse { supplier: String },
    #[display("failed to read price file")]
    ReadFile,
    #[display("{supplier} returned no data for {ticker}")]
    NoData { supplier: String, ticker: String },
    #[display("price file names no ticker and is shared by several; cannot serve {ticker}")]
    AmbiguousFile { ticker: String },
}

/// Outcomes of the analysis core. Every variant is a recoverable condition
/// the caller can react to (widen the date range, pick another ticker, ...).
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[display("insufficient data: need {required} rows, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("insufficient window for {indicator}: need {required} rows, got {available}")]
    InsufficientWindow {
        indicator: String,
        required: usize,
        available: usize,
    },
    #[display("incomplete indicators: missing {missing}")]
    IncompleteIndicators { missing: String },
    #[display("malformed input: {reason}")]
    MalformedInput { reason: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

impl AnalysisError {
    /// True when re-querying with a wider date range could fix the outcome.
    pub fn is_short_history(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::InsufficientWindow { .. }
        )
    }
}

#[derive(Debug, Display, Error)]
pub enum ReportError {
    #[display("failed to render report")]
    Render,
}
