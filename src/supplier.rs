pub mod csv_file;
pub mod yahoo;

use chrono::{Days, NaiveDate};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SupplierError;
use crate::model::{Interval, Profile, RawTable};

/// Window used when the caller gives no start date.
pub const DEFAULT_LOOKBACK_DAYS: u64 = 365;

/// What to fetch. `start` is inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub ticker: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub interval: Interval,
    /// Scale open/high/low/close by the split and dividend adjustment.
    pub auto_adjust: bool,
}

impl HistoryQuery {
    /// Fill in missing bounds: `end` defaults to `today`, `start` to
    /// `DEFAULT_LOOKBACK_DAYS` before `end`.
    pub fn resolved_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let start = self.start.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                .unwrap_or(NaiveDate::MIN)
        });
        (start, end)
    }
}

/// Source of historical prices and company fundamentals.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn PriceSupplier`).
pub trait PriceSupplier: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the raw price table for `query`.
    fn fetch_history(
        &self,
        query: &HistoryQuery,
    ) -> BoxFuture<'_, Result<RawTable, Report<SupplierError>>>;

    /// Fetch fundamentals. Unknown values are `None`.
    fn fetch_profile(&self, ticker: &str) -> BoxFuture<'_, Result<Profile, Report<SupplierError>>>;
}
