use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use tracing::info;

use crate::error::SupplierError;
use crate::model::{ColumnLabel, Profile, RawRow, RawTable};
use crate::supplier::{HistoryQuery, PriceSupplier};

const SUPPLIER: &str = "csv";

/// Reads a price history exported by yfinance (`DataFrame.to_csv`).
///
/// Both header layouts are understood: a single `Date,Open,High,...` row, and
/// the three-row layout (`Price,...` / `Ticker,...` / `Date,,,...`) written
/// for two-level columns.
///
/// A multi-level file may hold several tickers; each query reads only the
/// columns of its own ticker. A single-header file names no ticker, so it can
/// serve one requested ticker only.
pub struct CsvSupplier {
    path: PathBuf,
    /// Number of tickers this supplier will be queried for.
    requested: usize,
}

impl CsvSupplier {
    pub fn new(path: impl Into<PathBuf>, requested: usize) -> Self {
        Self {
            path: path.into(),
            requested,
        }
    }
}

impl PriceSupplier for CsvSupplier {
    fn name(&self) -> &str {
        SUPPLIER
    }

    fn fetch_history(
        &self,
        query: &HistoryQuery,
    ) -> BoxFuture<'_, Result<RawTable, Report<SupplierError>>> {
        let query = query.clone();
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&self.path)
                .await
                .change_context(SupplierError::ReadFile)
                .attach_with(|| format!("path: {}", self.path.display()))?;

            let table = parse_table(&content, &query, self.requested)
                .attach_with(|| format!("path: {}", self.path.display()))?;

            info!(
                ticker = %query.ticker,
                path = %self.path.display(),
                rows = table.rows.len(),
                "csv history load complete"
            );
            Ok(table)
        })
    }

    fn fetch_profile(&self, _ticker: &str) -> BoxFuture<'_, Result<Profile, Report<SupplierError>>> {
        Box::pin(async { Ok(Profile::default()) })
    }
}

fn parse_failure(detail: String) -> Report<SupplierError> {
    Report::new(SupplierError::ResponseParse {
        supplier: SUPPLIER.into(),
    })
    .attach(detail)
}

/// Accepts `2024-01-02`, `2024-01-02 09:30:00`, `2024-01-02 09:30:00-05:00`
/// and RFC 3339.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_value(cell: &str) -> Result<Option<f64>, Report<SupplierError>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .change_context(SupplierError::ResponseParse {
            supplier: SUPPLIER.into(),
        })
        .attach_with(|| format!("cell: {cell:?}"))
}

fn is_blank_after_first(record: &StringRecord) -> bool {
    record.iter().skip(1).all(|c| c.trim().is_empty())
}

fn parse_table(
    content: &str,
    query: &HistoryQuery,
    requested: usize,
) -> Result<RawTable, Report<SupplierError>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.change_context(SupplierError::ReadFile)?,
        None => bail!(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: query.ticker.clone(),
        }),
    };

    let mut pending: Option<StringRecord> = None;
    let mut tickers: Option<StringRecord> = None;

    if let Some(second) = records.next() {
        let second = second.change_context(SupplierError::ReadFile)?;
        if second.get(0).is_some_and(|c| c.trim() == "Ticker") {
            tickers = Some(second);
        } else {
            pending = Some(second);
        }
    }

    if tickers.is_none() && requested > 1 {
        bail!(SupplierError::AmbiguousFile {
            ticker: query.ticker.clone(),
        });
    }

    let all_labels: Vec<(usize, ColumnLabel)> = header
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, field)| {
            let ticker = tickers
                .as_ref()
                .and_then(|t| t.get(i))
                .map(str::trim)
                .filter(|t| !t.is_empty());
            let label = match ticker {
                Some(ticker) => ColumnLabel::Compound {
                    field: field.trim().to_string(),
                    ticker: ticker.to_string(),
                },
                None => ColumnLabel::Single(field.trim().to_string()),
            };
            (i, label)
        })
        .collect();

    // Compound columns of other tickers are skipped; unlabelled ones are shared.
    let (columns, labels): (Vec<usize>, Vec<ColumnLabel>) = all_labels
        .into_iter()
        .filter(|(_, label)| match label {
            ColumnLabel::Compound { ticker, .. } => ticker.eq_ignore_ascii_case(&query.ticker),
            ColumnLabel::Single(_) => true,
        })
        .unzip();

    if tickers.is_some() && !labels.iter().any(|l| matches!(l, ColumnLabel::Compound { .. })) {
        bail!(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: query.ticker.clone(),
        });
    }

    let mut rows = Vec::new();
    for (line, record) in pending.into_iter().map(Ok).chain(records).enumerate() {
        let record = record.change_context(SupplierError::ReadFile)?;
        let first = record.get(0).unwrap_or_default();

        // The `Date,,,` spacer row of the two-level layout
        if tickers.is_some() && line == 0 && is_blank_after_first(&record) {
            continue;
        }
        if first.trim().is_empty() && is_blank_after_first(&record) {
            continue;
        }

        let timestamp = parse_timestamp(first)
            .ok_or_else(|| parse_failure(format!("bad timestamp {first:?}")))?;
        let date = timestamp.date_naive();
        if query.start.is_some_and(|start| date < start) || query.end.is_some_and(|end| date >= end) {
            continue;
        }

        let mut values = Vec::with_capacity(columns.len());
        for &index in &columns {
            values.push(parse_value(record.get(index).unwrap_or_default())?);
        }
        rows.push(RawRow { timestamp, values });
    }

    if rows.is_empty() {
        bail!(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: query.ticker.clone(),
        });
    }

    Ok(RawTable {
        ticker: query.ticker.clone(),
        labels,
        rows,
    })
}
