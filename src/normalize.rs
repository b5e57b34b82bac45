use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::model::{PriceBar, PriceSeries, RawRow, RawTable};

const CANONICAL_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// A source row excluded from the series because its close was unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub series: PriceSeries,
    pub dropped: Vec<DroppedRow>,
}

/// Positions of the canonical fields within a raw row.
struct ColumnMap {
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    fn resolve(table: &RawTable) -> Result<Self, Report<AnalysisError>> {
        let mut positions = [0usize; 5];
        for (slot, name) in positions.iter_mut().zip(CANONICAL_FIELDS) {
            let mut matches = table
                .labels
                .iter()
                .enumerate()
                .filter(|(_, label)| label.field().trim().eq_ignore_ascii_case(name))
                .map(|(index, _)| index);

            *slot = match (matches.next(), matches.next()) {
                (Some(index), None) => index,
                (None, _) => bail!(AnalysisError::MalformedInput {
                    reason: format!("missing column {name}"),
                }),
                (Some(_), Some(_)) => bail!(AnalysisError::MalformedInput {
                    reason: format!("column {name} appears more than once"),
                }),
            };
        }
        let [open, high, low, close, volume] = positions;
        Ok(Self {
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn price(row: &RawRow, index: usize, name: &str) -> Result<f64, Report<AnalysisError>> {
    match row.values[index] {
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        other => bail!(AnalysisError::MalformedInput {
            reason: format!("{name} at {} is not a positive price: {other:?}", row.timestamp),
        }),
    }
}

fn volume(row: &RawRow, index: usize) -> Result<u64, Report<AnalysisError>> {
    match row.values[index] {
        None => Ok(0),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value.round() as u64),
        Some(value) => bail!(AnalysisError::MalformedInput {
            reason: format!("volume at {} is invalid: {value}", row.timestamp),
        }),
    }
}

/// Why a close makes the row unusable, if it does.
fn close_defect(close: Option<f64>) -> Option<&'static str> {
    match close {
        None => Some("missing close"),
        Some(c) if !c.is_finite() => Some("non-finite close"),
        Some(c) if c <= 0.0 => Some("non-positive close"),
        Some(_) => None,
    }
}

/// Turn an untrusted supplier table into a validated `PriceSeries`.
///
/// Two-level column labels are collapsed to their field name, and rows with
/// an unusable close are dropped and reported. Anything else that breaks the
/// series invariants is rejected as `MalformedInput`.
pub fn normalize(table: &RawTable, min_rows: usize) -> Result<Normalized, Report<AnalysisError>> {
    if table.rows.is_empty() {
        bail!(AnalysisError::InsufficientData {
            required: min_rows.max(1),
            available: 0,
        });
    }

    let columns = ColumnMap::resolve(table).attach_with(|| format!("ticker: {}", table.ticker))?;

    let mut bars = Vec::with_capacity(table.rows.len());
    let mut dropped = Vec::new();

    for row in &table.rows {
        if row.values.len() != table.labels.len() {
            bail!(AnalysisError::MalformedInput {
                reason: format!(
                    "row at {} has {} values for {} columns",
                    row.timestamp,
                    row.values.len(),
                    table.labels.len()
                ),
            });
        }

        if let Some(reason) = close_defect(row.values[columns.close]) {
            warn!(
                ticker = %table.ticker,
                timestamp = %row.timestamp,
                reason,
                "dropping row"
            );
            dropped.push(DroppedRow {
                timestamp: row.timestamp,
                reason: reason.to_string(),
            });
            continue;
        }

        bars.push(PriceBar {
            timestamp: row.timestamp,
            open: price(row, columns.open, "open")?,
            high: price(row, columns.high, "high")?,
            low: price(row, columns.low, "low")?,
            close: price(row, columns.close, "close")?,
            volume: volume(row, columns.volume)?,
        });
    }

    let required = min_rows.max(1);
    if bars.len() < required {
        bail!(AnalysisError::InsufficientData {
            required,
            available: bars.len(),
        });
    }

    let series = PriceSeries::new(bars).attach_with(|| format!("ticker: {}", table.ticker))?;

    debug!(
        ticker = %table.ticker,
        rows = series.len(),
        dropped = dropped.len(),
        "series normalized"
    );

    Ok(Normalized { series, dropped })
}
