use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{self, IndicatorConfig};
use crate::error::AnalysisError;
use crate::model::{IndicatorRow, PriceSeries, Profile, RawTable};
use crate::normalize::{self, DroppedRow};
use crate::scoring::{self, ScoringConfig, SignalScore, Verdict};

/// Everything `analyze` needs besides the data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Fewest usable rows the normalizer accepts.
    pub min_rows: usize,
    /// Keep rows that precede the indicators' warm-up in the output.
    pub keep_warmup_rows: bool,
    pub indicators: IndicatorConfig,
    pub scoring: ScoringConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_rows: 10,
            keep_warmup_rows: true,
            indicators: IndicatorConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Headline figures over the analysed range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub sessions: usize,
    pub latest_close: f64,
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    pub period_high: f64,
    pub period_low: f64,
}

impl PriceSummary {
    pub fn from_series(series: &PriceSeries) -> Self {
        let bars = series.bars();
        let first = bars[0];
        let latest = bars[bars.len() - 1];
        let previous = bars.len().checked_sub(2).map(|i| bars[i]);

        let change = previous.map(|p| latest.close - p.close);
        let change_pct = previous.map(|p| (latest.close - p.close) / p.close * 100.0);

        Self {
            first: first.timestamp,
            last: latest.timestamp,
            sessions: bars.len(),
            latest_close: latest.close,
            change,
            change_pct,
            period_high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            period_low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub run_id: Uuid,
    pub ticker: String,
    pub summary: PriceSummary,
    /// Fundamentals the run was given, if any.
    pub profile: Option<Profile>,
    /// Timestamp of the row the score was computed on: the latest row on
    /// which every enabled indicator is defined.
    pub scored_at: DateTime<Utc>,
    pub score: SignalScore,
    pub verdict: Verdict,
    pub dropped: Vec<DroppedRow>,
    pub rows: Vec<IndicatorRow>,
}

impl Analysis {
    /// The row the score was computed on.
    pub fn scored_row(&self) -> Option<&IndicatorRow> {
        self.rows.iter().rev().find(|r| r.bar.timestamp == self.scored_at)
    }
}

/// Normalize, compute indicators, score the latest complete row against the
/// complete row before it, and classify the total.
///
/// Rows after the last complete one (an indicator undefined over a flat
/// tail, for instance) stay in the output but are not scored.
pub fn analyze(
    table: &RawTable,
    profile: Option<&Profile>,
    config: &AnalysisConfig,
) -> Result<Analysis, Report<AnalysisError>> {
    let run_id = Uuid::new_v4();

    let normalized = normalize::normalize(table, config.min_rows)?;
    let series = normalized.series;

    let rows = engine::compute(&series, &config.indicators)
        .attach_with(|| format!("ticker: {}", table.ticker))?;

    let complete = engine::complete_rows(&rows, &config.indicators);
    let Some((latest, earlier)) = complete.split_last() else {
        let missing = rows
            .last()
            .map(|row| config.indicators.missing_fields(row).join(", "))
            .unwrap_or_default();
        bail!(AnalysisError::IncompleteIndicators { missing });
    };
    let previous = earlier.last();

    let scored_at = latest.bar.timestamp;
    let skipped = rows.iter().filter(|r| r.bar.timestamp > scored_at).count();
    if skipped > 0 {
        warn!(
            ticker = %table.ticker,
            skipped,
            %scored_at,
            "latest rows lack indicators; scoring the last complete row"
        );
    }

    let score = scoring::score(latest, previous, profile, &config.scoring)
        .attach_with(|| format!("ticker: {}, row: {scored_at}", table.ticker))?;
    let verdict = scoring::classify(score.total, &config.scoring.labels)?;

    let rows = if config.keep_warmup_rows { rows } else { complete };

    info!(
        %run_id,
        ticker = %table.ticker,
        rows = rows.len(),
        dropped = normalized.dropped.len(),
        total = score.total,
        label = %verdict.label,
        "analysis complete"
    );

    Ok(Analysis {
        run_id,
        ticker: table.ticker.clone(),
        summary: PriceSummary::from_series(&series),
        profile: profile.cloned(),
        scored_at,
        score,
        verdict,
        dropped: normalized.dropped,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnLabel, RawRow};
    use chrono::TimeZone;

    fn raw_table(closes: &[f64]) -> RawTable {
        let bars: Vec<(f64, f64, f64)> = closes.iter().map(|&c| (c + 1.5, c - 1.5, c)).collect();
        raw_table_hlc(&bars)
    }

    fn raw_table_hlc(bars: &[(f64, f64, f64)]) -> RawTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RawTable {
            ticker: "2330.TW".into(),
            labels: ["Open", "High", "Low", "Close", "Volume"]
                .into_iter()
                .map(|f| ColumnLabel::Compound {
                    field: f.into(),
                    ticker: "2330.TW".into(),
                })
                .collect(),
            rows: bars
                .iter()
                .enumerate()
                .map(|(i, &(h, l, c))| RawRow {
                    timestamp: start + chrono::Duration::days(i as i64),
                    values: vec![Some(c), Some(h), Some(l), Some(c), Some(1000.0)],
                })
                .collect(),
        }
    }

    fn wavy(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 500.0 + (i as f64 * 0.3).sin() * 20.0 + i as f64 * 0.5)
            .collect()
    }

    #[test]
    fn analyze_is_idempotent() {
        let table = raw_table(&wavy(120));
        let config = AnalysisConfig::default();
        let first = analyze(&table, None, &config).unwrap();
        let second = analyze(&table, None, &config).unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.score, second.score);
        assert_eq!(first.verdict, second.verdict);
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn short_history_reports_window() {
        let err = analyze(&raw_table(&wavy(40)), None, &AnalysisConfig::default()).unwrap_err();
        assert!(err.current_context().is_short_history());
        assert!(matches!(
            err.current_context(),
            AnalysisError::InsufficientWindow { .. }
        ));
    }

    #[test]
    fn below_min_rows_reports_insufficient_data() {
        let err = analyze(&raw_table(&wavy(5)), None, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(
            *err.current_context(),
            AnalysisError::InsufficientData {
                required: 10,
                available: 5
            }
        );
    }

    #[test]
    fn summary_tracks_range_and_change() {
        let analysis = analyze(&raw_table(&wavy(100)), None, &AnalysisConfig::default()).unwrap();
        let closes = wavy(100);
        let s = &analysis.summary;
        assert_eq!(s.sessions, 100);
        assert_eq!(s.latest_close, closes[99]);
        assert!((s.change.unwrap() - (closes[99] - closes[98])).abs() < 1e-9);
        let max_close = closes.iter().cloned().fold(f64::MIN, f64::max);
        assert!((s.period_high - (max_close + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn warm_up_rows_can_be_trimmed() {
        let config = AnalysisConfig {
            keep_warmup_rows: false,
            ..AnalysisConfig::default()
        };
        let analysis = analyze(&raw_table(&wavy(100)), None, &config).unwrap();
        assert_eq!(analysis.rows.len(), 100 - 59);
        assert!(analysis.rows.iter().all(|r| r.is_complete(&config.indicators)));
    }

    #[test]
    fn flat_tail_scores_last_complete_row() {
        let closes = wavy(80);
        let halted = closes[79];
        let mut bars: Vec<(f64, f64, f64)> =
            closes.iter().map(|&c| (c + 1.5, c - 1.5, c)).collect();
        bars.extend(std::iter::repeat_n((halted, halted, halted), 16));

        let config = AnalysisConfig::default();
        let analysis = analyze(&raw_table_hlc(&bars), None, &config).unwrap();

        // A lookback window entirely inside the flat tail has no range, so
        // %K is undefined from index 80 + 14 - 1 on.
        let scored = analysis.scored_row().unwrap();
        assert_eq!(scored.bar.timestamp, analysis.rows[92].bar.timestamp);
        assert!(scored.is_complete(&config.indicators));
        assert_eq!(analysis.rows.len(), 96);
        assert_eq!(analysis.rows[95].stoch_k, None);
        assert_eq!(analysis.summary.latest_close, halted);
    }

    #[test]
    fn flat_tail_trimmed_output_ends_at_scored_row() {
        let closes = wavy(80);
        let halted = closes[79];
        let mut bars: Vec<(f64, f64, f64)> =
            closes.iter().map(|&c| (c + 1.5, c - 1.5, c)).collect();
        bars.extend(std::iter::repeat_n((halted, halted, halted), 16));

        let config = AnalysisConfig {
            keep_warmup_rows: false,
            ..AnalysisConfig::default()
        };
        let analysis = analyze(&raw_table_hlc(&bars), None, &config).unwrap();
        assert_eq!(analysis.rows.last().map(|r| r.bar.timestamp), Some(analysis.scored_at));
    }

    #[test]
    fn no_complete_row_is_incomplete_indicators() {
        let bars = vec![(500.0, 500.0, 500.0); 100];
        let err = analyze(&raw_table_hlc(&bars), None, &AnalysisConfig::default()).unwrap_err();
        match err.current_context() {
            AnalysisError::IncompleteIndicators { missing } => assert!(missing.contains("stoch_k")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn profile_is_carried_into_analysis() {
        let profile = Profile {
            sector: Some("Technology".into()),
            market_cap: Some(3.1e12),
            ..Profile::default()
        };
        let analysis = analyze(
            &raw_table(&wavy(100)),
            Some(&profile),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(analysis.profile, Some(profile));
        assert_eq!(analysis.scored_at, analysis.summary.last);
    }

    #[test]
    fn single_row_summary_has_no_change() {
        let series = PriceSeries::new(vec![crate::model::PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            volume: 0,
        }])
        .unwrap();
        let summary = PriceSummary::from_series(&series);
        assert_eq!(summary.change, None);
        assert_eq!(summary.change_pct, None);
    }
}
