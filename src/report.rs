pub mod json;
pub mod terminal;

use error_stack::Report;

use crate::error::ReportError;
use crate::pipeline::Analysis;

/// Renders a finished analysis for display or downstream tools.
pub trait Reporter: Send + Sync {
    fn render(&self, analysis: &Analysis) -> Result<String, Report<ReportError>>;
}

/// Output formats selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    /// Indented JSON.
    Json,
    /// One JSON document per line.
    JsonCompact,
}

pub fn reporter_for(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Text => Box::new(terminal::TerminalReporter),
        OutputFormat::Json => Box::new(json::JsonReporter { pretty: true }),
        OutputFormat::JsonCompact => Box::new(json::JsonReporter { pretty: false }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use crate::model::{IndicatorRow, PriceBar};
    use crate::pipeline::{Analysis, PriceSummary};
    use crate::scoring::{RuleGroup, ScoreComponent, SignalScore, Verdict};

    pub fn sample_analysis() -> Analysis {
        let bar = PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 28, 0, 0, 0).unwrap(),
            open: 210.0,
            high: 212.5,
            low: 209.0,
            close: 211.0,
            volume: 1_000_000,
        };
        let row = IndicatorRow {
            ema_short: Some(208.25),
            ema_long: Some(204.0),
            rsi: Some(63.4),
            ..IndicatorRow::bare(bar)
        };
        Analysis {
            run_id: Uuid::nil(),
            ticker: "AAPL".into(),
            summary: PriceSummary {
                first: Utc.with_ymd_and_hms(2023, 6, 29, 0, 0, 0).unwrap(),
                last: bar.timestamp,
                sessions: 250,
                latest_close: 211.0,
                change: Some(-1.5),
                change_pct: Some(-0.706),
                period_high: 220.2,
                period_low: 164.1,
            },
            profile: None,
            scored_at: bar.timestamp,
            score: SignalScore {
                total: 3,
                components: vec![ScoreComponent {
                    group: RuleGroup::Trend,
                    label: "strong uptrend: close > short EMA > long EMA".into(),
                    delta: 3,
                }],
            },
            verdict: Verdict {
                label: "bullish".into(),
                advice: "Bias is positive; hold or add cautiously.".into(),
            },
            dropped: vec![],
            rows: vec![row],
        }
    }
}
