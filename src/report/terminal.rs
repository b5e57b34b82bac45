use std::fmt::Write;

use error_stack::{Report, ResultExt};

use crate::error::ReportError;
use crate::model::{IndicatorRow, Profile};
use crate::pipeline::Analysis;
use crate::report::Reporter;

/// Plain-text summary: price tiles, latest indicator values, score breakdown
/// and the verdict.
pub struct TerminalReporter;

fn indicator_values(row: &IndicatorRow) -> Vec<(&'static str, f64)> {
    [
        ("sma_short", row.sma_short),
        ("sma_long", row.sma_long),
        ("ema_short", row.ema_short),
        ("ema_long", row.ema_long),
        ("bb_lower", row.bb_lower),
        ("bb_mid", row.bb_mid),
        ("bb_upper", row.bb_upper),
        ("macd", row.macd),
        ("macd_signal", row.macd_signal),
        ("macd_hist", row.macd_hist),
        ("stoch_k", row.stoch_k),
        ("stoch_d", row.stoch_d),
        ("rsi", row.rsi),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, v)))
    .collect()
}

/// `3.10T`, `512.40B`, `87.00M`.
fn abbreviate(amount: f64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e12, "T"), (1e9, "B"), (1e6, "M")];
    UNITS
        .iter()
        .find(|(scale, _)| amount.abs() >= *scale)
        .map(|(scale, unit)| format!("{:.2}{unit}", amount / scale))
        .unwrap_or_else(|| format!("{amount:.0}"))
}

fn write_profile(profile: &Profile, out: &mut String) -> std::fmt::Result {
    let mut tiles = Vec::new();
    if let Some(sector) = &profile.sector {
        tiles.push(format!("sector {sector}"));
    }
    if let Some(pe) = profile.pe_ratio {
        tiles.push(format!("P/E {pe:.1}"));
    }
    if let Some(cap) = profile.market_cap {
        tiles.push(format!("market cap {}", abbreviate(cap)));
    }
    if let Some(high) = profile.fifty_two_week_high {
        tiles.push(format!("52w high {high:.2}"));
    }
    if !tiles.is_empty() {
        writeln!(out, "profile    {}", tiles.join("  "))?;
    }
    Ok(())
}

fn write_text(analysis: &Analysis, out: &mut String) -> std::fmt::Result {
    let summary = &analysis.summary;
    writeln!(
        out,
        "== {} ({} to {}, {} sessions)",
        analysis.ticker,
        summary.first.date_naive(),
        summary.last.date_naive(),
        summary.sessions
    )?;

    write!(out, "price      {:.2}", summary.latest_close)?;
    if let (Some(change), Some(pct)) = (summary.change, summary.change_pct) {
        write!(out, "  ({change:+.2}, {pct:+.2}%)")?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "range      high {:.2}  low {:.2}",
        summary.period_high, summary.period_low
    )?;

    if let Some(profile) = &analysis.profile {
        write_profile(profile, out)?;
    }

    if let Some(scored) = analysis.scored_row() {
        if analysis.scored_at == summary.last {
            writeln!(out, "indicators")?;
        } else {
            writeln!(out, "indicators (as of {})", analysis.scored_at.date_naive())?;
        }
        for (name, value) in indicator_values(scored) {
            writeln!(out, "  {name:<12}{value:>12.2}")?;
        }
    }

    writeln!(out, "signals")?;
    if analysis.score.components.is_empty() {
        writeln!(out, "  (none fired)")?;
    }
    for component in &analysis.score.components {
        writeln!(
            out,
            "  {:<13}{:>+3}  {}",
            component.group.to_string(),
            component.delta,
            component.label
        )?;
    }

    writeln!(
        out,
        "score      {:+} -> {}",
        analysis.score.total, analysis.verdict.label
    )?;
    writeln!(out, "advice     {}", analysis.verdict.advice)?;

    if !analysis.dropped.is_empty() {
        writeln!(out, "dropped    {} rows with unusable close", analysis.dropped.len())?;
    }
    Ok(())
}

impl Reporter for TerminalReporter {
    fn render(&self, analysis: &Analysis) -> Result<String, Report<ReportError>> {
        let mut out = String::new();
        write_text(analysis, &mut out)
            .change_context(ReportError::Render)
            .attach_with(|| format!("ticker: {}", analysis.ticker))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_analysis;
    use chrono::{TimeZone, Utc};

    #[test]
    fn text_contains_summary_and_verdict() {
        let text = TerminalReporter.render(&sample_analysis()).unwrap();
        assert!(text.starts_with("== AAPL (2023-06-29 to 2024-06-28, 250 sessions)"));
        assert!(text.contains("price      211.00  (-1.50, -0.71%)"));
        assert!(text.contains("score      +3 -> bullish"));
        assert!(text.contains("Bias is positive"));
    }

    #[test]
    fn only_defined_indicators_listed() {
        let text = TerminalReporter.render(&sample_analysis()).unwrap();
        assert!(text.contains("ema_short"));
        assert!(text.contains("rsi"));
        assert!(!text.contains("sma_long"));
    }

    #[test]
    fn components_listed_with_signed_delta() {
        let text = TerminalReporter.render(&sample_analysis()).unwrap();
        assert!(text.contains("trend         +3  strong uptrend"));
    }

    #[test]
    fn profile_tiles_show_known_values_only() {
        let mut analysis = sample_analysis();
        analysis.profile = Some(Profile {
            sector: Some("Technology".into()),
            pe_ratio: Some(32.44),
            market_cap: Some(3.1e12),
            fifty_two_week_high: None,
        });
        let text = TerminalReporter.render(&analysis).unwrap();
        assert!(text.contains("profile    sector Technology  P/E 32.4  market cap 3.10T\n"));
    }

    #[test]
    fn no_profile_line_without_profile() {
        let text = TerminalReporter.render(&sample_analysis()).unwrap();
        assert!(!text.contains("profile"));
    }

    #[test]
    fn earlier_scored_row_is_dated() {
        let mut analysis = sample_analysis();
        analysis.summary.last = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let text = TerminalReporter.render(&analysis).unwrap();
        assert!(text.contains("indicators (as of 2024-06-28)"));
    }

    #[test]
    fn amounts_are_abbreviated() {
        assert_eq!(abbreviate(3.1e12), "3.10T");
        assert_eq!(abbreviate(512.4e9), "512.40B");
        assert_eq!(abbreviate(87e6), "87.00M");
        assert_eq!(abbreviate(950.0), "950");
    }

    #[test]
    fn empty_score_says_none_fired() {
        let mut analysis = sample_analysis();
        analysis.score.components.clear();
        analysis.score.total = 0;
        let text = TerminalReporter.render(&analysis).unwrap();
        assert!(text.contains("(none fired)"));
        assert!(text.contains("score      +0 -> bullish"));
    }
}
