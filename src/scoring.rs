pub mod condition;

use std::fmt;

use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::model::{IndicatorRow, Profile};
use condition::{Condition, is_triggered};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBasis {
    Ema,
    Sma,
}

/// `state` scores the current comparison on every row; `cross` scores only
/// the row on which the comparison flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    State,
    Cross,
}

impl SignalMode {
    fn rising(self) -> Condition {
        match self {
            Self::State => Condition::Above(0.0),
            Self::Cross => Condition::CrossAbove(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendRule {
    pub enabled: bool,
    pub basis: TrendBasis,
    pub strong: i32,
    pub weak: i32,
    pub negative: i32,
}

impl Default for TrendRule {
    fn default() -> Self {
        Self {
            enabled: true,
            basis: TrendBasis::Ema,
            strong: 3,
            weak: 1,
            negative: -2,
        }
    }
}

/// Sign rule over a spread (MACD histogram, or %K minus %D).
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumRule {
    pub enabled: bool,
    pub mode: SignalMode,
    pub positive: i32,
    pub negative: i32,
}

impl MomentumRule {
    fn with_weight(weight: i32) -> Self {
        Self {
            enabled: true,
            mode: SignalMode::State,
            positive: weight,
            negative: -weight,
        }
    }
}

impl Default for MomentumRule {
    fn default() -> Self {
        Self::with_weight(1)
    }
}

fn default_macd_rule() -> MomentumRule {
    MomentumRule::with_weight(2)
}

/// Keys given in a `[scoring.macd]` / `[scoring.stochastic]` table; omitted
/// keys keep that rule's own default rather than a shared one.
#[derive(Deserialize)]
struct MomentumOverrides {
    enabled: Option<bool>,
    mode: Option<SignalMode>,
    positive: Option<i32>,
    negative: Option<i32>,
}

impl MomentumOverrides {
    fn apply(self, base: MomentumRule) -> MomentumRule {
        MomentumRule {
            enabled: self.enabled.unwrap_or(base.enabled),
            mode: self.mode.unwrap_or(base.mode),
            positive: self.positive.unwrap_or(base.positive),
            negative: self.negative.unwrap_or(base.negative),
        }
    }
}

fn deserialize_macd_rule<'de, D>(deserializer: D) -> Result<MomentumRule, D::Error>
where
    D: serde::Deserializer<'de>,
{
    MomentumOverrides::deserialize(deserializer).map(|o| o.apply(default_macd_rule()))
}

fn deserialize_stochastic_rule<'de, D>(deserializer: D) -> Result<MomentumRule, D::Error>
where
    D: serde::Deserializer<'de>,
{
    MomentumOverrides::deserialize(deserializer).map(|o| o.apply(MomentumRule::default()))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RsiRule {
    pub enabled: bool,
    pub overbought: f64,
    pub oversold: f64,
    pub overbought_delta: i32,
    pub oversold_delta: i32,
}

impl Default for RsiRule {
    fn default() -> Self {
        Self {
            enabled: true,
            overbought: 75.0,
            oversold: 25.0,
            overbought_delta: -2,
            oversold_delta: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BollingerRule {
    pub enabled: bool,
    pub upper_breach: i32,
    pub lower_breach: i32,
}

impl Default for BollingerRule {
    fn default() -> Self {
        Self {
            enabled: true,
            upper_breach: -1,
            lower_breach: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FundamentalsRule {
    pub enabled: bool,
    pub cheap_pe: f64,
    pub expensive_pe: f64,
    pub pe_delta: i32,
    /// Fraction of the 52-week high the close must reach to count as strong.
    pub near_high_ratio: f64,
    pub near_high_delta: i32,
}

impl Default for FundamentalsRule {
    fn default() -> Self {
        Self {
            enabled: false,
            cheap_pe: 15.0,
            expensive_pe: 40.0,
            pe_delta: 1,
            near_high_ratio: 0.95,
            near_high_delta: 1,
        }
    }
}

/// One row of the score-to-label table. A band without `min` matches any total.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelBand {
    pub min: Option<i32>,
    pub label: String,
    pub advice: String,
}

fn band(min: Option<i32>, label: &str, advice: &str) -> LabelBand {
    LabelBand {
        min,
        label: label.into(),
        advice: advice.into(),
    }
}

pub fn default_labels() -> Vec<LabelBand> {
    vec![
        band(
            Some(5),
            "strong bullish",
            "Trend and momentum agree on the upside; consider adding on pullbacks.",
        ),
        band(Some(2), "bullish", "Bias is positive; hold or add cautiously."),
        band(Some(-1), "neutral", "No clear edge; wait for confirmation."),
        band(
            Some(-4),
            "bearish",
            "Bias is negative; reduce exposure or tighten stops.",
        ),
        band(None, "strong bearish", "Trend and momentum point down; stay defensive."),
    ]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub trend: TrendRule,
    #[serde(deserialize_with = "deserialize_macd_rule")]
    pub macd: MomentumRule,
    #[serde(deserialize_with = "deserialize_stochastic_rule")]
    pub stochastic: MomentumRule,
    pub rsi: RsiRule,
    pub bollinger: BollingerRule,
    pub fundamentals: FundamentalsRule,
    pub labels: Vec<LabelBand>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trend: TrendRule::default(),
            macd: default_macd_rule(),
            stochastic: MomentumRule::default(),
            rsi: RsiRule::default(),
            bollinger: BollingerRule::default(),
            fundamentals: FundamentalsRule::default(),
            labels: default_labels(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleGroup {
    Trend,
    Momentum,
    Extremes,
    Fundamentals,
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trend => "trend",
            Self::Momentum => "momentum",
            Self::Extremes => "extremes",
            Self::Fundamentals => "fundamentals",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub group: RuleGroup,
    pub label: String,
    pub delta: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalScore {
    pub total: i32,
    pub components: Vec<ScoreComponent>,
}

impl SignalScore {
    fn push(&mut self, group: RuleGroup, label: impl Into<String>, delta: i32) {
        self.total += delta;
        self.components.push(ScoreComponent {
            group,
            label: label.into(),
            delta,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub label: String,
    pub advice: String,
}

fn require(value: Option<f64>, field: &str) -> Result<f64, Report<AnalysisError>> {
    match value {
        Some(v) => Ok(v),
        None => bail!(AnalysisError::IncompleteIndicators {
            missing: field.to_string(),
        }),
    }
}

fn require_previous(
    previous: Option<&IndicatorRow>,
    read: impl Fn(&IndicatorRow) -> Option<f64>,
    field: &str,
) -> Result<f64, Report<AnalysisError>> {
    match previous {
        Some(row) => require(read(row), &format!("{field} (previous row)")),
        None => bail!(AnalysisError::IncompleteIndicators {
            missing: format!("previous row for {field}"),
        }),
    }
}

/// `Some(true)` for a positive signal, `Some(false)` for negative, `None`
/// when a cross rule does not fire on this row.
fn momentum_direction(mode: SignalMode, current: f64, previous: Option<f64>) -> Option<bool> {
    if is_triggered(&mode.rising(), current, previous) {
        return Some(true);
    }
    match mode {
        SignalMode::State => Some(false),
        SignalMode::Cross => {
            is_triggered(&Condition::CrossBelow(0.0), current, previous).then_some(false)
        }
    }
}

fn score_trend(
    score: &mut SignalScore,
    rule: &TrendRule,
    latest: &IndicatorRow,
) -> Result<(), Report<AnalysisError>> {
    let (short, long, name) = match rule.basis {
        TrendBasis::Ema => (
            require(latest.ema_short, "ema_short")?,
            require(latest.ema_long, "ema_long")?,
            "EMA",
        ),
        TrendBasis::Sma => (
            require(latest.sma_short, "sma_short")?,
            require(latest.sma_long, "sma_long")?,
            "SMA",
        ),
    };
    let close = latest.close();

    if close > short && short > long {
        score.push(
            RuleGroup::Trend,
            format!("strong uptrend: close > short {name} > long {name}"),
            rule.strong,
        );
    } else if close > long {
        score.push(
            RuleGroup::Trend,
            format!("weak uptrend: close above long {name}"),
            rule.weak,
        );
    } else {
        score.push(
            RuleGroup::Trend,
            format!("downtrend: close at or below long {name}"),
            rule.negative,
        );
    }
    Ok(())
}

fn score_macd(
    score: &mut SignalScore,
    rule: &MomentumRule,
    latest: &IndicatorRow,
    previous: Option<&IndicatorRow>,
) -> Result<(), Report<AnalysisError>> {
    let hist = require(latest.macd_hist, "macd_hist")?;
    let prev_hist = if rule.mode.rising().is_edge() {
        Some(require_previous(previous, |r| r.macd_hist, "macd_hist")?)
    } else {
        None
    };

    let label = |positive: bool| match (rule.mode, positive) {
        (SignalMode::State, true) => "MACD histogram positive",
        (SignalMode::State, false) => "MACD histogram not positive",
        (SignalMode::Cross, true) => "MACD histogram turned positive",
        (SignalMode::Cross, false) => "MACD histogram turned negative",
    };

    match momentum_direction(rule.mode, hist, prev_hist) {
        Some(true) => score.push(RuleGroup::Momentum, label(true), rule.positive),
        Some(false) => score.push(RuleGroup::Momentum, label(false), rule.negative),
        None => {}
    }
    Ok(())
}

fn score_stochastic(
    score: &mut SignalScore,
    rule: &MomentumRule,
    latest: &IndicatorRow,
    previous: Option<&IndicatorRow>,
) -> Result<(), Report<AnalysisError>> {
    let spread = require(latest.stoch_k, "stoch_k")? - require(latest.stoch_d, "stoch_d")?;
    let prev_spread = if rule.mode.rising().is_edge() {
        Some(
            require_previous(previous, |r| r.stoch_k, "stoch_k")?
                - require_previous(previous, |r| r.stoch_d, "stoch_d")?,
        )
    } else {
        None
    };

    let label = |positive: bool| match (rule.mode, positive) {
        (SignalMode::State, true) => "stochastic %K above %D",
        (SignalMode::State, false) => "stochastic %K at or below %D",
        (SignalMode::Cross, true) => "stochastic %K crossed above %D",
        (SignalMode::Cross, false) => "stochastic %K crossed below %D",
    };

    match momentum_direction(rule.mode, spread, prev_spread) {
        Some(true) => score.push(RuleGroup::Momentum, label(true), rule.positive),
        Some(false) => score.push(RuleGroup::Momentum, label(false), rule.negative),
        None => {}
    }
    Ok(())
}

fn score_rsi(
    score: &mut SignalScore,
    rule: &RsiRule,
    latest: &IndicatorRow,
) -> Result<(), Report<AnalysisError>> {
    let rsi = require(latest.rsi, "rsi")?;
    if is_triggered(&Condition::Above(rule.overbought), rsi, None) {
        score.push(
            RuleGroup::Extremes,
            format!("RSI {rsi:.1} overheated (> {})", rule.overbought),
            rule.overbought_delta,
        );
    } else if is_triggered(&Condition::Below(rule.oversold), rsi, None) {
        score.push(
            RuleGroup::Extremes,
            format!("RSI {rsi:.1} oversold (< {})", rule.oversold),
            rule.oversold_delta,
        );
    }
    Ok(())
}

fn score_bollinger(
    score: &mut SignalScore,
    rule: &BollingerRule,
    latest: &IndicatorRow,
) -> Result<(), Report<AnalysisError>> {
    let upper = require(latest.bb_upper, "bb_upper")?;
    let lower = require(latest.bb_lower, "bb_lower")?;
    let close = latest.close();
    if is_triggered(&Condition::Above(upper), close, None) {
        score.push(
            RuleGroup::Extremes,
            "close above upper Bollinger band",
            rule.upper_breach,
        );
    } else if is_triggered(&Condition::Below(lower), close, None) {
        score.push(
            RuleGroup::Extremes,
            "close below lower Bollinger band",
            rule.lower_breach,
        );
    }
    Ok(())
}

fn score_fundamentals(
    score: &mut SignalScore,
    rule: &FundamentalsRule,
    latest: &IndicatorRow,
    profile: &Profile,
) {
    if let Some(pe) = profile.pe_ratio {
        if pe > 0.0 && pe < rule.cheap_pe {
            score.push(
                RuleGroup::Fundamentals,
                format!("P/E {pe:.1} below {}", rule.cheap_pe),
                rule.pe_delta,
            );
        } else if pe > rule.expensive_pe {
            score.push(
                RuleGroup::Fundamentals,
                format!("P/E {pe:.1} above {}", rule.expensive_pe),
                -rule.pe_delta,
            );
        }
    }
    if let Some(high) = profile.fifty_two_week_high
        && latest.close() >= rule.near_high_ratio * high
    {
        score.push(
            RuleGroup::Fundamentals,
            format!("close within {:.0}% of 52-week high", (1.0 - rule.near_high_ratio) * 100.0),
            rule.near_high_delta,
        );
    }
}

/// Score the latest row. `previous` is the row immediately before it and is
/// only read by `cross` rules.
pub fn score(
    latest: &IndicatorRow,
    previous: Option<&IndicatorRow>,
    profile: Option<&Profile>,
    config: &ScoringConfig,
) -> Result<SignalScore, Report<AnalysisError>> {
    let mut score = SignalScore::default();

    if config.trend.enabled {
        score_trend(&mut score, &config.trend, latest)?;
    }
    if config.macd.enabled {
        score_macd(&mut score, &config.macd, latest, previous)?;
    }
    if config.stochastic.enabled {
        score_stochastic(&mut score, &config.stochastic, latest, previous)?;
    }
    if config.rsi.enabled {
        score_rsi(&mut score, &config.rsi, latest)?;
    }
    if config.bollinger.enabled {
        score_bollinger(&mut score, &config.bollinger, latest)?;
    }
    if config.fundamentals.enabled
        && let Some(profile) = profile
    {
        score_fundamentals(&mut score, &config.fundamentals, latest, profile);
    }

    debug!(
        total = score.total,
        components = score.components.len(),
        "signal scored"
    );
    Ok(score)
}

/// Pick the first band whose `min` the total reaches.
pub fn classify(total: i32, labels: &[LabelBand]) -> Result<Verdict, Report<AnalysisError>> {
    let Some(band) = labels
        .iter()
        .find(|band| band.min.is_none_or(|min| total >= min))
    else {
        bail!(AnalysisError::InvalidParameter {
            name: format!("no label band covers score {total}"),
        });
    };
    Ok(Verdict {
        label: band.label.clone(),
        advice: band.advice.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{IndicatorConfig, compute};
    use crate::indicator::test_support::bars_from_closes;
    use crate::model::PriceSeries;

    fn row(close: f64) -> IndicatorRow {
        let bar = bars_from_closes(&[close])[0];
        IndicatorRow {
            sma_short: Some(close),
            sma_long: Some(close),
            ema_short: Some(close),
            ema_long: Some(close),
            bb_lower: Some(close - 10.0),
            bb_mid: Some(close),
            bb_upper: Some(close + 10.0),
            macd: Some(0.0),
            macd_hist: Some(0.0),
            macd_signal: Some(0.0),
            stoch_k: Some(50.0),
            stoch_d: Some(50.0),
            rsi: Some(50.0),
            ..IndicatorRow::bare(bar)
        }
    }

    fn only(config: ScoringConfig, keep: RuleGroup) -> ScoringConfig {
        ScoringConfig {
            trend: TrendRule {
                enabled: keep == RuleGroup::Trend,
                ..config.trend
            },
            macd: MomentumRule {
                enabled: false,
                ..config.macd
            },
            stochastic: MomentumRule {
                enabled: keep == RuleGroup::Momentum,
                ..config.stochastic
            },
            rsi: RsiRule {
                enabled: keep == RuleGroup::Extremes,
                ..config.rsi
            },
            bollinger: BollingerRule {
                enabled: false,
                ..config.bollinger
            },
            ..config
        }
    }

    fn group_components(score: &SignalScore, group: RuleGroup) -> Vec<&ScoreComponent> {
        score.components.iter().filter(|c| c.group == group).collect()
    }

    #[test]
    fn rising_series_fires_strong_trend_only() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let series = PriceSeries::new(bars_from_closes(&closes)).unwrap();
        let indicators = IndicatorConfig::default();
        let config = IndicatorConfig {
            sma: crate::engine::SmaParams {
                enabled: false,
                ..indicators.sma
            },
            macd: crate::engine::MacdParams {
                enabled: false,
                ..indicators.macd
            },
            ..indicators
        };
        let rows = compute(&series, &config).unwrap();
        let latest = rows.last().unwrap();
        assert!(latest.close() > latest.ema_short.unwrap());
        assert!(latest.ema_short.unwrap() > latest.ema_long.unwrap());

        let scoring = only(ScoringConfig::default(), RuleGroup::Trend);
        let score = score(latest, None, None, &scoring).unwrap();
        let trend = group_components(&score, RuleGroup::Trend);
        assert_eq!(trend.len(), 1);
        assert!(trend[0].label.starts_with("strong uptrend"));
        assert_eq!(trend[0].delta, 3);
    }

    #[test]
    fn trend_weak_and_negative_branches() {
        let scoring = only(ScoringConfig::default(), RuleGroup::Trend);

        let mut weak = row(100.0);
        weak.ema_short = Some(101.0);
        weak.ema_long = Some(99.0);
        let s = score(&weak, None, None, &scoring).unwrap();
        assert_eq!(s.total, 1);

        let mut negative = row(100.0);
        negative.ema_long = Some(100.0);
        let s = score(&negative, None, None, &scoring).unwrap();
        assert_eq!(s.total, -2);
        assert_eq!(s.components.len(), 1);
    }

    #[test]
    fn sma_basis_reads_sma_fields() {
        let mut scoring = only(ScoringConfig::default(), RuleGroup::Trend);
        scoring.trend.basis = TrendBasis::Sma;
        let mut r = row(100.0);
        r.ema_short = None;
        r.ema_long = None;
        r.sma_short = Some(95.0);
        r.sma_long = Some(90.0);
        let s = score(&r, None, None, &scoring).unwrap();
        assert_eq!(s.total, 3);
    }

    #[test]
    fn stochastic_cross_fires_once() {
        let mut scoring = only(ScoringConfig::default(), RuleGroup::Momentum);
        scoring.stochastic.mode = SignalMode::Cross;

        let with_k = |k: f64| IndicatorRow {
            stoch_k: Some(k),
            stoch_d: Some(30.0),
            ..row(100.0)
        };

        let crossing = score(&with_k(32.0), Some(&with_k(28.0)), None, &scoring).unwrap();
        assert_eq!(crossing.total, 1);
        assert_eq!(crossing.components.len(), 1);
        assert_eq!(crossing.components[0].label, "stochastic %K crossed above %D");

        let persisting = score(&with_k(33.0), Some(&with_k(32.0)), None, &scoring).unwrap();
        assert_eq!(persisting.total, 0);
        assert!(persisting.components.is_empty());
    }

    #[test]
    fn stochastic_state_mode_is_binary() {
        let scoring = only(ScoringConfig::default(), RuleGroup::Momentum);
        let above = IndicatorRow {
            stoch_k: Some(60.0),
            ..row(100.0)
        };
        assert_eq!(score(&above, None, None, &scoring).unwrap().total, 1);
        // equal K and D is not above
        assert_eq!(score(&row(100.0), None, None, &scoring).unwrap().total, -1);
    }

    #[test]
    fn macd_cross_requires_previous_row() {
        let mut scoring = ScoringConfig::default();
        scoring.macd.mode = SignalMode::Cross;
        let err = score(&row(100.0), None, None, &scoring).unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalysisError::IncompleteIndicators { .. }
        ));
    }

    #[test]
    fn macd_cross_down_fires_negative() {
        let mut scoring = ScoringConfig::default();
        scoring.trend.enabled = false;
        scoring.stochastic.enabled = false;
        scoring.rsi.enabled = false;
        scoring.bollinger.enabled = false;
        scoring.macd.mode = SignalMode::Cross;
        let prev = IndicatorRow {
            macd_hist: Some(0.5),
            ..row(100.0)
        };
        let latest = IndicatorRow {
            macd_hist: Some(-0.2),
            ..row(100.0)
        };
        let s = score(&latest, Some(&prev), None, &scoring).unwrap();
        assert_eq!(s.total, -2);
        assert_eq!(s.components[0].label, "MACD histogram turned negative");
    }

    #[test]
    fn rsi_overheated_is_strict() {
        let scoring = only(ScoringConfig::default(), RuleGroup::Extremes);
        let with_rsi = |rsi: f64| IndicatorRow {
            rsi: Some(rsi),
            ..row(100.0)
        };

        let hot = score(&with_rsi(76.0), None, None, &scoring).unwrap();
        assert_eq!(hot.total, -2);
        assert!(hot.components[0].label.contains("overheated"));

        assert!(score(&with_rsi(74.0), None, None, &scoring).unwrap().components.is_empty());
        assert!(score(&with_rsi(75.0), None, None, &scoring).unwrap().components.is_empty());

        let cold = score(&with_rsi(20.0), None, None, &scoring).unwrap();
        assert_eq!(cold.total, 2);
    }

    #[test]
    fn bollinger_breaches() {
        let mut scoring = ScoringConfig::default();
        scoring.trend.enabled = false;
        scoring.macd.enabled = false;
        scoring.stochastic.enabled = false;
        scoring.rsi.enabled = false;

        let above = IndicatorRow {
            bb_upper: Some(99.0),
            ..row(100.0)
        };
        assert_eq!(score(&above, None, None, &scoring).unwrap().total, -1);
        let below = IndicatorRow {
            bb_lower: Some(101.0),
            ..row(100.0)
        };
        assert_eq!(score(&below, None, None, &scoring).unwrap().total, 1);
        assert!(score(&row(100.0), None, None, &scoring).unwrap().components.is_empty());
    }

    #[test]
    fn missing_field_refuses_to_score() {
        let latest = IndicatorRow {
            rsi: None,
            ..row(100.0)
        };
        let err = score(&latest, None, None, &ScoringConfig::default()).unwrap_err();
        assert_eq!(
            *err.current_context(),
            AnalysisError::IncompleteIndicators {
                missing: "rsi".into()
            }
        );
    }

    #[test]
    fn fundamentals_use_profile_when_enabled() {
        let mut scoring = ScoringConfig::default();
        scoring.trend.enabled = false;
        scoring.macd.enabled = false;
        scoring.stochastic.enabled = false;
        scoring.rsi.enabled = false;
        scoring.bollinger.enabled = false;
        scoring.fundamentals.enabled = true;

        let profile = Profile {
            pe_ratio: Some(12.0),
            fifty_two_week_high: Some(102.0),
            ..Profile::default()
        };
        let s = score(&row(100.0), None, Some(&profile), &scoring).unwrap();
        assert_eq!(s.total, 2);
        assert!(s.components.iter().all(|c| c.group == RuleGroup::Fundamentals));

        let empty = score(&row(100.0), None, Some(&Profile::default()), &scoring).unwrap();
        assert_eq!(empty.total, 0);
        let none = score(&row(100.0), None, None, &scoring).unwrap();
        assert_eq!(none.total, 0);
    }

    #[test]
    fn total_is_sum_of_components() {
        let latest = IndicatorRow {
            macd_hist: Some(1.0),
            stoch_k: Some(70.0),
            rsi: Some(80.0),
            ..row(100.0)
        };
        let s = score(&latest, None, None, &ScoringConfig::default()).unwrap();
        let sum: i32 = s.components.iter().map(|c| c.delta).sum();
        assert_eq!(s.total, sum);
        let groups: Vec<RuleGroup> = s.components.iter().map(|c| c.group).collect();
        assert_eq!(
            groups,
            vec![
                RuleGroup::Trend,
                RuleGroup::Momentum,
                RuleGroup::Momentum,
                RuleGroup::Extremes
            ]
        );
    }

    #[test]
    fn classify_uses_descending_bands() {
        let labels = default_labels();
        assert_eq!(classify(9, &labels).unwrap().label, "strong bullish");
        assert_eq!(classify(5, &labels).unwrap().label, "strong bullish");
        assert_eq!(classify(4, &labels).unwrap().label, "bullish");
        assert_eq!(classify(-1, &labels).unwrap().label, "neutral");
        assert_eq!(classify(-4, &labels).unwrap().label, "bearish");
        assert_eq!(classify(-5, &labels).unwrap().label, "strong bearish");
    }

    #[test]
    fn classify_without_catch_all_fails() {
        let labels = vec![band(Some(0), "up", "")];
        assert!(classify(-1, &labels).is_err());
    }
}
