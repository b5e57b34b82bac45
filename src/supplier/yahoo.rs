use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SupplierError;
use crate::model::{ColumnLabel, Profile, RawRow, RawTable};
use crate::supplier::{HistoryQuery, PriceSupplier};

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const YAHOO_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUPPLIER: &str = "yahoo";
/// Yahoo rejects bare HTTP clients; present as a browser.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

pub struct YahooSupplier {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSupplier {
    /// `requests_per_second` caps the request rate across all concurrent
    /// fetches made through this supplier.
    pub fn new(requests_per_second: u32) -> Result<Self, Report<SupplierError>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .change_context(SupplierError::Request {
                supplier: SUPPLIER.into(),
            })?;
        let rate = std::num::NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(2u32));
        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, Report<SupplierError>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .change_context(SupplierError::Request {
                supplier: SUPPLIER.into(),
            })
            .attach_with(|| format!("url: {url}"))?;

        if !response.status().is_success() {
            return Err(Report::new(SupplierError::Request {
                supplier: SUPPLIER.into(),
            })
            .attach(format!("HTTP status: {}", response.status()))
            .attach(format!("url: {url}")));
        }

        response
            .json()
            .await
            .change_context(SupplierError::ResponseParse {
                supplier: SUPPLIER.into(),
            })
    }
}

fn midnight_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

impl PriceSupplier for YahooSupplier {
    fn name(&self) -> &str {
        SUPPLIER
    }

    fn fetch_history(
        &self,
        query: &HistoryQuery,
    ) -> BoxFuture<'_, Result<RawTable, Report<SupplierError>>> {
        let query = query.clone();
        Box::pin(async move {
            let (start, end) = query.resolved_range(Utc::now().date_naive());
            let url = format!("{YAHOO_CHART_URL}/{}", query.ticker);
            let params = [
                ("period1", midnight_epoch(start).to_string()),
                ("period2", midnight_epoch(end).to_string()),
                ("interval", query.interval.yahoo_interval().to_string()),
                ("events", "div,split".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ];

            debug!(ticker = %query.ticker, %start, %end, interval = %query.interval, "requesting chart");
            let response: ChartResponse = self.get(&url, &params).await?;
            let table = chart_to_table(&query.ticker, response, query.auto_adjust)?;

            info!(
                ticker = %query.ticker,
                interval = %query.interval,
                fetched = table.rows.len(),
                "yahoo history fetch complete"
            );
            Ok(table)
        })
    }

    fn fetch_profile(&self, ticker: &str) -> BoxFuture<'_, Result<Profile, Report<SupplierError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            let url = format!("{YAHOO_SUMMARY_URL}/{ticker}");
            let params = [("modules", "summaryProfile,summaryDetail".to_string())];
            let response: SummaryResponse = self.get(&url, &params).await?;
            let profile = summary_to_profile(&ticker, response)?;
            debug!(ticker = %ticker, ?profile, "yahoo profile fetch complete");
            Ok(profile)
        })
    }
}

// ── Chart API types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn parse_error(detail: String) -> Report<SupplierError> {
    Report::new(SupplierError::ResponseParse {
        supplier: SUPPLIER.into(),
    })
    .attach(detail)
}

/// Build a raw table from a chart response. Columns carry the ticker as a
/// second label level. With `auto_adjust` the OHLC prices are scaled by
/// `adjclose / close`; otherwise an `Adj Close` column is kept alongside.
fn chart_to_table(
    ticker: &str,
    response: ChartResponse,
    auto_adjust: bool,
) -> Result<RawTable, Report<SupplierError>> {
    if let Some(err) = response.chart.error {
        return Err(Report::new(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: ticker.into(),
        })
        .attach(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        bail!(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: ticker.into(),
        });
    };
    if result.timestamp.is_empty() {
        bail!(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: ticker.into(),
        });
    }

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let len = result.timestamp.len();
    let columns = [&quote.open, &quote.high, &quote.low, &quote.close, &quote.volume];
    if columns.iter().any(|c| c.len() != len) {
        return Err(parse_error(format!(
            "quote arrays do not match {len} timestamps"
        )));
    }

    let mut fields = vec!["Open", "High", "Low", "Close", "Volume"];
    if !auto_adjust {
        fields.push("Adj Close");
    }
    let labels = fields
        .into_iter()
        .map(|field| ColumnLabel::Compound {
            field: field.into(),
            ticker: ticker.into(),
        })
        .collect();

    let mut rows = Vec::with_capacity(len);
    for (i, &secs) in result.timestamp.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| parse_error(format!("timestamp out of range: {secs}")))?;
        let adj = adjclose.get(i).copied().flatten();

        let mut values = if auto_adjust {
            let factor = match (adj, quote.close[i]) {
                (Some(a), Some(c)) if c > 0.0 => a / c,
                _ => 1.0,
            };
            let scale = |v: Option<f64>| v.map(|x| x * factor);
            vec![
                scale(quote.open[i]),
                scale(quote.high[i]),
                scale(quote.low[i]),
                adj.or(quote.close[i]),
                quote.volume[i],
            ]
        } else {
            vec![
                quote.open[i],
                quote.high[i],
                quote.low[i],
                quote.close[i],
                quote.volume[i],
            ]
        };
        if !auto_adjust {
            values.push(adj);
        }

        rows.push(RawRow { timestamp, values });
    }

    Ok(RawTable {
        ticker: ticker.into(),
        labels,
        rows,
    })
}

// ── quoteSummary types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    summary_profile: Option<SummaryProfile>,
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Deserialize)]
struct SummaryProfile {
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    market_cap: Option<RawValue>,
    fifty_two_week_high: Option<RawValue>,
}

/// Yahoo wraps numbers as `{ "raw": 1.0, "fmt": "1.00" }`, or `{}` when unknown.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: Option<RawValue>) -> Option<f64> {
    value.and_then(|v| v.raw).filter(|v| v.is_finite())
}

fn summary_to_profile(
    ticker: &str,
    response: SummaryResponse,
) -> Result<Profile, Report<SupplierError>> {
    if let Some(err) = response.quote_summary.error {
        return Err(Report::new(SupplierError::NoData {
            supplier: SUPPLIER.into(),
            ticker: ticker.into(),
        })
        .attach(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = response
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
    else {
        return Ok(Profile::default());
    };

    let detail = result.summary_detail;
    let (pe_ratio, market_cap, fifty_two_week_high) = match detail {
        Some(d) => (
            raw(d.trailing_pe),
            raw(d.market_cap),
            raw(d.fifty_two_week_high),
        ),
        None => (None, None, None),
    };

    Ok(Profile {
        sector: result.summary_profile.and_then(|p| p.sector),
        pe_ratio,
        market_cap,
        fifty_two_week_high,
    })
}
