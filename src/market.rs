use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::types::{Outcome, PriceBar};

/// Error code the chart API uses for unknown or delisted symbols.
const NOT_FOUND_CODE: &str = "Not Found";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Parallel per-day arrays; the API emits `null` for missing sessions.
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// One year of daily bars for `ticker`.
pub fn chart_url(base: &str, ticker: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid market base {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("market base {base} cannot take a path"))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", ticker]);
    url.query_pairs_mut()
        .append_pair("range", "1y")
        .append_pair("interval", "1d");
    Ok(url)
}

/// Decode a chart API response into bars, oldest first.
///
/// Days with any missing field are dropped. A `Not Found` error payload is
/// an empty series, not an error.
pub fn parse_chart(body: &str) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).context("failed to parse chart response")?;
    let chart = envelope.chart;

    if let Some(err) = chart.error {
        if err.code == NOT_FOUND_CODE {
            return Ok(Vec::new());
        }
        bail!(
            "chart API error {}: {}",
            err.code,
            err.description.unwrap_or_default()
        );
    }

    let Some(result) = chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(PriceBar {
                timestamp: DateTime::<Utc>::from_timestamp(ts, 0)?,
                open: quote.open.get(i).copied().flatten()?,
                high: quote.high.get(i).copied().flatten()?,
                low: quote.low.get(i).copied().flatten()?,
                close: quote.close.get(i).copied().flatten()?,
            })
        })
        .collect();
    Ok(bars)
}

/// Fetch one year of daily history for `ticker`.
///
/// Unknown tickers (HTTP 404 or no bars) are `Empty`; transport and format
/// errors are `Failed`.
pub async fn fetch_price_history(
    client: &Client,
    base: &str,
    ticker: &str,
) -> Outcome<Vec<PriceBar>> {
    match try_fetch_history(client, base, ticker).await {
        Ok(bars) => {
            debug!("Fetched {} bar(s) for {ticker}", bars.len());
            Outcome::from_items(bars)
        }
        Err(e) => Outcome::Failed(format!("{e:#}")),
    }
}

async fn try_fetch_history(client: &Client, base: &str, ticker: &str) -> Result<Vec<PriceBar>> {
    let url = chart_url(base, ticker)?;
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("market request failed for {ticker}"))?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    let body = resp
        .error_for_status()?
        .text()
        .await
        .context("failed to read market response")?;
    parse_chart(&body)
}
