//! Transaction extraction from PTR documents.
//!
//! PTR documents are table-like: each transaction's amount range and ticker
//! usually share a line. Extraction is a line heuristic, not a parse:
//!
//! - the first `$<low> - $<high>` range on a line gives the midpoint;
//! - the rightmost whole-word token of 1-5 uppercase letters on the same
//!   line is taken as the ticker, since the ticker column trails the amount
//!   column in the House layout;
//! - a line without both yields nothing.
//!
//! Header words and owner codes (`SP`, `JT`) can be mistaken for tickers,
//! and transactions wrapped over several lines are missed. Both are accepted.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use crate::types::{DisclosureReference, Outcome, TransactionRecord};

static AMOUNT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\d[\d,]*)\s*-\s*\$(\d[\d,]*)").expect("valid amount regex")
});

static TICKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{1,5}\b").expect("valid ticker regex")
});

/// Extract every transaction found in `text`, in line order.
pub fn parse_transactions(text: &str) -> Vec<TransactionRecord> {
    text.lines().filter_map(parse_line).collect()
}

/// One record for `line`, or `None` when amount or ticker is missing.
pub fn parse_line(line: &str) -> Option<TransactionRecord> {
    let caps = AMOUNT_RANGE.captures(line)?;
    let low = parse_amount(&caps[1])?;
    let high = parse_amount(&caps[2])?;
    let midpoint = (low as f64 + high as f64) / 2.0;

    let ticker = TICKER.find_iter(line).last()?.as_str();
    Some(TransactionRecord {
        ticker: ticker.to_string(),
        midpoint,
    })
}

/// `"50,000"` -> `50000`. Values beyond `u64` are rejected.
fn parse_amount(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

/// Plain text of a retrieved document, line breaks preserved.
///
/// PDF bytes go through the PDF text extractor (pages in order); anything
/// else must be UTF-8 text.
pub fn document_text(bytes: &[u8]) -> Result<String> {
    if bytes.starts_with(b"%PDF") {
        return pdf_extract::extract_text_from_mem(bytes).context("failed to extract PDF text");
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(e) => bail!("document is neither PDF nor UTF-8 text: {e}"),
    }
}

/// Download a disclosure document and extract its transactions.
///
/// Never fails the caller: retrieval or decode problems are `Failed`, a
/// document without recognizable transactions is `Empty`.
pub async fn extract_transactions(
    client: &Client,
    reference: &DisclosureReference,
) -> Outcome<Vec<TransactionRecord>> {
    match try_extract(client, &reference.url).await {
        Ok(records) => {
            debug!(
                "Extracted {} transaction(s) from {}",
                records.len(),
                reference.url
            );
            Outcome::from_items(records)
        }
        Err(e) => Outcome::Failed(format!("{e:#}")),
    }
}

async fn try_extract(client: &Client, url: &str) -> Result<Vec<TransactionRecord>> {
    let bytes = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("document request failed for {url}"))?
        .error_for_status()?
        .bytes()
        .await
        .context("failed to read document body")?;

    // PDF parsing is CPU-bound; keep it off the async workers.
    let text = tokio::task::spawn_blocking(move || document_text(&bytes))
        .await
        .context("text extraction task panicked")??;
    Ok(parse_transactions(&text))
}
