use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::types::AlertEvent;

/// Render an alert as the chat message posted to the webhook.
pub fn format_alert(event: &AlertEvent) -> String {
    let reasons: Vec<&str> = event.reasons.iter().map(|r| r.label()).collect();
    format!(
        "📈 **Spiky Move Detected**\n\
         Politician: {}\n\
         Ticker: {}\n\
         Midpoint: {}\n\
         Reasons: {}\n\
         Source: {}",
        event.politician,
        event.ticker,
        format_usd(event.midpoint),
        reasons.join(", "),
        event.source,
    )
}

/// Whole dollars with thousands separators: `75000.5` -> `$75,000`.
///
/// Rounds half to even, so `$1,001 - $15,000` renders as `$8,000`.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round_ties_even().max(0.0) as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Posts alerts to a Discord-style webhook (`{"content": "..."}`).
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: String,
}

impl Notifier {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    pub async fn send(&self, event: &AlertEvent) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(&json!({ "content": format_alert(event) }))
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected alert")?;
        Ok(())
    }
}
