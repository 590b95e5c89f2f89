use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::PTR_PATH_MARKER;
use crate::types::{DisclosureReference, Outcome, TrackedSubject};

/// Portal lookup URL for one subject.
pub fn search_url(base: &str, subject: &TrackedSubject) -> Result<Url> {
    let mut url = Url::parse(base)
        .with_context(|| format!("invalid portal base {base}"))?
        .join("/PublicDisclosure/FinancialDisclosure")?;
    url.query_pairs_mut()
        .append_pair("LastName", &subject.last)
        .append_pair("FirstName", &subject.first);
    Ok(url)
}

/// Extract PTR document links from a portal results page.
///
/// Keeps anchors whose href contains the PTR path marker, resolved against
/// `base`. Document order is kept and repeats on the same page are dropped.
pub fn parse_ptr_links(
    html: &str,
    base: &Url,
    subject: &TrackedSubject,
) -> Result<Vec<DisclosureReference>> {
    let selector = Selector::parse("a[href]").map_err(|e| anyhow!("bad selector: {e}"))?;
    let document = Html::parse_document(html);

    let mut refs: Vec<DisclosureReference> = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains(PTR_PATH_MARKER) {
            continue;
        }
        let Ok(resolved) = base.join(href.trim()) else {
            debug!("Skipping unresolvable href {href}");
            continue;
        };
        let url = resolved.to_string();
        if refs.iter().any(|r| r.url == url) {
            continue;
        }
        refs.push(DisclosureReference {
            url,
            subject: subject.clone(),
        });
    }
    Ok(refs)
}

/// List the PTR documents the portal currently shows for `subject`.
///
/// Best effort: network or status errors come back as `Failed`, a page with
/// no PTR links as `Empty`. No retry; the next poll sees the same list.
pub async fn fetch_disclosures(
    client: &Client,
    base: &str,
    subject: &TrackedSubject,
) -> Outcome<Vec<DisclosureReference>> {
    match try_fetch_disclosures(client, base, subject).await {
        Ok(refs) => {
            debug!("Portal lists {} PTR(s) for {}", refs.len(), subject.name);
            Outcome::from_items(refs)
        }
        Err(e) => Outcome::Failed(format!("{e:#}")),
    }
}

async fn try_fetch_disclosures(
    client: &Client,
    base: &str,
    subject: &TrackedSubject,
) -> Result<Vec<DisclosureReference>> {
    let url = search_url(base, subject)?;
    let body = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("portal request failed for {}", subject.name))?
        .error_for_status()?
        .text()
        .await
        .context("failed to read portal response")?;
    parse_ptr_links(&body, &url, subject)
}
