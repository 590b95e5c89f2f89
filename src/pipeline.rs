use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::USER_AGENT;
use crate::alert::Notifier;
use crate::analyzer::{self, Thresholds};
use crate::config::AppConfig;
use crate::extract;
use crate::portal;
use crate::reporter;
use crate::store::SeenStore;
use crate::types::{
    AlertEvent, CycleSummary, DisclosureReference, Outcome, SpikeVerdict, TrackedSubject,
    TransactionRecord,
};

/// Upstream services a polling cycle talks to.
#[allow(async_fn_in_trait)]
pub trait Collaborators {
    async fn list_disclosures(
        &self,
        subject: &TrackedSubject,
    ) -> Outcome<Vec<DisclosureReference>>;

    async fn extract(&self, reference: &DisclosureReference) -> Outcome<Vec<TransactionRecord>>;

    async fn analyze(&self, record: &TransactionRecord) -> SpikeVerdict;

    /// Deliver one alert. Errors are logged by the caller and never retried.
    async fn dispatch(&self, event: &AlertEvent) -> Result<()>;
}

/// Collaborators backed by the real portal, market API and webhook.
pub struct LiveCollaborators {
    client: Client,
    portal_base: String,
    market_base: String,
    thresholds: Thresholds,
    notifier: Option<Notifier>,
}

impl LiveCollaborators {
    /// Build the shared HTTP client and the optional webhook notifier.
    ///
    /// With `dry_run` or no webhook configured, alerts only reach stdout.
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.settings.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        let notifier = match (&config.alert.webhook_url, dry_run) {
            (Some(url), false) => Some(Notifier::new(client.clone(), url.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            portal_base: config.settings.portal_base.clone(),
            market_base: config.settings.market_base.clone(),
            thresholds: config.thresholds,
            notifier,
        })
    }

    pub fn delivers_alerts(&self) -> bool {
        self.notifier.is_some()
    }
}

impl Collaborators for LiveCollaborators {
    async fn list_disclosures(
        &self,
        subject: &TrackedSubject,
    ) -> Outcome<Vec<DisclosureReference>> {
        portal::fetch_disclosures(&self.client, &self.portal_base, subject).await
    }

    async fn extract(&self, reference: &DisclosureReference) -> Outcome<Vec<TransactionRecord>> {
        extract::extract_transactions(&self.client, reference).await
    }

    async fn analyze(&self, record: &TransactionRecord) -> SpikeVerdict {
        analyzer::analyze(
            &self.client,
            &self.market_base,
            &record.ticker,
            record.midpoint,
            &self.thresholds,
        )
        .await
    }

    async fn dispatch(&self, event: &AlertEvent) -> Result<()> {
        match &self.notifier {
            Some(notifier) => notifier.send(event).await,
            None => Ok(()),
        }
    }
}

/// Run one polling cycle.
///
/// Discovery for every subject runs first and the seen set is flushed before
/// any document is downloaded. A failure in one subject, document or
/// transaction is logged and counted; it never stops the rest of the cycle.
pub async fn run_cycle<C: Collaborators>(
    subjects: &[TrackedSubject],
    store: &mut SeenStore,
    collaborators: &C,
) -> CycleSummary {
    let mut summary = CycleSummary::default();

    // --- Discovery ---
    let mut fresh: Vec<DisclosureReference> = Vec::new();
    for subject in subjects {
        summary.subjects_polled += 1;
        match collaborators.list_disclosures(subject).await {
            Outcome::Found(refs) => {
                summary.references_listed += refs.len() as u64;
                for reference in refs {
                    if store.insert(&reference.url) {
                        fresh.push(reference);
                    }
                }
            }
            Outcome::Empty => {
                info!("No PTRs listed for {}", subject.name);
            }
            Outcome::Failed(reason) => {
                summary.subjects_failed += 1;
                warn!("Disclosure lookup failed for {}: {reason}", subject.name);
            }
        }
    }
    summary.new_references = fresh.len() as u64;

    // --- Flush ---
    if !fresh.is_empty() {
        if let Err(e) = store.save() {
            warn!("Failed to persist seen set: {e:#}");
        }
        info!("Found {} new PTR(s)", fresh.len());
    } else {
        info!("No new PTRs");
    }
    summary.seen_total = store.len() as u64;

    // --- Extraction and analysis ---
    for reference in &fresh {
        let records = match collaborators.extract(reference).await {
            Outcome::Found(records) => records,
            Outcome::Empty => {
                info!("No transactions recognized in {}", reference.url);
                continue;
            }
            Outcome::Failed(reason) => {
                summary.documents_failed += 1;
                warn!("Extraction failed for {}: {reason}", reference.url);
                continue;
            }
        };

        for record in &records {
            summary.transactions += 1;
            let verdict = collaborators.analyze(record).await;
            if !verdict.flag() {
                continue;
            }

            let event = AlertEvent {
                timestamp: chrono::Utc::now().to_rfc3339(),
                politician: reference.subject.name.clone(),
                ticker: record.ticker.clone(),
                midpoint: record.midpoint,
                reasons: verdict.reasons,
                source: reference.url.clone(),
            };
            info!(
                "Flagged {} {} ({})",
                event.politician,
                event.ticker,
                event
                    .reasons
                    .iter()
                    .map(|r| r.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            reporter::report_alert(&event);
            summary.alerts += 1;

            if let Err(e) = collaborators.dispatch(&event).await {
                summary.alerts_undelivered += 1;
                warn!("Failed to deliver alert for {}: {e:#}", event.ticker);
            }
        }
    }

    summary.timestamp = chrono::Utc::now().to_rfc3339();
    summary
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::types::SpikeReason;

    fn subject(name: &str) -> TrackedSubject {
        let (first, last) = name.split_once(' ').unwrap();
        TrackedSubject {
            name: name.into(),
            first: first.into(),
            last: last.into(),
        }
    }

    fn reference(url: &str, subject: &TrackedSubject) -> DisclosureReference {
        DisclosureReference {
            url: url.into(),
            subject: subject.clone(),
        }
    }

    fn record(ticker: &str, midpoint: f64) -> TransactionRecord {
        TransactionRecord {
            ticker: ticker.into(),
            midpoint,
        }
    }

    /// Scripted upstream. Records every call so tests can check ordering.
    #[derive(Default)]
    struct FakeUpstream {
        listings: HashMap<String, Outcome<Vec<DisclosureReference>>>,
        documents: HashMap<String, Outcome<Vec<TransactionRecord>>>,
        flagged: HashMap<String, Vec<SpikeReason>>,
        fail_dispatch: bool,
        /// Seen file checked on every extract call.
        seen_path: Option<PathBuf>,
        extracted: RefCell<Vec<String>>,
        persisted_at_extract: RefCell<Vec<bool>>,
        dispatched: RefCell<Vec<AlertEvent>>,
    }

    impl Collaborators for FakeUpstream {
        async fn list_disclosures(
            &self,
            subject: &TrackedSubject,
        ) -> Outcome<Vec<DisclosureReference>> {
            self.listings
                .get(&subject.name)
                .cloned()
                .unwrap_or(Outcome::Empty)
        }

        async fn extract(
            &self,
            reference: &DisclosureReference,
        ) -> Outcome<Vec<TransactionRecord>> {
            self.extracted.borrow_mut().push(reference.url.clone());
            if let Some(path) = &self.seen_path {
                let persisted = SeenStore::load(path).contains(&reference.url);
                self.persisted_at_extract.borrow_mut().push(persisted);
            }
            self.documents
                .get(&reference.url)
                .cloned()
                .unwrap_or(Outcome::Empty)
        }

        async fn analyze(&self, record: &TransactionRecord) -> SpikeVerdict {
            SpikeVerdict {
                reasons: self.flagged.get(&record.ticker).cloned().unwrap_or_default(),
            }
        }

        async fn dispatch(&self, event: &AlertEvent) -> Result<()> {
            if self.fail_dispatch {
                anyhow::bail!("webhook down");
            }
            self.dispatched.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn same_listing_twice_alerts_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let pelosi = subject("Nancy Pelosi");

        let mut upstream = FakeUpstream::default();
        upstream.listings.insert(
            pelosi.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/1.pdf", &pelosi)]),
        );
        upstream.documents.insert(
            "https://h/ptr-pdfs/1.pdf".into(),
            Outcome::Found(vec![record("NVDA", 3_000_000.5)]),
        );
        upstream
            .flagged
            .insert("NVDA".into(), vec![SpikeReason::LargeCashMove]);

        let subjects = vec![pelosi];
        let mut store = SeenStore::load(&path);
        let first = run_cycle(&subjects, &mut store, &upstream).await;
        let second = run_cycle(&subjects, &mut store, &upstream).await;

        assert_eq!(first.alerts, 1);
        assert_eq!(second.new_references, 0);
        assert_eq!(second.alerts, 0);
        assert_eq!(upstream.dispatched.borrow().len(), 1);

        // A restart with the persisted file also sees nothing new.
        let mut reloaded = SeenStore::load(&path);
        let third = run_cycle(&subjects, &mut reloaded, &upstream).await;
        assert_eq!(third.alerts, 0);
        assert_eq!(upstream.extracted.borrow().len(), 1);
    }

    #[tokio::test]
    async fn seen_set_is_flushed_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let a = subject("Nancy Pelosi");
        let b = subject("Tommy Tuberville");

        let mut upstream = FakeUpstream {
            seen_path: Some(path.clone()),
            ..Default::default()
        };
        upstream.listings.insert(
            a.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/a.pdf", &a)]),
        );
        upstream.listings.insert(
            b.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/b.pdf", &b)]),
        );

        let mut store = SeenStore::load(&path);
        run_cycle(&[a, b], &mut store, &upstream).await;

        assert_eq!(*upstream.persisted_at_extract.borrow(), vec![true, true]);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let down = subject("Dan Crenshaw");
        let up = subject("Nancy Pelosi");

        let mut upstream = FakeUpstream {
            fail_dispatch: true,
            ..Default::default()
        };
        upstream
            .listings
            .insert(down.name.clone(), Outcome::Failed("timeout".into()));
        upstream.listings.insert(
            up.name.clone(),
            Outcome::Found(vec![
                reference("https://h/ptr-pdfs/broken.pdf", &up),
                reference("https://h/ptr-pdfs/ok.pdf", &up),
            ]),
        );
        upstream.documents.insert(
            "https://h/ptr-pdfs/broken.pdf".into(),
            Outcome::Failed("not a pdf".into()),
        );
        upstream.documents.insert(
            "https://h/ptr-pdfs/ok.pdf".into(),
            Outcome::Found(vec![record("AAPL", 8_000.5), record("ACME", 75_000.0)]),
        );
        upstream
            .flagged
            .insert("ACME".into(), vec![SpikeReason::CheapStock]);

        let mut store = SeenStore::load(dir.path().join("seen.json"));
        let summary = run_cycle(&[down, up], &mut store, &upstream).await;

        assert_eq!(summary.subjects_polled, 2);
        assert_eq!(summary.subjects_failed, 1);
        assert_eq!(summary.new_references, 2);
        assert_eq!(summary.documents_failed, 1);
        assert_eq!(summary.transactions, 2);
        assert_eq!(summary.alerts, 1);
        assert_eq!(summary.alerts_undelivered, 1);
        // Failed documents are still marked seen.
        assert!(store.contains("https://h/ptr-pdfs/broken.pdf"));
    }

    #[tokio::test]
    async fn shared_document_across_subjects_processed_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = subject("Nancy Pelosi");
        let b = subject("Paul Pelosi");

        let mut upstream = FakeUpstream::default();
        upstream.listings.insert(
            a.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/joint.pdf", &a)]),
        );
        upstream.listings.insert(
            b.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/joint.pdf", &b)]),
        );
        upstream.documents.insert(
            "https://h/ptr-pdfs/joint.pdf".into(),
            Outcome::Found(vec![record("TSLA", 175_000.5)]),
        );
        upstream.flagged.insert(
            "TSLA".into(),
            vec![SpikeReason::LargeCashMove, SpikeReason::HighVolatility],
        );

        let mut store = SeenStore::load(dir.path().join("seen.json"));
        let summary = run_cycle(&[a, b], &mut store, &upstream).await;

        assert_eq!(summary.references_listed, 2);
        assert_eq!(summary.new_references, 1);
        let dispatched = upstream.dispatched.borrow();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].politician, "Nancy Pelosi");
        assert_eq!(dispatched[0].midpoint, 175_000.5);
        assert_eq!(
            dispatched[0].reasons,
            vec![SpikeReason::LargeCashMove, SpikeReason::HighVolatility]
        );
    }

    #[tokio::test]
    async fn quiet_verdicts_raise_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let s = subject("Nancy Pelosi");
        let mut upstream = FakeUpstream::default();
        upstream.listings.insert(
            s.name.clone(),
            Outcome::Found(vec![reference("https://h/ptr-pdfs/q.pdf", &s)]),
        );
        upstream.documents.insert(
            "https://h/ptr-pdfs/q.pdf".into(),
            Outcome::Found(vec![record("ZZZZZ", 1_000.0)]),
        );

        let mut store = SeenStore::load(dir.path().join("seen.json"));
        let summary = run_cycle(&[s], &mut store, &upstream).await;
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.alerts, 0);
        assert!(upstream.dispatched.borrow().is_empty());
    }

    #[test]
    fn dry_run_disables_delivery() {
        let mut config = AppConfig::from_toml(
            "[[subjects]]\nname = \"Nancy Pelosi\"\nfirst = \"Nancy\"\nlast = \"Pelosi\"\n",
        )
        .unwrap();
        config.alert.webhook_url = Some("https://hooks.example/x".into());

        let live = LiveCollaborators::from_config(&config, false).unwrap();
        assert!(live.delivers_alerts());
        let dry = LiveCollaborators::from_config(&config, true).unwrap();
        assert!(!dry.delivers_alerts());

        config.alert.webhook_url = None;
        let silent = LiveCollaborators::from_config(&config, false).unwrap();
        assert!(!silent.delivers_alerts());
    }
}
