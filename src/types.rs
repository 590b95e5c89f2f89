use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A politician whose filings are monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSubject {
    /// Display name used in alerts.
    pub name: String,
    pub first: String,
    pub last: String,
}

/// One disclosure document listed by the portal. The URL is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureReference {
    pub url: String,
    pub subject: TrackedSubject,
}

/// A single trade pulled out of a disclosure document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub ticker: String,
    /// Midpoint of the disclosed dollar range.
    pub midpoint: f64,
}

/// Why a transaction was flagged. Declared in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SpikeReason {
    #[serde(rename = "LARGE CASH MOVE")]
    LargeCashMove,
    #[serde(rename = "CHEAP STOCK")]
    CheapStock,
    #[serde(rename = "HIGH VOLATILITY")]
    HighVolatility,
}

impl SpikeReason {
    pub fn label(self) -> &'static str {
        match self {
            SpikeReason::LargeCashMove => "LARGE CASH MOVE",
            SpikeReason::CheapStock => "CHEAP STOCK",
            SpikeReason::HighVolatility => "HIGH VOLATILITY",
        }
    }
}

impl fmt::Display for SpikeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of the spike heuristic for one transaction.
///
/// The flag is derived from the reasons, so a flagged verdict always
/// carries at least one reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpikeVerdict {
    pub reasons: Vec<SpikeReason>,
}

impl SpikeVerdict {
    /// Verdict that never flags.
    pub fn quiet() -> Self {
        Self::default()
    }

    pub fn flag(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// One daily bar of market history.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Tagged result of a best-effort upstream operation.
///
/// `Empty` is a normal "nothing there" answer; `Failed` carries the reason
/// the upstream could not be read. Neither aborts a polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Found(T),
    Empty,
    Failed(String),
}

impl<T> Outcome<Vec<T>> {
    /// `Found` for a non-empty list, `Empty` otherwise.
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Found(items)
        }
    }
}

/// A flagged transaction, ready to be reported and dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub timestamp: String,
    pub politician: String,
    pub ticker: String,
    pub midpoint: f64,
    pub reasons: Vec<SpikeReason>,
    pub source: String,
}

/// Counters for one polling cycle, emitted as a JSON line after it completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub timestamp: String,
    pub subjects_polled: u64,
    pub subjects_failed: u64,
    pub references_listed: u64,
    pub new_references: u64,
    pub documents_failed: u64,
    pub transactions: u64,
    pub alerts: u64,
    pub alerts_undelivered: u64,
    pub seen_total: u64,
}
