use crate::types::{AlertEvent, CycleSummary};

/// Emit a flagged transaction as a single JSON line to stdout.
pub fn report_alert(event: &AlertEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

/// Emit the counters of a finished polling cycle as a single JSON line to stdout.
pub fn report_cycle_summary(summary: &CycleSummary) {
    if let Ok(json) = serde_json::to_string(summary) {
        println!("{json}");
    }
}
