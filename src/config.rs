use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::analyzer::Thresholds;
use crate::types::TrackedSubject;
use crate::{MARKET_API_BASE, PORTAL_BASE};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable that overrides `alert.webhook_url`.
pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub subjects: Vec<TrackedSubject>,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub alert: AlertConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Sleep between polling cycles, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Per-request timeout for every outbound HTTP call.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// JSON file holding already-processed document URLs.
    #[serde(default = "default_seen_path")]
    pub seen_path: PathBuf,
    #[serde(default = "default_portal_base")]
    pub portal_base: String,
    #[serde(default = "default_market_base")]
    pub market_base: String,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10
}

fn default_seen_path() -> PathBuf {
    PathBuf::from("seen.json")
}

fn default_portal_base() -> String {
    PORTAL_BASE.to_string()
}

fn default_market_base() -> String {
    MARKET_API_BASE.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            http_timeout_secs: default_http_timeout(),
            seen_path: default_seen_path(),
            portal_base: default_portal_base(),
            market_base: default_market_base(),
        }
    }
}

/// Alert delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Discord-style webhook. Alerts only go to stdout when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        Ok(config)
    }

    /// Replace the webhook with `value` when it is set and non-blank.
    pub fn apply_webhook_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            self.alert.webhook_url = Some(url);
        }
    }

    /// Reject settings the poll loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.subjects.is_empty() {
            bail!("config must list at least one [[subjects]] entry");
        }
        for subject in &self.subjects {
            if subject.first.trim().is_empty() || subject.last.trim().is_empty() {
                bail!("subject '{}' needs both first and last name", subject.name);
            }
        }
        if self.settings.poll_interval_secs == 0 {
            bail!("settings.poll_interval_secs must be positive");
        }
        if self.settings.http_timeout_secs == 0 {
            bail!("settings.http_timeout_secs must be positive");
        }
        let t = &self.thresholds;
        if t.large_trade_usd < 0.0 || t.cheap_price_usd < 0.0 || t.volatility_ratio < 0.0 {
            bail!("thresholds must be non-negative");
        }
        Ok(())
    }
}
