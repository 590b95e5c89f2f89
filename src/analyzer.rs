use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::market::fetch_price_history;
use crate::types::{Outcome, PriceBar, SpikeReason, SpikeVerdict};

/// Flagging thresholds, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Midpoint at or above which a trade is a large cash move.
    #[serde(default = "default_large_trade")]
    pub large_trade_usd: f64,
    /// Latest close at or below which a stock counts as cheap.
    #[serde(default = "default_cheap_price")]
    pub cheap_price_usd: f64,
    /// `(year high - year low) / latest close` at or above which a stock counts as volatile.
    #[serde(default = "default_volatility")]
    pub volatility_ratio: f64,
}

fn default_large_trade() -> f64 {
    150_000.0
}

fn default_cheap_price() -> f64 {
    20.0
}

fn default_volatility() -> f64 {
    0.60
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            large_trade_usd: default_large_trade(),
            cheap_price_usd: default_cheap_price(),
            volatility_ratio: default_volatility(),
        }
    }
}

/// Summary of a year of daily bars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub latest_close: f64,
    pub year_high: f64,
    pub year_low: f64,
}

impl PriceStats {
    /// `None` for an empty series. Bars are expected oldest first.
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        let latest_close = bars.last()?.close;
        let year_high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let year_low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        Some(Self {
            latest_close,
            year_high,
            year_low,
        })
    }

    /// Year range relative to the latest close. `None` without a positive close.
    pub fn volatility_range(&self) -> Option<f64> {
        if self.latest_close > 0.0 {
            Some((self.year_high - self.year_low) / self.latest_close)
        } else {
            None
        }
    }
}

/// Apply the three rules. Any single rule is enough to flag.
pub fn evaluate(midpoint: f64, stats: &PriceStats, thresholds: &Thresholds) -> SpikeVerdict {
    let mut reasons = Vec::new();

    if midpoint >= thresholds.large_trade_usd {
        reasons.push(SpikeReason::LargeCashMove);
    }
    if stats.latest_close <= thresholds.cheap_price_usd {
        reasons.push(SpikeReason::CheapStock);
    }
    if stats
        .volatility_range()
        .is_some_and(|range| range >= thresholds.volatility_ratio)
    {
        reasons.push(SpikeReason::HighVolatility);
    }

    SpikeVerdict { reasons }
}

/// Verdict for a series; an empty series never flags.
pub fn evaluate_history(midpoint: f64, bars: &[PriceBar], thresholds: &Thresholds) -> SpikeVerdict {
    match PriceStats::from_bars(bars) {
        Some(stats) => evaluate(midpoint, &stats, thresholds),
        None => SpikeVerdict::quiet(),
    }
}

/// Fetch history for `ticker` and judge a trade of `midpoint` dollars.
///
/// Fails closed: unknown tickers and provider errors give a quiet verdict.
pub async fn analyze(
    client: &Client,
    market_base: &str,
    ticker: &str,
    midpoint: f64,
    thresholds: &Thresholds,
) -> SpikeVerdict {
    match fetch_price_history(client, market_base, ticker).await {
        Outcome::Found(bars) => evaluate_history(midpoint, &bars, thresholds),
        Outcome::Empty => {
            debug!("No market data for {ticker}");
            SpikeVerdict::quiet()
        }
        Outcome::Failed(reason) => {
            warn!("Market data unavailable for {ticker}: {reason}");
            SpikeVerdict::quiet()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use chrono::{DateTime, Utc};

    fn bar(day: i64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: DateTime::<Utc>::from_timestamp(1_704_067_200 + day * 86_400, 0).unwrap(),
            open: close,
            high,
            low,
            close,
        }
    }

    fn stats(latest_close: f64, year_high: f64, year_low: f64) -> PriceStats {
        PriceStats {
            latest_close,
            year_high,
            year_low,
        }
    }

    #[test]
    fn stats_from_bars() {
        let bars = vec![
            bar(0, 120.0, 100.0, 110.0),
            bar(1, 180.0, 130.0, 150.0),
            bar(2, 105.0, 101.0, 100.0),
        ];
        let s = PriceStats::from_bars(&bars).unwrap();
        assert_eq!(s, stats(100.0, 180.0, 100.0));
        assert!((s.volatility_range().unwrap() - 0.80).abs() < 1e-12);
        assert!(PriceStats::from_bars(&[]).is_none());
    }

    #[test]
    fn high_volatility() {
        let t = Thresholds::default();
        let v = evaluate(10_000.0, &stats(100.0, 180.0, 100.0), &t);
        assert_eq!(v.reasons, vec![SpikeReason::HighVolatility]);
        assert!(v.flag());
    }

    #[test]
    fn large_cash_move_regardless_of_price() {
        let t = Thresholds::default();
        let v = evaluate(200_000.0, &stats(500.0, 510.0, 490.0), &t);
        assert_eq!(v.reasons, vec![SpikeReason::LargeCashMove]);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = Thresholds::default();
        let v = evaluate(150_000.0, &stats(20.0, 32.0, 20.0), &t);
        assert_eq!(
            v.reasons,
            vec![
                SpikeReason::LargeCashMove,
                SpikeReason::CheapStock,
                SpikeReason::HighVolatility,
            ]
        );
    }

    #[test]
    fn calm_trade_is_quiet() {
        let t = Thresholds::default();
        let v = evaluate(8_000.5, &stats(190.0, 200.0, 160.0), &t);
        assert!(!v.flag());
        assert!(v.reasons.is_empty());
    }

    #[test]
    fn empty_history_never_flags() {
        let t = Thresholds {
            large_trade_usd: 0.0,
            cheap_price_usd: 1e9,
            volatility_ratio: 0.0,
        };
        assert_eq!(evaluate_history(1e12, &[], &t), SpikeVerdict::quiet());
    }

    #[test]
    fn zero_close_skips_volatility() {
        let t = Thresholds::default();
        let v = evaluate(0.0, &stats(0.0, 5.0, 0.0), &t);
        assert_eq!(v.reasons, vec![SpikeReason::CheapStock]);
    }

    #[tokio::test]
    async fn unreachable_market_is_quiet() {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        // Every rule would fire if history came back.
        let t = Thresholds {
            large_trade_usd: 0.0,
            cheap_price_usd: 1e9,
            volatility_ratio: 0.0,
        };
        let v = analyze(&client, "http://127.0.0.1:9", "ACME", 1e12, &t).await;
        assert_eq!(v, SpikeVerdict::quiet());
    }
}
