//! Probe: market history and spike verdict
//!
//! Fetches one year of daily bars for a ticker and prints the series
//! bounds, the derived price stats, and the verdict a trade of the given
//! midpoint would get under the default (or overridden) thresholds.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use reqwest::Client;

use ptr_watch::analyzer::{PriceStats, Thresholds, evaluate};
use ptr_watch::market::{chart_url, fetch_price_history};
use ptr_watch::types::Outcome;
use ptr_watch::{MARKET_API_BASE, USER_AGENT};

#[derive(Parser)]
#[command(name = "probe_quotes", about = "Market history and spike verdict")]
struct Args {
    ticker: String,

    /// Trade midpoint in USD
    #[arg(long, default_value_t = 0.0)]
    midpoint: f64,

    #[arg(long)]
    large_trade_usd: Option<f64>,

    #[arg(long)]
    cheap_price_usd: Option<f64>,

    #[arg(long)]
    volatility_ratio: Option<f64>,

    #[arg(long, default_value = MARKET_API_BASE)]
    market_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()?;

    let defaults = Thresholds::default();
    let thresholds = Thresholds {
        large_trade_usd: args.large_trade_usd.unwrap_or(defaults.large_trade_usd),
        cheap_price_usd: args.cheap_price_usd.unwrap_or(defaults.cheap_price_usd),
        volatility_ratio: args.volatility_ratio.unwrap_or(defaults.volatility_ratio),
    };

    println!("=== Probe: market history ===");
    println!("URL: {}", chart_url(&args.market_base, &args.ticker)?);

    let start = Instant::now();
    let outcome = fetch_price_history(&client, &args.market_base, &args.ticker).await;
    println!("Latency: {:?}", start.elapsed());

    let bars = match outcome {
        Outcome::Found(bars) => bars,
        Outcome::Empty => {
            println!("No data (unknown or delisted ticker)");
            return Ok(());
        }
        Outcome::Failed(reason) => {
            println!("Fetch failed: {reason}");
            return Ok(());
        }
    };

    println!("Bars: {}", bars.len());
    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!(
            "Range: {} .. {}",
            first.timestamp.date_naive(),
            last.timestamp.date_naive()
        );
    }

    let Some(stats) = PriceStats::from_bars(&bars) else {
        return Ok(());
    };
    println!("Latest close: {:.2}", stats.latest_close);
    println!("Year high: {:.2}", stats.year_high);
    println!("Year low: {:.2}", stats.year_low);
    match stats.volatility_range() {
        Some(range) => println!("Volatility range: {range:.3}"),
        None => println!("Volatility range: n/a"),
    }
    println!();

    let verdict = evaluate(args.midpoint, &stats, &thresholds);
    println!("Midpoint: {}", args.midpoint);
    println!("Verdict: {}", serde_json::to_string_pretty(&verdict)?);
    println!("Flagged: {}", verdict.flag());

    Ok(())
}
