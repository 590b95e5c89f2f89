use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use ptr_watch::config::{AppConfig, CONFIG_PATH, WEBHOOK_ENV};
use ptr_watch::pipeline::{LiveCollaborators, run_cycle};
use ptr_watch::reporter;
use ptr_watch::store::SeenStore;

#[derive(Parser)]
#[command(name = "ptr-watch", about = "Congressional PTR spike watcher")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,

    /// Report alerts on stdout only, never post to the webhook
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    config.apply_webhook_override(std::env::var(WEBHOOK_ENV).ok());
    config.validate()?;
    info!("Loaded config from {}", args.config.display());

    let collaborators = LiveCollaborators::from_config(&config, args.dry_run)?;
    let mut store = SeenStore::load(&config.settings.seen_path);
    info!(
        "Tracking {} seen document(s) in {}",
        store.len(),
        store.path().display()
    );

    let poll_interval_secs = config.settings.poll_interval_secs;
    let mode = if collaborators.delivers_alerts() {
        "webhook"
    } else {
        "stdout-only"
    };
    let names: Vec<&str> = config.subjects.iter().map(|s| s.name.as_str()).collect();
    info!(
        "Starting ptr-watch ({mode}): subjects=[{}] poll={}s large>={} cheap<={} vol>={}",
        names.join(", "),
        poll_interval_secs,
        config.thresholds.large_trade_usd,
        config.thresholds.cheap_price_usd,
        config.thresholds.volatility_ratio,
    );

    let summary = run_cycle(&config.subjects, &mut store, &collaborators).await;
    reporter::report_cycle_summary(&summary);

    if args.once {
        return Ok(());
    }

    info!("Entering polling loop (interval: {poll_interval_secs}s). Press Ctrl+C to stop.");
    let poll_duration = Duration::from_secs(poll_interval_secs);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(poll_duration) => {
                info!("Polling... (seen: {} documents)", store.len());
                let summary = run_cycle(&config.subjects, &mut store, &collaborators).await;
                reporter::report_cycle_summary(&summary);
            }
        }
    }

    Ok(())
}
