//! Probe: portal lookup and document extraction
//!
//! Hits the House Clerk subject lookup for one name and documents:
//! - The resolved lookup URL and latency
//! - Every PTR link the page lists
//! - Optionally, the transactions extracted from one document
//!
//! Nothing is marked seen; the dedup file is not touched.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use reqwest::Client;

use ptr_watch::extract::extract_transactions;
use ptr_watch::portal::{fetch_disclosures, search_url};
use ptr_watch::types::{DisclosureReference, Outcome, TrackedSubject};
use ptr_watch::{PORTAL_BASE, USER_AGENT};

#[derive(Parser)]
#[command(name = "probe_disclosures", about = "List PTRs for one politician")]
struct Args {
    #[arg(long)]
    first: String,

    #[arg(long)]
    last: String,

    /// Extract transactions from the Nth listed document (0-based)
    #[arg(long)]
    extract: Option<usize>,

    #[arg(long, default_value = PORTAL_BASE)]
    portal_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()?;
    let subject = TrackedSubject {
        name: format!("{} {}", args.first, args.last),
        first: args.first,
        last: args.last,
    };

    println!("=== Probe: portal lookup ===");
    println!("URL: {}", search_url(&args.portal_base, &subject)?);

    let start = Instant::now();
    let outcome = fetch_disclosures(&client, &args.portal_base, &subject).await;
    println!("Latency: {:?}", start.elapsed());

    let refs: Vec<DisclosureReference> = match outcome {
        Outcome::Found(refs) => refs,
        Outcome::Empty => {
            println!("No PTR links listed");
            return Ok(());
        }
        Outcome::Failed(reason) => {
            println!("Lookup failed: {reason}");
            return Ok(());
        }
    };

    println!("PTR count: {}", refs.len());
    for (i, r) in refs.iter().enumerate() {
        println!("  [{i}] {}", r.url);
    }
    println!();

    let Some(index) = args.extract else {
        return Ok(());
    };
    let Some(reference) = refs.get(index) else {
        anyhow::bail!("--extract {index} out of range (0..{})", refs.len());
    };

    println!("--- Extracting {} ---", reference.url);
    let start = Instant::now();
    match extract_transactions(&client, reference).await {
        Outcome::Found(records) => {
            println!("Latency: {:?}", start.elapsed());
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        Outcome::Empty => println!("No transactions recognized"),
        Outcome::Failed(reason) => println!("Extraction failed: {reason}"),
    }

    Ok(())
}
