pub mod alert;
pub mod analyzer;
pub mod config;
pub mod extract;
pub mod market;
pub mod pipeline;
pub mod portal;
pub mod reporter;
pub mod store;
pub mod types;

/// House Clerk financial disclosure portal (public, no auth required)
pub const PORTAL_BASE: &str = "https://disclosures-clerk.house.gov";

/// Path segment that identifies PTR documents in portal links
pub const PTR_PATH_MARKER: &str = "ptr-pdfs";

/// Yahoo Finance chart API base URL
pub const MARKET_API_BASE: &str = "https://query1.finance.yahoo.com";

/// User agent sent with every outbound request. Yahoo rejects the reqwest default.
pub const USER_AGENT: &str = concat!("ptr-watch/", env!("CARGO_PKG_VERSION"));
