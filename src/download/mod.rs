//! Fetching full-text resources and filing them by format.
//!
//! # Features
//!
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Retry with exponential backoff and jitter, honouring `Retry-After`
//! - Crossref text-mining quota pacing
//! - Per-host request spacing shared with the metadata lookups
//! - Format detection from response headers and URL
//! - One directory per format (`XML/`, `PDF/`, `unknown/`, `TXT/`)
//! - Existing files are never fetched again or overwritten
//!
//! # Example
//!
//! ```no_run
//! use grabber_core::config::HttpSettings;
//! use grabber_core::download::{ArticleFormat, Downloader, HttpClient, RetryPolicy, StorageLayout};
//! use grabber_core::parser::Pmid;
//! use grabber_core::resolver::ResolvedResource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::new(
//!     HttpClient::new(&HttpSettings::download_default())?,
//!     StorageLayout::new("./articles"),
//!     RetryPolicy::default(),
//! );
//! let pmid = Pmid::parse("28249574").ok_or("bad pmid")?;
//! let resource = ResolvedResource::new("https://example.com/paper.pdf", ArticleFormat::Pdf);
//! let outcome = downloader.download(&pmid, &resource).await?;
//! println!("Stored: {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```

mod client;
pub(crate) mod constants;
mod downloader;
mod error;
mod format;
mod pacer;
mod rate_limit;
mod retry;

pub use client::{FetchedResource, HttpClient};
pub use downloader::{DownloadOutcome, Downloader};
pub use error::DownloadError;
pub use format::{ArticleFormat, FormatHints, StorageLayout, decide_format};
pub use pacer::RequestPacer;
pub use constants::DEFAULT_REQUEST_INTERVAL;
pub use rate_limit::{TDM_REMAINING_HEADER, TDM_RESET_HEADER, parse_retry_after, tdm_pause};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
};

// No module-local Result alias: signatures spell out `Result<T, DownloadError>`.
