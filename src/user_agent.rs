//! Shared User-Agent strings for download and metadata HTTP clients.
//!
//! The contact email is sent as a query parameter, never in the User-Agent.

/// Identifies the tool in every request.
const PRODUCT: &str = "pubmed-fulltext-grabber";

/// Default User-Agent for full-text downloads.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("grabber/{version} (academic-research-tool; {PRODUCT})")
}

/// Default User-Agent for metadata lookups (Entrez, Crossref, PMC OA).
#[must_use]
pub(crate) fn default_resolver_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("grabber/{version} (research-tool; {PRODUCT})")
}
