//! Grabber Core Library
//!
//! Retrieves full-text scholarly articles for a list of PubMed identifiers from
//! Crossref click-through links and the PubMed Central Open Access subset, and
//! files them in one directory per format.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - Wanted list loading (`wanted.csv`, `PMID` column)
//! - [`auth`] - Optional Crossref click-through token
//! - [`resolver`] - Source clients: Entrez ID mapping, Crossref, PMC OA
//! - [`download`] - HTTP fetch with retry, format detection, storage layout
//! - [`convert`] - Stored XML to plain text
//! - [`grabber`] - The per-identifier run loop and its report
//! - [`config`] - Run configuration and remote endpoints

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod convert;
pub mod download;
pub mod grabber;
pub mod parser;
pub mod resolver;
pub mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use auth::{ClickThroughToken, CredentialError, load_click_through_token};
pub use config::{Endpoints, GrabConfig, HttpSettings};
pub use convert::{ConversionReport, ConvertError, convert_all, convert_stored_xml, xml_to_text};
pub use download::{
    ArticleFormat, DEFAULT_MAX_ATTEMPTS, DownloadError, DownloadOutcome, Downloader, HttpClient,
    RequestPacer, RetryPolicy, StorageLayout,
};
pub use grabber::{ArticleGrabber, GrabError, GrabReport, IdentifierOutcome, OutcomeStatus};
pub use parser::{ParseError, Pmid, WantedSet};
pub use resolver::{ResolveContext, ResolveError, ResolvedResource, ResolverRegistry, SourceKind};
