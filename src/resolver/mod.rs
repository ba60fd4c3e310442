//! Source clients that turn a PubMed identifier into downloadable resources.
//!
//! # Architecture
//!
//! - [`Resolver`] - Async trait each full-text source implements
//! - [`ResolverRegistry`] - Ordered collection of resolvers
//! - [`ResolveStep`] - Result of one resolver's attempt
//! - [`EntrezClient`] - PubMed E-utilities lookups (PMID → DOI, PMID → PMCID)
//! - [`CrossrefResolver`] - Publisher full-text links from Crossref metadata
//! - [`PmcOaResolver`] - PubMed Central Open Access subset (OAI XML + PDF)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use grabber_core::config::{Endpoints, HttpSettings};
//! use grabber_core::download::{RequestPacer, RetryPolicy};
//! use grabber_core::parser::Pmid;
//! use grabber_core::resolver::{ResolveContext, SourceKind, build_default_resolver_registry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = build_default_resolver_registry(
//!     &Endpoints::default(),
//!     &HttpSettings::resolver_default(),
//!     "me@example.org",
//!     &Arc::new(RequestPacer::default()),
//!     &RetryPolicy::default(),
//! )?;
//! let pmid = Pmid::parse("28249574").ok_or("bad pmid")?;
//! let (source, resources) = registry
//!     .resolve_first(&pmid, &SourceKind::DEFAULT_ORDER, &ResolveContext::default())
//!     .await?;
//! println!("{source}: {} resource(s)", resources.len());
//! # Ok(())
//! # }
//! ```

mod crossref;
mod entrez;
mod error;
mod http_client;
mod pmc_oa;
mod registry;
mod utils;

pub use crossref::CrossrefResolver;
pub use entrez::EntrezClient;
pub use error::ResolveError;
pub use http_client::{MetadataClient, build_resolver_http_client};
pub use pmc_oa::PmcOaResolver;
pub use registry::ResolverRegistry;
pub use utils::{cambridge_url, fix_springer_link_url, ncbi_ftp_to_https};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::auth::ClickThroughToken;
use crate::config::{Endpoints, HttpSettings};
use crate::download::{ArticleFormat, RequestPacer, RetryPolicy};
use crate::parser::Pmid;

/// Builds the registry used by the CLI: Crossref and PMC OA sharing one
/// Entrez client, every lookup paced by `pacer` and retried per `retry`.
///
/// # Errors
///
/// Returns [`ResolveError::ClientBuild`] when an HTTP client cannot be built.
pub fn build_default_resolver_registry(
    endpoints: &Endpoints,
    http: &HttpSettings,
    email: &str,
    pacer: &Arc<RequestPacer>,
    retry: &RetryPolicy,
) -> Result<ResolverRegistry, ResolveError> {
    let entrez = Arc::new(
        EntrezClient::new(&endpoints.entrez_base, email, http)?
            .with_pacing(Arc::clone(pacer), retry.clone()),
    );
    let mut registry = ResolverRegistry::new();
    registry.register(Box::new(
        CrossrefResolver::new(&endpoints.crossref_base, email, Arc::clone(&entrez), http)?
            .with_pacing(Arc::clone(pacer), retry.clone()),
    ));
    registry.register(Box::new(
        PmcOaResolver::new(
            &endpoints.pmc_oa_service,
            &endpoints.pmc_oai_service,
            email,
            entrez,
            http,
        )?
        .with_pacing(Arc::clone(pacer), retry.clone()),
    ));
    Ok(registry)
}

/// The full-text sources the grabber knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Publisher links listed in Crossref metadata.
    Crossref,
    /// PubMed Central Open Access subset.
    PmcOa,
}

impl SourceKind {
    /// Order used by `grab` unless configured otherwise.
    pub const DEFAULT_ORDER: [Self; 2] = [Self::Crossref, Self::PmcOa];

    /// Stable lowercase name, used in logs and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crossref => "crossref",
            Self::PmcOa => "pmc-oa",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crossref" => Ok(Self::Crossref),
            "pmc-oa" | "pmc-oai" | "pmc" => Ok(Self::PmcOa),
            other => Err(format!(
                "unknown source '{other}' (expected 'crossref' or 'pmc-oa')"
            )),
        }
    }
}

/// One downloadable resource located by a resolver.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Resource URL.
    pub url: String,
    /// Format the source declares for this resource. `Unknown` when it declares none.
    pub format: ArticleFormat,
    /// Raw content type declared by the source, if any.
    pub declared_content_type: Option<String>,
    /// Extra request headers (e.g. the click-through token). Values may be marked sensitive.
    pub headers: HeaderMap,
}

impl ResolvedResource {
    /// Creates a resource with no extra headers.
    #[must_use]
    pub fn new(url: impl Into<String>, format: ArticleFormat) -> Self {
        Self {
            url: url.into(),
            format,
            declared_content_type: None,
            headers: HeaderMap::new(),
        }
    }

    /// Records the content type declared by the source and derives `format` from it.
    #[must_use]
    pub fn with_declared_content_type(mut self, content_type: Option<String>) -> Self {
        self.format = ArticleFormat::from_declared(content_type.as_deref());
        self.declared_content_type = content_type;
        self
    }

    /// Adds request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Result of a single resolver's attempt.
#[derive(Debug, Clone)]
pub enum ResolveStep {
    /// At least one resource was located, in preferred download order.
    Resources(Vec<ResolvedResource>),
    /// This source has nothing for the identifier; try the next one.
    Failed(ResolveError),
}

/// Per-run inputs shared by every resolver call.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Crossref click-through token, when one was configured.
    pub credential: Option<ClickThroughToken>,
}

impl ResolveContext {
    /// Context carrying an optional credential.
    #[must_use]
    pub fn new(credential: Option<ClickThroughToken>) -> Self {
        Self { credential }
    }
}

/// A full-text source.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Which source this resolver represents.
    fn source(&self) -> SourceKind;

    /// Locates resources for `pmid`.
    ///
    /// Lookups that find nothing come back as `Ok(ResolveStep::Failed(..))`;
    /// `Err` is reserved for misconfiguration.
    async fn resolve(&self, pmid: &Pmid, ctx: &ResolveContext)
    -> Result<ResolveStep, ResolveError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_round_trips_names() {
        for kind in SourceKind::DEFAULT_ORDER {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!("PMC".parse::<SourceKind>().unwrap(), SourceKind::PmcOa);
        assert!("arxiv".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_resolved_resource_declared_type_sets_format() {
        let resource = ResolvedResource::new("https://x/y", ArticleFormat::Unknown)
            .with_declared_content_type(Some("application/pdf".to_string()));
        assert_eq!(resource.format, ArticleFormat::Pdf);

        let resource = ResolvedResource::new("https://x/y", ArticleFormat::Pdf)
            .with_declared_content_type(Some("unspecified".to_string()));
        assert_eq!(resource.format, ArticleFormat::Unknown);
    }

    #[test]
    fn test_build_default_registry_orders_crossref_first() {
        let registry = build_default_resolver_registry(
            &Endpoints::default(),
            &HttpSettings::resolver_default(),
            "me@example.org",
            &Arc::new(RequestPacer::disabled()),
            &RetryPolicy::default(),
        )
        .unwrap();
        let order: Vec<SourceKind> = registry.iter().map(|r| r.source()).collect();
        assert_eq!(order, vec![SourceKind::Crossref, SourceKind::PmcOa]);
    }
}
