//! The run loop: every wanted identifier, one at a time, through the sources.
//!
//! [`ArticleGrabber`] owns the wanted list, the optional credential, the
//! resolver registry and the downloader. A run never aborts on a single
//! identifier; failures are recorded in the [`GrabReport`] and the loop moves on.
//!
//! A source wins once it stores XML or PDF. A response that lands under
//! `unknown/` (typically a paywall or landing page) is kept, but the next
//! source is still tried.
//!
//! # Example
//!
//! ```no_run
//! use grabber_core::{ArticleGrabber, GrabConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let grabber = ArticleGrabber::new(GrabConfig::new(".", "me@example.org"))?;
//! let report = grabber.grab().await;
//! println!("{} fetched, {} failed", report.fetched_count(), report.failed_count());
//! # Ok(())
//! # }
//! ```

mod error;
mod report;

pub use error::GrabError;
pub use report::{GrabReport, IdentifierOutcome, OutcomeStatus, StoredFile};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{ClickThroughToken, load_click_through_token};
use crate::config::GrabConfig;
use crate::download::{Downloader, HttpClient, RequestPacer, RetryPolicy, StorageLayout};
use crate::parser::{Pmid, WantedSet};
use crate::resolver::{
    ResolveContext, ResolveStep, Resolver, ResolverRegistry, SourceKind,
    build_default_resolver_registry,
};

/// Retrieves full text for a wanted list.
#[derive(Debug)]
pub struct ArticleGrabber {
    wanted: WantedSet,
    context: ResolveContext,
    registry: ResolverRegistry,
    downloader: Downloader,
    source_order: Vec<SourceKind>,
}

impl ArticleGrabber {
    /// Loads the wanted list and the optional token, and builds the source clients.
    ///
    /// # Errors
    ///
    /// - [`GrabError::InvalidConfig`] when `config` fails validation
    /// - [`GrabError::MalformedInput`] when the wanted list is missing or malformed
    /// - [`GrabError::Credential`] when the token file exists but cannot be read
    /// - [`GrabError::Resolver`] / [`GrabError::Download`] when an HTTP client cannot be built
    pub fn new(config: GrabConfig) -> Result<Self, GrabError> {
        config.validate().map_err(GrabError::invalid_config)?;

        let wanted = WantedSet::from_csv_path(&config.wanted_path)?;
        let credential = load_click_through_token(&config.token_path)?;
        let pacer = Arc::new(RequestPacer::new(config.request_interval));
        let retry = RetryPolicy::with_max_attempts(config.max_attempts);
        let registry = build_default_resolver_registry(
            &config.endpoints,
            &config.resolver_http,
            &config.email,
            &pacer,
            &retry,
        )?;
        let downloader = Downloader::new(
            HttpClient::new(&config.download_http)?.with_pacer(pacer),
            StorageLayout::new(&config.output_root),
            retry,
        );

        info!(
            identifiers = wanted.len(),
            authenticated = credential.is_some(),
            request_interval_ms = config.request_interval.as_millis(),
            output = %config.output_root.display(),
            "Grabber ready"
        );

        Ok(Self::with_parts(wanted, credential, registry, downloader)
            .with_source_order(config.source_order))
    }

    /// Assembles a grabber from prebuilt parts, using the default source order.
    #[must_use]
    pub fn with_parts(
        wanted: WantedSet,
        credential: Option<ClickThroughToken>,
        registry: ResolverRegistry,
        downloader: Downloader,
    ) -> Self {
        Self {
            wanted,
            context: ResolveContext::new(credential),
            registry,
            downloader,
            source_order: SourceKind::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replaces the order in which [`grab`](Self::grab) tries sources.
    #[must_use]
    pub fn with_source_order(mut self, order: Vec<SourceKind>) -> Self {
        self.source_order = order;
        self
    }

    /// The identifiers this grabber works through.
    #[must_use]
    pub fn wanted(&self) -> &WantedSet {
        &self.wanted
    }

    /// Where files are stored.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        self.downloader.layout()
    }

    /// Tries every configured source in order for each identifier.
    pub async fn grab(&self) -> GrabReport {
        self.run(&self.source_order, |_| {}).await
    }

    /// Tries Crossref only.
    pub async fn grab_via_crossref(&self) -> GrabReport {
        self.run(&[SourceKind::Crossref], |_| {}).await
    }

    /// Tries the PMC Open Access subset only.
    pub async fn grab_via_pmc_oai(&self) -> GrabReport {
        self.run(&[SourceKind::PmcOa], |_| {}).await
    }

    /// Runs the loop over `sources`, calling `on_outcome` after each identifier.
    pub async fn run<F>(&self, sources: &[SourceKind], mut on_outcome: F) -> GrabReport
    where
        F: FnMut(&IdentifierOutcome),
    {
        let resolvers = self.registry.select(sources);
        let mut report = GrabReport::default();

        for pmid in &self.wanted {
            let status = self.grab_one(pmid, &resolvers).await;
            match &status {
                OutcomeStatus::Fetched {
                    source,
                    files,
                    warnings,
                } => {
                    info!(%pmid, %source, files = files.len(), "Fetched");
                    if !warnings.is_empty() {
                        warn!(%pmid, warnings = %warnings.join("; "), "Fetched with failures");
                    }
                }
                OutcomeStatus::SkippedExisting { path } => {
                    debug!(%pmid, path = %path.display(), "Already stored, skipping");
                }
                OutcomeStatus::Failed { reasons } => {
                    warn!(%pmid, reasons = %reasons.join("; "), "No full text retrieved");
                }
            }
            let outcome = IdentifierOutcome {
                pmid: pmid.clone(),
                status,
            };
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        info!(
            total = report.len(),
            fetched = report.fetched_count(),
            full_text = report.full_text_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            files_written = report.files_written(),
            "Run complete"
        );
        report
    }

    async fn grab_one(&self, pmid: &Pmid, resolvers: &[&dyn Resolver]) -> OutcomeStatus {
        if let Some(path) = self.layout().find_existing(pmid) {
            return OutcomeStatus::SkippedExisting { path };
        }
        if resolvers.is_empty() {
            return OutcomeStatus::Failed {
                reasons: vec!["no source selected".to_string()],
            };
        }

        let mut reasons = Vec::new();
        let mut stored: Vec<StoredFile> = Vec::new();
        let mut first_keeper: Option<SourceKind> = None;
        for resolver in resolvers {
            let source = resolver.source();
            let resources = match resolver.resolve(pmid, &self.context).await {
                Ok(ResolveStep::Resources(resources)) if !resources.is_empty() => resources,
                Ok(ResolveStep::Resources(_)) => {
                    reasons.push(format!("{source}: no resources"));
                    continue;
                }
                Ok(ResolveStep::Failed(err)) | Err(err) => {
                    debug!(%pmid, %source, error = %err, "Source failed");
                    reasons.push(format!("{source}: {}", err.reason()));
                    continue;
                }
            };

            let mut full_text = false;
            let mut kept = false;
            for resource in &resources {
                match self.downloader.download(pmid, resource).await {
                    Ok(outcome) => {
                        let file = StoredFile::from(outcome);
                        full_text |= file.format.is_full_text();
                        kept = true;
                        if !stored.iter().any(|other| other.path == file.path) {
                            stored.push(file);
                        }
                    }
                    Err(err) => {
                        debug!(%pmid, %source, error = %err, "Download failed");
                        reasons.push(format!("{source}: {err}"));
                    }
                }
            }
            if full_text {
                return OutcomeStatus::Fetched {
                    source,
                    files: stored,
                    warnings: reasons,
                };
            }
            if kept {
                debug!(%pmid, %source, "Only unclassified content; trying the next source");
                reasons.push(format!(
                    "{source}: no XML or PDF, response kept under unknown/"
                ));
                first_keeper.get_or_insert(source);
            }
        }

        match first_keeper {
            Some(source) => OutcomeStatus::Fetched {
                source,
                files: stored,
                warnings: reasons,
            },
            None => OutcomeStatus::Failed { reasons },
        }
    }
}
