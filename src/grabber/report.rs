//! Per-identifier outcomes and the run summary.

use std::path::PathBuf;

use crate::download::{ArticleFormat, DownloadOutcome};
use crate::parser::Pmid;
use crate::resolver::SourceKind;

/// A file produced (or found) for an identifier during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Location in the output tree.
    pub path: PathBuf,
    /// Format directory.
    pub format: ArticleFormat,
    /// Bytes written, `None` when the file was already present.
    pub bytes: Option<u64>,
}

impl From<DownloadOutcome> for StoredFile {
    fn from(outcome: DownloadOutcome) -> Self {
        match outcome {
            DownloadOutcome::Written {
                path,
                bytes,
                format,
            } => Self {
                path,
                format,
                bytes: Some(bytes),
            },
            DownloadOutcome::AlreadyPresent { path, format } => Self {
                path,
                format,
                bytes: None,
            },
        }
    }
}

/// How one identifier ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Files were stored. `source` delivered XML or PDF full text, or, when no
    /// source did, is the first source whose response was kept under `unknown/`.
    Fetched {
        /// The source that delivered.
        source: SourceKind,
        /// Files stored for the identifier, across every source tried.
        files: Vec<StoredFile>,
        /// Failures met on the way, prefixed with the source name.
        warnings: Vec<String>,
    },
    /// A file already existed before the run; nothing was requested.
    SkippedExisting {
        /// The existing file.
        path: PathBuf,
    },
    /// Every tried source failed.
    Failed {
        /// One entry per failed source or resource, prefixed with the source name.
        reasons: Vec<String>,
    },
}

impl OutcomeStatus {
    /// Short label for progress output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fetched { .. } => "fetched",
            Self::SkippedExisting { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome for a single identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOutcome {
    /// The identifier.
    pub pmid: Pmid,
    /// What happened to it.
    pub status: OutcomeStatus,
}

/// Outcomes of a run, in wanted-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrabReport {
    /// One entry per identifier.
    pub outcomes: Vec<IdentifierOutcome>,
}

impl GrabReport {
    /// Number of identifiers processed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no identifier was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Identifiers for which a source delivered.
    #[must_use]
    pub fn fetched_count(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Fetched { .. }))
    }

    /// Identifiers skipped because a file already existed.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::SkippedExisting { .. }))
    }

    /// Identifiers for which every source failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    /// Identifiers whose stored files include XML or PDF full text.
    #[must_use]
    pub fn full_text_count(&self) -> usize {
        self.count(|s| match s {
            OutcomeStatus::Fetched { files, .. } => files.iter().any(|f| f.format.is_full_text()),
            _ => false,
        })
    }

    /// Files written during this run (pre-existing files excluded).
    #[must_use]
    pub fn files_written(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OutcomeStatus::Fetched { files, .. } => Some(files),
                _ => None,
            })
            .flatten()
            .filter(|f| f.bytes.is_some())
            .count()
    }

    /// Failed identifiers with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&Pmid, &[String])> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Failed { reasons } => Some((&o.pmid, reasons.as_slice())),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}
