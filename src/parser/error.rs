//! Error types for wanted-list parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Column header that names the identifier column in `wanted.csv`.
pub const PMID_HEADER: &str = "PMID";

/// Errors raised while loading the wanted identifier list.
///
/// Every variant is fatal for a run: the grabber refuses to start fetching
/// when its input list cannot be trusted.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input file could not be opened or read.
    #[error("cannot read wanted list {path}: {source}\n  Suggestion: {suggestion}")]
    Io {
        /// Path of the wanted list.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// How to fix the issue
        suggestion: String,
    },

    /// The CSV reader rejected the file structure.
    #[error("malformed wanted list {path}: {source}")]
    Csv {
        /// Path of the wanted list.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// No header row, or the header has no identifier column.
    #[error("wanted list {path} has no '{PMID_HEADER}' header\n  Suggestion: {suggestion}")]
    MissingHeader {
        /// Path (or label) of the wanted list.
        path: PathBuf,
        /// How to fix the issue
        suggestion: String,
    },

    /// A data row has an empty identifier cell.
    #[error("empty identifier on line {line} of {path}\n  Suggestion: {suggestion}")]
    EmptyIdentifier {
        /// Path (or label) of the wanted list.
        path: PathBuf,
        /// 1-indexed line number, counting the header as line 1.
        line: u64,
        /// How to fix the issue
        suggestion: String,
    },
}

impl ParseError {
    /// Creates an `Io` error for an unreadable wanted list.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
            suggestion: "Check that the file exists and is readable".to_string(),
        }
    }

    /// Creates a `Csv` error.
    #[must_use]
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a `MissingHeader` error.
    #[must_use]
    pub fn missing_header(path: impl Into<PathBuf>) -> Self {
        Self::MissingHeader {
            path: path.into(),
            suggestion: format!("Put '{PMID_HEADER}' on the first line, then one PMID per line"),
        }
    }

    /// Creates an `EmptyIdentifier` error.
    #[must_use]
    pub fn empty_identifier(path: impl Into<PathBuf>, line: u64) -> Self {
        Self::EmptyIdentifier {
            path: path.into(),
            line,
            suggestion: "Remove the row or fill in the PMID".to_string(),
        }
    }
}
