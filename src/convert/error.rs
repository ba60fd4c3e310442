//! Error types for XML to text conversion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while converting a stored XML article.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The stored XML (or the XML directory) could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The stored file is not well-formed XML.
    #[error("malformed XML in {path}: {source}\n  Suggestion: delete the file and grab it again")]
    Xml {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: quick_xml::Error,
    },

    /// The text file could not be written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// Destination that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// Creates a `Read` error.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates an `Xml` error.
    #[must_use]
    pub fn xml(path: impl Into<PathBuf>, source: quick_xml::Error) -> Self {
        Self::Xml {
            path: path.into(),
            source,
        }
    }

    /// Creates a `Write` error.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
