//! Wanted identifier list: the ordered, deduplicated set of PMIDs for a run.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use super::error::{PMID_HEADER, ParseError};

/// A PubMed identifier.
///
/// Opaque to the grabber apart from being non-empty; it is only ever used as a
/// lookup key for the remote services and as the stem of stored filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pmid(String);

impl Pmid {
    /// Creates a PMID from raw text, trimming surrounding whitespace.
    ///
    /// Returns `None` when nothing is left after trimming.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pmid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Pmid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered sequence of unique PMIDs, fixed for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WantedSet {
    ids: Vec<Pmid>,
}

impl WantedSet {
    /// Loads a wanted list from a CSV file whose header names a `PMID` column.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the file cannot be read, has no `PMID`
    /// header, or contains a row with an empty identifier.
    #[tracing::instrument(fields(path = %path.display()))]
    pub fn from_csv_path(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|e| ParseError::io(path, e))?;
        let set = Self::from_csv_reader(file, path)?;
        info!(count = set.len(), "Loaded wanted list");
        Ok(set)
    }

    /// Parses a wanted list from any reader; `label` is used in error messages.
    ///
    /// # Errors
    ///
    /// Same as [`from_csv_path`](Self::from_csv_path).
    pub fn from_csv_reader<R: Read>(reader: R, label: &Path) -> Result<Self, ParseError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = csv_reader.records();
        let header = match records.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => return Err(ParseError::csv(label, e)),
            None => return Err(ParseError::missing_header(label)),
        };

        let Some(column) = header
            .iter()
            .position(|cell| cell.trim_start_matches('\u{feff}').eq_ignore_ascii_case(PMID_HEADER))
        else {
            return Err(ParseError::missing_header(label));
        };

        let mut set = Self::default();
        let mut seen = HashSet::new();
        for record in records {
            let record = record.map_err(|e| ParseError::csv(label, e))?;
            let line = record.position().map_or(0, csv::Position::line);
            let Some(pmid) = record.get(column).and_then(Pmid::parse) else {
                return Err(ParseError::empty_identifier(label, line));
            };
            if seen.insert(pmid.clone()) {
                set.ids.push(pmid);
            } else {
                debug!(pmid = %pmid, line, "Dropping duplicate PMID");
            }
        }

        Ok(set)
    }

    /// Builds a wanted set from in-memory identifiers with the same rules as the
    /// CSV loader: blank entries are rejected, duplicates dropped, order kept.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyIdentifier`] for a blank entry; `line` is the
    /// 1-indexed position in the iterator.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        let mut seen = HashSet::new();
        for (index, raw) in ids.into_iter().enumerate() {
            let Some(pmid) = Pmid::parse(raw.as_ref()) else {
                return Err(ParseError::empty_identifier("<list>", index as u64 + 1));
            };
            if seen.insert(pmid.clone()) {
                set.ids.push(pmid);
            }
        }
        Ok(set)
    }

    /// Number of identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates identifiers in input order.
    pub fn iter(&self) -> std::slice::Iter<'_, Pmid> {
        self.ids.iter()
    }
}

impl<'a> IntoIterator for &'a WantedSet {
    type Item = &'a Pmid;
    type IntoIter = std::slice::Iter<'a, Pmid>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
