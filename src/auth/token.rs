//! Crossref click-through token loading.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use tracing::{info, warn};

/// Request header carrying the click-through token.
pub const CLICK_THROUGH_HEADER: &str = "CR-Clickthrough-Client-Token";

/// Errors reading the token file.
///
/// A missing file is not an error; see [`load_click_through_token`].
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The file exists but could not be read (permissions, not a regular file, ...).
    #[error("cannot read click-through token {path}: {source}\n  Suggestion: {suggestion}")]
    Read {
        /// Path of the token file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
        /// How to fix the issue
        suggestion: &'static str,
    },

    /// The token contains bytes that cannot be sent in an HTTP header.
    #[error("click-through token in {path} is not a valid header value\n  Suggestion: {suggestion}")]
    InvalidToken {
        /// Path of the token file.
        path: PathBuf,
        /// How to fix the issue
        suggestion: &'static str,
    },
}

/// Opaque Crossref click-through token.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClickThroughToken(String);

impl ClickThroughToken {
    /// Wraps a raw token, trimming surrounding whitespace. Returns `None` when empty.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Returns the raw token text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Builds the sensitive header pair attached to Crossref full-text requests.
    ///
    /// Returns `None` when the token cannot be represented as a header value.
    #[must_use]
    pub fn header(&self) -> Option<(HeaderName, HeaderValue)> {
        let mut value = HeaderValue::from_str(&self.0).ok()?;
        value.set_sensitive(true);
        Some((HeaderName::from_static("cr-clickthrough-client-token"), value))
    }
}

impl fmt::Debug for ClickThroughToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClickThroughToken(<redacted>)")
    }
}

/// Loads the optional click-through token.
///
/// - missing file → `Ok(None)`; requests go out unauthenticated
/// - blank file → `Ok(None)` with a warning
/// - unreadable file → [`CredentialError::Read`]
///
/// # Errors
///
/// Returns [`CredentialError`] on IO failures other than absence, or when the
/// token cannot be sent as a header value.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_click_through_token(path: &Path) -> Result<Option<ClickThroughToken>, CredentialError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No click-through token; Crossref requests will be unauthenticated");
            return Ok(None);
        }
        Err(source) => {
            return Err(CredentialError::Read {
                path: path.to_path_buf(),
                source,
                suggestion: "Check the token file permissions, or remove it to run unauthenticated",
            });
        }
    };

    let Some(token) = ClickThroughToken::new(&raw) else {
        warn!("Click-through token file is empty; ignoring it");
        return Ok(None);
    };

    if token.header().is_none() {
        return Err(CredentialError::InvalidToken {
            path: path.to_path_buf(),
            suggestion: "The file should contain only the token on a single line",
        });
    }

    info!("Loaded click-through token");
    Ok(Some(token))
}
