//! Errors that stop a run before the first identifier is processed.

use thiserror::Error;

use crate::auth::CredentialError;
use crate::download::DownloadError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;

/// Fatal setup errors. Per-identifier failures never surface here.
#[derive(Debug, Error)]
pub enum GrabError {
    /// A configuration value is unusable.
    #[error("invalid configuration: {reason}\n  Suggestion: {suggestion}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
        /// How to fix it.
        suggestion: &'static str,
    },

    /// The wanted list is missing or malformed.
    #[error(transparent)]
    MalformedInput(#[from] ParseError),

    /// The token file exists but cannot be read.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// A source client could not be constructed.
    #[error(transparent)]
    Resolver(#[from] ResolveError),

    /// The download client could not be constructed.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl GrabError {
    /// Creates an `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
            suggestion: "pass a valid --email (or GRABBER_EMAIL) and positive limits",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message_has_suggestion() {
        let msg = GrabError::invalid_config("a contact email is required").to_string();
        assert!(msg.contains("a contact email is required"));
        assert!(msg.contains("Suggestion:"));
    }
}
