//! Error types for resolver operations.
//!
//! Messages follow the What/Why/Suggestion layout used across the crate.

use thiserror::Error;

/// Errors that can occur while locating full-text resources.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// None of the requested sources is registered.
    #[error("no resolver available for '{input}': {reason}\n  Suggestion: {suggestion}")]
    NoResolver {
        /// The identifier being resolved
        input: String,
        /// Why no resolver matched
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A source could not provide anything for the identifier.
    #[error("resolution failed for '{input}': {reason}\n  Suggestion: {suggestion}")]
    ResolutionFailed {
        /// The identifier that failed resolution
        input: String,
        /// Why resolution failed
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Every source tried came back empty-handed.
    #[error(
        "all sources failed for '{input}': tried {tried_count} source(s)\n  Suggestion: The article may not be available in full text"
    )]
    AllResolversFailed {
        /// The identifier all sources failed on
        input: String,
        /// Number of sources tried
        tried_count: usize,
    },

    /// The HTTP client for a resolver could not be built.
    #[error("cannot initialize {resolver} client: {reason}")]
    ClientBuild {
        /// Resolver name
        resolver: String,
        /// Builder error text
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `NoResolver` error.
    #[must_use]
    pub fn no_resolver(input: &str) -> Self {
        Self::NoResolver {
            input: input.to_string(),
            reason: "none of the requested sources is registered".to_string(),
            suggestion: "Enable at least one of crossref, pmc-oa".to_string(),
        }
    }

    /// Creates a `ResolutionFailed` error.
    #[must_use]
    pub fn resolution_failed(input: &str, reason: &str) -> Self {
        Self::ResolutionFailed {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Check the identifier and try again".to_string(),
        }
    }

    /// Creates an `AllResolversFailed` error.
    #[must_use]
    pub fn all_failed(input: &str, tried_count: usize) -> Self {
        Self::AllResolversFailed {
            input: input.to_string(),
            tried_count,
        }
    }

    /// Creates a `ClientBuild` error.
    #[must_use]
    pub fn client_build(resolver: &str, error: &reqwest::Error) -> Self {
        Self::ClientBuild {
            resolver: resolver.to_string(),
            reason: error.to_string(),
        }
    }

    /// Short reason text without the suggestion, for per-identifier reports.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::NoResolver { reason, .. } | Self::ResolutionFailed { reason, .. } => {
                reason.clone()
            }
            Self::AllResolversFailed { tried_count, .. } => {
                format!("all {tried_count} source(s) failed")
            }
            Self::ClientBuild { reason, .. } => reason.clone(),
        }
    }
}
