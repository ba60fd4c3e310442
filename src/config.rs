//! Run configuration for the grabber.
//!
//! Everything a run needs is carried explicitly in [`GrabConfig`]: there is no
//! process-wide state. Defaults follow the working-directory layout the CLI
//! uses: `wanted.csv` and `clickThroughToken.txt` in the working directory,
//! format directories created beside them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_INTERVAL, READ_TIMEOUT_SECS,
};
use crate::resolver::SourceKind;

/// Default wanted-list filename inside the working directory.
pub const WANTED_FILE_NAME: &str = "wanted.csv";

/// Default click-through token filename inside the working directory.
pub const TOKEN_FILE_NAME: &str = "clickThroughToken.txt";

/// Tool name reported to NCBI E-utilities.
pub const ENTREZ_TOOL_NAME: &str = "grabber";

/// Connect timeout for metadata lookups (seconds).
const RESOLVER_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout for metadata lookups (seconds).
const RESOLVER_READ_TIMEOUT_SECS: u64 = 30;

/// HTTP timeout settings for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl HttpSettings {
    /// Defaults for metadata lookups (Entrez, Crossref, PMC OA).
    #[must_use]
    pub const fn resolver_default() -> Self {
        Self {
            connect_timeout_secs: RESOLVER_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: RESOLVER_READ_TIMEOUT_SECS,
        }
    }

    /// Defaults for full-text downloads.
    #[must_use]
    pub const fn download_default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Base URLs of the remote services. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// NCBI E-utilities base, without trailing slash.
    pub entrez_base: String,
    /// Crossref REST API base, without trailing slash.
    pub crossref_base: String,
    /// PMC Open Access web service (`oa.fcgi`).
    pub pmc_oa_service: String,
    /// PMC OAI-PMH endpoint (`oai.cgi`).
    pub pmc_oai_service: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            entrez_base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            crossref_base: "https://api.crossref.org".to_string(),
            pmc_oa_service: "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi".to_string(),
            pmc_oai_service: "https://www.ncbi.nlm.nih.gov/pmc/oai/oai.cgi".to_string(),
        }
    }
}

impl Endpoints {
    /// Points every service at one base URL, using the same paths as the real hosts.
    ///
    /// Intended for tests against a local mock server.
    #[must_use]
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            entrez_base: format!("{base}/entrez/eutils"),
            crossref_base: base.to_string(),
            pmc_oa_service: format!("{base}/pmc/utils/oa/oa.fcgi"),
            pmc_oai_service: format!("{base}/pmc/oai/oai.cgi"),
        }
    }
}

/// Full configuration for an [`ArticleGrabber`](crate::ArticleGrabber).
#[derive(Debug, Clone)]
pub struct GrabConfig {
    /// Contact email sent to NCBI and Crossref. Required.
    pub email: String,
    /// Path of the wanted list.
    pub wanted_path: PathBuf,
    /// Path of the optional click-through token.
    pub token_path: PathBuf,
    /// Root under which `XML/`, `PDF/`, `unknown/` and `TXT/` live.
    pub output_root: PathBuf,
    /// Sources tried by `grab`, in order.
    pub source_order: Vec<SourceKind>,
    /// Timeouts for metadata lookups.
    pub resolver_http: HttpSettings,
    /// Timeouts for full-text downloads.
    pub download_http: HttpSettings,
    /// Attempts per request, initial attempt included. Applies to downloads
    /// and to metadata lookups refused with 429 or 5xx.
    pub max_attempts: u32,
    /// Minimum spacing between requests to one host. Zero disables pacing.
    pub request_interval: Duration,
    /// Remote service locations.
    pub endpoints: Endpoints,
}

impl GrabConfig {
    /// Configuration rooted at `work_dir` with every other setting defaulted.
    #[must_use]
    pub fn new(work_dir: impl AsRef<Path>, email: impl Into<String>) -> Self {
        let work_dir = work_dir.as_ref();
        Self {
            email: email.into(),
            wanted_path: work_dir.join(WANTED_FILE_NAME),
            token_path: work_dir.join(TOKEN_FILE_NAME),
            output_root: work_dir.to_path_buf(),
            source_order: SourceKind::DEFAULT_ORDER.to_vec(),
            resolver_http: HttpSettings::resolver_default(),
            download_http: HttpSettings::download_default(),
            max_attempts: crate::download::DEFAULT_MAX_ATTEMPTS,
            request_interval: DEFAULT_REQUEST_INTERVAL,
            endpoints: Endpoints::default(),
        }
    }

    /// Overrides the wanted-list path.
    #[must_use]
    pub fn with_wanted_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.wanted_path = path.into();
        self
    }

    /// Overrides the token path.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Overrides the output root.
    #[must_use]
    pub fn with_output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = path.into();
        self
    }

    /// Overrides the source order used by `grab`.
    #[must_use]
    pub fn with_source_order(mut self, order: Vec<SourceKind>) -> Self {
        self.source_order = order;
        self
    }

    /// Overrides attempts per resource.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Overrides the per-host request spacing.
    #[must_use]
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Overrides service endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Overrides download timeouts.
    #[must_use]
    pub fn with_download_http(mut self, http: HttpSettings) -> Self {
        self.download_http = http;
        self
    }

    /// Overrides metadata lookup timeouts.
    #[must_use]
    pub fn with_resolver_http(mut self, http: HttpSettings) -> Self {
        self.resolver_http = http;
        self
    }

    /// Checks the settings that would otherwise fail late, mid-run.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("a contact email is required by NCBI and Crossref".to_string());
        }
        if email.chars().any(char::is_control) || email.contains(char::is_whitespace) {
            return Err(format!("contact email '{}' contains whitespace or control characters", email.escape_debug()));
        }
        if self.source_order.is_empty() {
            return Err("at least one source must be enabled".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max attempts must be at least 1".to_string());
        }
        if self.download_http.read_timeout_secs == 0 || self.resolver_http.read_timeout_secs == 0 {
            return Err("timeouts must be at least 1 second".to_string());
        }
        Ok(())
    }
}
