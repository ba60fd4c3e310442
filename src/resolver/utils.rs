//! Publisher link rewrites shared by the resolvers.

use std::sync::LazyLock;

use regex::Regex;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Tail of a SpringerLink PDF URL: everything after the last `pdf/`.
static SPRINGER_PDF_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^.*pdf/(.+)$"));

/// Cambridge DOIs carry the article id after `10.1017/s`.
static CAMBRIDGE_DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^10\.1017/s(.+)$"));

const SPRINGER_PDF_BASE: &str = "https://link.springer.com/content/pdf/";
const CAMBRIDGE_VIEW_BASE: &str =
    "https://www.cambridge.org/core/services/aop-cambridge-core/content/view/S";
const NCBI_FTP_HOST: &str = "ftp://ftp.ncbi.nlm.nih.gov/";
const NCBI_FTP_HTTPS: &str = "https://ftp.ncbi.nlm.nih.gov/";

/// Rewrites legacy `springerlink` PDF links to the current `link.springer.com`
/// form, with the DOI's slashes percent-encoded.
///
/// Other URLs are returned unchanged.
#[must_use]
pub fn fix_springer_link_url(url: &str) -> String {
    if !url.to_ascii_lowercase().contains("springerlink") {
        return url.to_string();
    }
    match SPRINGER_PDF_TAIL_RE.captures(url).and_then(|caps| caps.get(1)) {
        Some(tail) => format!("{SPRINGER_PDF_BASE}{}", tail.as_str().replace('/', "%2F")),
        None => url.to_string(),
    }
}

/// Full-text view URL for a Cambridge University Press DOI (`10.1017/S...`).
///
/// Returns `None` for any other DOI.
#[must_use]
pub fn cambridge_url(doi: &str) -> Option<String> {
    CAMBRIDGE_DOI_RE
        .captures(doi.trim())
        .and_then(|caps| caps.get(1))
        .map(|rest| format!("{CAMBRIDGE_VIEW_BASE}{}", rest.as_str()))
}

/// Rewrites NCBI `ftp://` links to the equivalent HTTPS mirror.
#[must_use]
pub fn ncbi_ftp_to_https(url: &str) -> String {
    match url.strip_prefix(NCBI_FTP_HOST) {
        Some(rest) => format!("{NCBI_FTP_HTTPS}{rest}"),
        None => url.to_string(),
    }
}
