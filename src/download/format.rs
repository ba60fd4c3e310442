//! Format detection and on-disk layout for stored articles.
//!
//! A fetched resource is classified into an [`ArticleFormat`] from whatever
//! hints are available, and [`StorageLayout`] maps each format to its own
//! subdirectory of the output root.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::parser::Pmid;

/// Format tag for a stored article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArticleFormat {
    /// Structured XML (JATS / OAI-PMH envelope).
    Xml,
    /// PDF document.
    Pdf,
    /// Plain text extracted from XML by the converter.
    Text,
    /// Anything that could not be classified.
    Unknown,
}

impl ArticleFormat {
    /// Formats that count as retrieved full text.
    pub const FULL_TEXT: [Self; 2] = [Self::Xml, Self::Pdf];

    /// True for XML and PDF. Unclassified responses are often landing pages.
    #[must_use]
    pub fn is_full_text(self) -> bool {
        matches!(self, Self::Xml | Self::Pdf)
    }

    /// Subdirectory name under the output root.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Xml => "XML",
            Self::Pdf => "PDF",
            Self::Text => "TXT",
            Self::Unknown => "unknown",
        }
    }

    /// File extension, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Unknown => "bin",
        }
    }

    /// Classifies a MIME type such as `application/pdf; charset=binary`.
    ///
    /// `application/octet-stream` is treated as PDF: publishers commonly serve
    /// PDFs that way.
    #[must_use]
    pub fn from_mime(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        let subtype = mime.rsplit('/').next().unwrap_or("");
        match subtype {
            "pdf" | "x-pdf" | "octet-stream" => Self::Pdf,
            "xml" => Self::Xml,
            s if s.ends_with("+xml") => Self::Xml,
            _ => Self::Unknown,
        }
    }

    /// Classifies a bare file extension (`pdf`, `.XML`, ...).
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.');
        if ext.eq_ignore_ascii_case("pdf") {
            Self::Pdf
        } else if ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("nxml") {
            Self::Xml
        } else if ext.eq_ignore_ascii_case("txt") {
            Self::Text
        } else {
            Self::Unknown
        }
    }

    /// Classifies a content type declared by a metadata service.
    ///
    /// Crossref uses the literal `unspecified` when the publisher gave none.
    #[must_use]
    pub fn from_declared(content_type: Option<&str>) -> Self {
        match content_type.map(str::trim) {
            None | Some("") => Self::Unknown,
            Some(ct) if ct.eq_ignore_ascii_case("unspecified") => Self::Unknown,
            Some(ct) => Self::from_mime(ct),
        }
    }
}

impl fmt::Display for ArticleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Everything known about a fetched resource that can reveal its format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatHints<'a> {
    /// `Content-Type` of the HTTP response.
    pub content_type: Option<&'a str>,
    /// Content type declared by the resolver (e.g. Crossref link metadata).
    pub declared_content_type: Option<&'a str>,
    /// `Content-Disposition` of the HTTP response.
    pub content_disposition: Option<&'a str>,
    /// Final URL of the resource.
    pub url: Option<&'a str>,
}

/// Decides the format of a fetched resource.
///
/// The first available hint wins, in this order: response content type,
/// declared content type (unless `unspecified`), content-disposition filename
/// extension, URL path extension. No usable hint yields [`ArticleFormat::Unknown`].
#[must_use]
pub fn decide_format(hints: FormatHints<'_>) -> ArticleFormat {
    if let Some(ct) = hints.content_type.filter(|ct| !ct.trim().is_empty()) {
        return ArticleFormat::from_mime(ct);
    }
    if let Some(declared) = hints
        .declared_content_type
        .filter(|ct| !ct.trim().is_empty() && !ct.trim().eq_ignore_ascii_case("unspecified"))
    {
        return ArticleFormat::from_mime(declared);
    }
    if let Some(ext) = hints
        .content_disposition
        .and_then(parse_content_disposition)
        .as_deref()
        .and_then(extension_of)
    {
        return fetched_from_extension(ext);
    }
    if let Some(ext) = hints.url.and_then(extension_from_url) {
        return fetched_from_extension(&ext);
    }
    ArticleFormat::Unknown
}

// `TXT/` is reserved for converter output.
fn fetched_from_extension(ext: &str) -> ArticleFormat {
    match ArticleFormat::from_extension(ext) {
        ArticleFormat::Text => ArticleFormat::Unknown,
        format => format,
    }
}

/// Maps formats to directories under a single output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Creates a layout rooted at `root`. Nothing is created on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding files of `format`.
    #[must_use]
    pub fn dir_for(&self, format: ArticleFormat) -> PathBuf {
        self.root.join(format.dir_name())
    }

    /// Destination path for `pmid` stored as `format`.
    #[must_use]
    pub fn path_for(&self, pmid: &Pmid, format: ArticleFormat) -> PathBuf {
        let stem = sanitize_filename_component(pmid.as_str());
        let stem = if stem.is_empty() { "_".to_string() } else { stem };
        self.dir_for(format)
            .join(format!("{stem}.{}", format.extension()))
    }

    /// Returns the stored full text for `pmid`, checking XML before PDF.
    ///
    /// Files under `unknown/` and `TXT/` are not full text and never match.
    #[must_use]
    pub fn find_existing(&self, pmid: &Pmid) -> Option<PathBuf> {
        ArticleFormat::FULL_TEXT
            .iter()
            .map(|format| self.path_for(pmid, *format))
            .find(|path| path.is_file())
    }
}

fn extension_of(filename: &str) -> Option<&str> {
    let dot = filename.rfind('.')?;
    let ext = filename[dot + 1..].trim_end_matches('"');
    (!ext.is_empty() && ext.len() <= 10).then_some(ext)
}

pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index + 1..];
    if ext.is_empty() || ext.len() > 10 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Makes an identifier safe to use as a filename stem.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Parses a Content-Disposition header to extract the filename.
///
/// Handles `filename="a.pdf"`, `filename=a.pdf` and RFC 5987 `filename*=UTF-8''a.pdf`.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}
