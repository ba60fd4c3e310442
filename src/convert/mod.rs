//! Plain-text conversion of stored XML articles.
//!
//! Reads `XML/{pmid}.xml` and writes the article body as `TXT/{pmid}.txt`.
//! Conversion never touches the network and does not depend on how the XML
//! was obtained.

mod error;
mod text;

pub use error::ConvertError;
pub use text::xml_to_text;

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::download::{ArticleFormat, StorageLayout};
use crate::parser::Pmid;

/// Result of converting one stored article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Text written to `path`.
    Converted(PathBuf),
    /// The XML has no article body; nothing was written.
    NoBody,
}

/// Summary of [`convert_all`].
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Text files written.
    pub converted: Vec<PathBuf>,
    /// Identifiers whose XML has no article body.
    pub without_body: Vec<Pmid>,
    /// Identifiers that could not be converted, with the reason.
    pub failed: Vec<(Pmid, String)>,
}

/// Converts the stored XML for `pmid` into `TXT/{pmid}.txt`.
///
/// # Errors
///
/// Returns [`ConvertError`] if the XML cannot be read or parsed, or the text
/// cannot be written.
pub fn convert_stored_xml(layout: &StorageLayout, pmid: &Pmid) -> Result<Conversion, ConvertError> {
    let source = layout.path_for(pmid, ArticleFormat::Xml);
    let xml = std::fs::read(&source).map_err(|e| ConvertError::read(&source, e))?;
    let xml = String::from_utf8_lossy(&xml);

    let Some(text) = xml_to_text(&xml).map_err(|e| ConvertError::xml(&source, e))? else {
        debug!(%pmid, "no article body");
        return Ok(Conversion::NoBody);
    };

    let target = layout.path_for(pmid, ArticleFormat::Text);
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConvertError::write(dir, e))?;
    }
    std::fs::write(&target, text.as_bytes()).map_err(|e| ConvertError::write(&target, e))?;
    debug!(%pmid, path = %target.display(), "converted");
    Ok(Conversion::Converted(target))
}

/// Converts every `XML/*.xml` file under `layout`.
///
/// A missing `XML/` directory yields an empty report. Per-file failures are
/// recorded and do not stop the pass.
///
/// # Errors
///
/// Returns [`ConvertError::Read`] if the `XML/` directory exists but cannot be listed.
pub fn convert_all(layout: &StorageLayout) -> Result<ConversionReport, ConvertError> {
    let dir = layout.dir_for(ArticleFormat::Xml);
    let mut report = ConversionReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }

    let mut stems: Vec<String> = std::fs::read_dir(&dir)
        .map_err(|e| ConvertError::read(&dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(ArticleFormat::Xml.extension()))
        })
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    stems.sort();

    for pmid in stems.iter().filter_map(|stem| Pmid::parse(stem)) {
        match convert_stored_xml(layout, &pmid) {
            Ok(Conversion::Converted(path)) => report.converted.push(path),
            Ok(Conversion::NoBody) => report.without_body.push(pmid),
            Err(err) => {
                warn!(%pmid, error = %err, "conversion failed");
                report.failed.push((pmid, err.to_string()));
            }
        }
    }

    info!(
        converted = report.converted.len(),
        without_body = report.without_body.len(),
        failed = report.failed.len(),
        "XML conversion finished"
    );
    Ok(report)
}
