//! Fetch-and-store for a single resolved resource.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::client::HttpClient;
use super::error::DownloadError;
use super::format::{ArticleFormat, FormatHints, StorageLayout, decide_format};
use super::retry::RetryPolicy;
use crate::parser::Pmid;
use crate::resolver::ResolvedResource;

/// What happened to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Bytes were fetched and stored at `path`.
    Written {
        /// Destination file.
        path: PathBuf,
        /// Number of bytes written.
        bytes: u64,
        /// Format directory the file went to.
        format: ArticleFormat,
    },
    /// A file for this identifier and format was already present; nothing was written.
    AlreadyPresent {
        /// The existing file.
        path: PathBuf,
        /// Its format.
        format: ArticleFormat,
    },
}

impl DownloadOutcome {
    /// Path of the written or pre-existing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Written { path, .. } | Self::AlreadyPresent { path, .. } => path,
        }
    }

    /// Format of the written or pre-existing file.
    #[must_use]
    pub fn format(&self) -> ArticleFormat {
        match self {
            Self::Written { format, .. } | Self::AlreadyPresent { format, .. } => *format,
        }
    }
}

/// Fetches resources and files them under a [`StorageLayout`].
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    layout: StorageLayout,
    retry: RetryPolicy,
}

impl Downloader {
    /// Creates a downloader writing below `layout`.
    #[must_use]
    pub fn new(client: HttpClient, layout: StorageLayout, retry: RetryPolicy) -> Self {
        Self {
            client,
            layout,
            retry,
        }
    }

    /// The storage layout files are written to.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Downloads `resource` for `pmid` unless a file for it already exists.
    ///
    /// When the resolver declared a format, its destination is checked before
    /// any request is made. Otherwise the format is decided from the response
    /// and the destination checked again before writing.
    ///
    /// # Errors
    ///
    /// Returns the fetch error once retries are exhausted, or
    /// [`DownloadError::Write`] if the file cannot be stored.
    #[instrument(skip(self, resource), fields(pmid = %pmid, url = %resource.url))]
    pub async fn download(
        &self,
        pmid: &Pmid,
        resource: &ResolvedResource,
    ) -> Result<DownloadOutcome, DownloadError> {
        if resource.format != ArticleFormat::Unknown {
            let path = self.layout.path_for(pmid, resource.format);
            if path.is_file() {
                debug!(path = %path.display(), "already present, not fetching");
                return Ok(DownloadOutcome::AlreadyPresent {
                    path,
                    format: resource.format,
                });
            }
        }

        let fetched = self
            .client
            .fetch_with_retry(&resource.url, &resource.headers, &self.retry)
            .await?;

        let format = decide_format(FormatHints {
            content_type: fetched.content_type.as_deref(),
            declared_content_type: resource.declared_content_type.as_deref(),
            content_disposition: fetched.content_disposition.as_deref(),
            url: Some(&fetched.url),
        });
        // An untyped response from an extension-less URL keeps the resolver's tag.
        let format = if format == ArticleFormat::Unknown && fetched.content_type.is_none() {
            resource.format
        } else {
            format
        };

        let path = self.layout.path_for(pmid, format);
        if path.is_file() {
            debug!(path = %path.display(), "already present after fetch, not overwriting");
            return Ok(DownloadOutcome::AlreadyPresent { path, format });
        }

        let bytes = write_atomically(&path, &fetched.body).await?;
        info!(path = %path.display(), bytes, %format, "stored");
        Ok(DownloadOutcome::Written {
            path,
            bytes,
            format,
        })
    }
}

async fn write_atomically(path: &Path, body: &[u8]) -> Result<u64, DownloadError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DownloadError::write(dir.to_path_buf(), e))?;
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    tokio::fs::write(&part, body)
        .await
        .map_err(|e| DownloadError::write(part.clone(), e))?;
    if let Err(e) = tokio::fs::rename(&part, path).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(DownloadError::write(path.to_path_buf(), e));
    }

    Ok(body.len() as u64)
}
