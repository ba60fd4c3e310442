//! HTTP client wrapper for fetching full-text resources.
//!
//! [`HttpClient`] performs one GET per attempt, maps failures onto
//! [`DownloadError`], and honours the server's pacing headers before the next
//! request goes out.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::pacer::RequestPacer;
use super::rate_limit::tdm_pause;
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::HttpSettings;
use crate::user_agent;

/// A successfully fetched resource, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects.
    pub url: String,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// `Content-Disposition` header, if sent.
    pub content_disposition: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client for full-text downloads.
///
/// Created once per run and reused, so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    pacer: Arc<RequestPacer>,
}

impl HttpClient {
    /// Creates a client with the given timeouts and the download User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] when reqwest rejects the configuration.
    pub fn new(settings: &HttpSettings) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            pacer: Arc::new(RequestPacer::disabled()),
        })
    }

    /// Shares `pacer` with the other clients of a run. Unpaced by default.
    #[must_use]
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Fetches `url` once, sending `headers` with the request.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse
    /// - [`DownloadError::AuthRequired`] for 401/403/407
    /// - [`DownloadError::HttpStatus`] for any other non-2xx status
    /// - [`DownloadError::Timeout`] / [`DownloadError::Network`] for transport failures
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<FetchedResource, DownloadError> {
        if Url::parse(url).is_err() {
            return Err(DownloadError::invalid_url(url));
        }

        self.pacer.wait_turn(url).await;
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        if let Some(pause) = tdm_pause(response.headers(), SystemTime::now()) {
            info!(
                pause_secs = pause.as_secs(),
                "Text-mining quota nearly spent; pausing until reset"
            );
            tokio::time::sleep(pause).await;
        }

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if matches!(status_code, 401 | 403 | 407) {
                return Err(DownloadError::auth_required(url, status_code));
            }
            let retry_after = header_string(response.headers(), RETRY_AFTER.as_str());
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status_code,
                retry_after,
            ));
        }

        let final_url = response.url().to_string();
        let content_type = header_string(response.headers(), CONTENT_TYPE.as_str());
        let content_disposition = header_string(response.headers(), CONTENT_DISPOSITION.as_str());
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(url, e))?
            .to_vec();

        debug!(
            bytes = body.len(),
            content_type = content_type.as_deref().unwrap_or("-"),
            "fetched"
        );

        Ok(FetchedResource {
            url: final_url,
            content_type,
            content_disposition,
            body,
        })
    }

    /// Fetches `url`, retrying transient failures according to `policy`.
    ///
    /// # Errors
    ///
    /// Returns the last [`DownloadError`] once the policy gives up.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        headers: &HeaderMap,
        policy: &RetryPolicy,
    ) -> Result<FetchedResource, DownloadError> {
        let mut attempt = 1;
        loop {
            match self.fetch(url, headers).await {
                Ok(resource) => return Ok(resource),
                Err(error) => match policy.decide(&error, attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            url,
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "Fetch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url, attempt, reason, "giving up");
                        return Err(error);
                    }
                },
            }
        }
    }
}

fn map_transport_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
