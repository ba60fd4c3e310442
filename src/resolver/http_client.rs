//! Shared HTTP client construction for resolvers.
//!
//! Every metadata lookup goes through a client built here, so Entrez, Crossref
//! and PMC OA traffic share timeout, user-agent and compression settings.
//! [`MetadataClient`] adds the run's request pacing and retries 429 and 5xx
//! answers with the download [`RetryPolicy`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::download::{DownloadError, RequestPacer, RetryDecision, RetryPolicy};
use crate::user_agent;

use super::ResolveError;

/// GET-only client for metadata services.
///
/// Unpaced and single-attempt until [`with_pacing`](Self::with_pacing) is called.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: Client,
    pacer: Arc<RequestPacer>,
    retry: RetryPolicy,
}

impl MetadataClient {
    /// Builds a client with the resolver User-Agent and `settings` timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ClientBuild`] when client construction fails.
    pub fn new(resolver_name: &str, settings: &HttpSettings) -> Result<Self, ResolveError> {
        Ok(Self {
            client: build_resolver_http_client(resolver_name, settings)?,
            pacer: Arc::new(RequestPacer::disabled()),
            retry: RetryPolicy::with_max_attempts(1),
        })
    }

    /// Shares the run's pacer and retry policy.
    #[must_use]
    pub fn with_pacing(mut self, pacer: Arc<RequestPacer>, retry: RetryPolicy) -> Self {
        self.pacer = pacer;
        self.retry = retry;
        self
    }

    /// Sends a GET, waiting for the pacer before every attempt.
    ///
    /// Rate-limited (429) and server-error (5xx) answers are retried as the
    /// policy allows, honouring `Retry-After`. Once the policy gives up, or for
    /// any other status, the response is returned for the caller to interpret.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the request cannot be sent.
    pub async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        let mut attempt = 1;
        loop {
            self.pacer.wait_turn(url).await;
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let error =
                DownloadError::http_status_with_retry_after(url, status.as_u16(), retry_after);
            match self.retry.decide(&error, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        url,
                        status = status.as_u16(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Metadata request refused, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, status = status.as_u16(), %reason, "not retrying");
                    return Ok(response);
                }
            }
        }
    }
}

/// Builds a resolver HTTP client from explicit timeout settings.
///
/// `resolver_name` is used only for error messages; the User-Agent is shared.
///
/// # Errors
///
/// Returns [`ResolveError::ClientBuild`] when client construction fails.
pub fn build_resolver_http_client(
    resolver_name: &str,
    settings: &HttpSettings,
) -> Result<Client, ResolveError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_resolver_user_agent())
        .build()
        .map_err(|error| ResolveError::client_build(resolver_name, &error))
}
