//! Client-side pacing: a minimum interval between requests to the same host.
//!
//! NCBI asks anonymous clients for at most three requests per second. One
//! identifier costs several NCBI calls (esummary, elink, `oa.fcgi`, `oai.cgi`),
//! so every client of a run shares one [`RequestPacer`] and waits its turn per
//! host. Requests to different hosts do not wait for each other.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use grabber_core::download::RequestPacer;
//!
//! # async fn example() {
//! let pacer = RequestPacer::new(Duration::from_millis(340));
//!
//! // First request to a host goes out immediately
//! pacer.wait_turn("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi").await;
//!
//! // The next one to the same host waits out the interval
//! pacer.wait_turn("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/elink.fcgi").await;
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

/// Spaces out requests per host.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    /// Latest reserved send instant, keyed by `host:port`.
    last_request: Mutex<HashMap<String, Instant>>,
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(super::constants::DEFAULT_REQUEST_INTERVAL)
    }
}

impl RequestPacer {
    /// Creates a pacer enforcing `min_interval` between requests to one host.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// A pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The enforced interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request to `url`'s host may go out.
    ///
    /// Each caller reserves the next free slot for the host before sleeping,
    /// so concurrent callers queue up one interval apart. URLs without a host
    /// are not paced.
    #[instrument(skip(self), fields(host = tracing::field::Empty))]
    pub async fn wait_turn(&self, url: &str) {
        if self.min_interval.is_zero() {
            return;
        }
        let Some(host) = host_key(url) else {
            return;
        };
        tracing::Span::current().record("host", host.as_str());

        let now = Instant::now();
        let slot = {
            let mut last_request = self.last_request.lock().await;
            let slot = match last_request.get(&host) {
                Some(previous) => (*previous + self.min_interval).max(now),
                None => now,
            };
            last_request.insert(host, slot);
            slot
        };
        if slot > now {
            debug!(delay_ms = (slot - now).as_millis(), "pacing request");
            tokio::time::sleep_until(slot).await;
        }
    }
}

fn host_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(match parsed.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}
