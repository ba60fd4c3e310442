//! Constants for the download module (timeouts, rate limiting).

use std::time::Duration;

/// Default HTTP connect timeout for full-text downloads (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout for full-text downloads (5 minutes for large PDFs).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Upper bound for any server-requested pause (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Pause when fewer than this many Crossref text-mining requests remain.
pub const TDM_REMAINING_THRESHOLD: u64 = 2;

/// Minimum spacing between requests to one host (about three per second, NCBI's anonymous limit).
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(340);
