//! Server-directed pacing: `Retry-After` and Crossref text-mining limits.
//!
//! Publishers behind Crossref click-through report their quota with
//! `CR-TDM-Rate-Limit-Remaining` and `CR-TDM-Rate-Limit-Reset` (epoch
//! milliseconds). When the quota is nearly spent the downloader waits until the
//! reset instant before issuing the next request.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use tracing::{debug, instrument, warn};

use super::constants::{MAX_RETRY_AFTER, TDM_REMAINING_THRESHOLD};

/// Remaining-quota header sent by text-mining endpoints.
pub const TDM_REMAINING_HEADER: &str = "cr-tdm-rate-limit-remaining";

/// Quota reset header (epoch milliseconds).
pub const TDM_RESET_HEADER: &str = "cr-tdm-rate-limit-reset";

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds and HTTP-date. Values above one hour are capped,
/// dates in the past yield zero, and anything unparseable yields `None`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use grabber_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(SystemTime::now()) {
        Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
        Err(_) => Some(Duration::ZERO),
    }
}

/// Returns how long to wait before the next request, based on the
/// text-mining quota headers of the last response.
///
/// `None` when either header is missing or malformed, or when enough quota
/// remains. The pause lasts until one second past the reset instant, capped
/// at one hour.
#[must_use]
pub fn tdm_pause(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let remaining = header_u64(headers, TDM_REMAINING_HEADER)?;
    let reset_ms = header_u64(headers, TDM_RESET_HEADER)?;
    if remaining >= TDM_REMAINING_THRESHOLD {
        return None;
    }

    let reset_at = UNIX_EPOCH + Duration::from_millis(reset_ms);
    let until_reset = reset_at.duration_since(now).unwrap_or(Duration::ZERO);
    let pause = (until_reset + Duration::from_secs(1)).min(MAX_RETRY_AFTER);
    debug!(
        remaining,
        pause_ms = pause.as_millis(),
        "text-mining quota nearly spent"
    );
    Some(pause)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
