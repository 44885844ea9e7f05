//! Failure classification shared by the extractors.
//!
//! Upstreams signal quota exhaustion three ways: a 429 with a Retry-After
//! header, a quota phrase in an error body, or a "retry after N" / "wait N"
//! phrase in a message. All three funnel into
//! `ExtractError::RateLimited { retry_after }` here.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Response;

use graphscribe_core::ExtractError;

static RETRY_AFTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry[- ]after[:\s]+(\d+)").unwrap());
static WAIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wait[:\s]+(\d+)").unwrap());

const QUOTA_PHRASES: &[&str] = &["rate limit", "too many requests", "quota exceeded", "429"];

/// Integer seconds from a Retry-After header. HTTP-date forms are rare on
/// the APIs involved and fall back to the scheduler default.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// "retry after N" / "wait N" phrasing inside an error message or body.
pub fn retry_after_from_message(message: &str) -> Option<u64> {
    RETRY_AFTER_RE
        .captures(message)
        .or_else(|| WAIT_RE.captures(message))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// Does a response body read like a quota error even without a 429 status?
/// Video platforms in particular answer quota exhaustion with 200/403 JSON.
pub fn rate_limited_from_body(body: &str) -> Option<ExtractError> {
    let lower = body.to_lowercase();
    if QUOTA_PHRASES.iter().any(|p| lower.contains(p)) {
        Some(ExtractError::RateLimited { retry_after: retry_after_from_message(body) })
    } else {
        None
    }
}

/// Map a non-success response onto the taxonomy, consuming any Retry-After.
pub fn status_error(response: &Response) -> ExtractError {
    let retry_after = retry_after_from_headers(response.headers());
    ExtractError::from_status(response.status().as_u16(), retry_after)
}

/// Transport-level failures (timeout, connect, mid-stream) are retryable.
pub fn transport_error(err: reqwest::Error) -> ExtractError {
    ExtractError::Transient(err.to_string())
}
