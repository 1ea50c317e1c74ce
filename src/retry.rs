//! Backoff, retry-eligibility and `Retry-After` primitives used by the
//! transport's retry loop.

use std::time::{Duration, SystemTime};

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use rand::Rng;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Header a caller supplies to opt a non-idempotent request into retries.
pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

const IDEMPOTENT_METHODS: [&str; 4] = ["GET", "HEAD", "OPTIONS", "DELETE"];

/// Full-jitter exponential backoff: a duration sampled uniformly from
/// `[0, min(cap, base * 2^(attempt - 1))]`, `attempt` 1-indexed.
///
/// A zero base yields zero deterministically.
pub fn full_jitter(base: Duration, attempt: u32, cap: Duration) -> Duration {
    full_jitter_with(&mut rand::rng(), base, attempt, cap)
}

/// [`full_jitter`] with an explicit random source.
pub fn full_jitter_with<R: Rng + ?Sized>(
    rng: &mut R,
    base: Duration,
    attempt: u32,
    cap: Duration,
) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let exponent = attempt.saturating_sub(1).min(63);
    let ceiling = base.as_secs_f64() * 2f64.powi(exponent as i32);
    let max_sleep = ceiling.min(cap.as_secs_f64());
    if max_sleep <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rng.random_range(0.0..=max_sleep))
}

/// ±10% uniform wiggle around a server-supplied `Retry-After` hint, so that
/// clients which all received the same hint do not retry in lockstep.
pub fn retry_after_wiggle(hint: Duration) -> Duration {
    retry_after_wiggle_with(&mut rand::rng(), hint)
}

/// [`retry_after_wiggle`] with an explicit random source.
pub fn retry_after_wiggle_with<R: Rng + ?Sized>(rng: &mut R, hint: Duration) -> Duration {
    if hint.is_zero() {
        return Duration::ZERO;
    }
    let secs = hint.as_secs_f64();
    Duration::try_from_secs_f64(rng.random_range((secs * 0.9)..=(secs * 1.1))).unwrap_or(hint)
}

/// Whether a request may be safely re-sent.
///
/// Idempotent methods (GET, HEAD, OPTIONS, DELETE — compared
/// case-insensitively) always are; anything else only when the caller has
/// supplied an `idempotency-key` header proving the write is deduplicated
/// server-side.
pub fn retry_eligible(method: &Method, headers: &HeaderMap) -> bool {
    IDEMPOTENT_METHODS
        .iter()
        .any(|m| method.as_str().eq_ignore_ascii_case(m))
        || headers.contains_key(IDEMPOTENCY_KEY)
}

/// Decode a `Retry-After` header value into a wait duration.
///
/// Accepts non-negative numeric seconds or an HTTP-date (clamped to zero when
/// already past). Anything else — including negative numbers — is `None` and
/// the caller falls back to computed backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    parse_retry_after_at(value, SystemTime::now())
}

/// [`parse_retry_after`] against an explicit "now", for clock-fixed tests.
pub fn parse_retry_after_at(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<f64>() {
        // Negative, NaN and values too large for a Duration are all invalid
        // input, not a wait hint.
        return Duration::try_from_secs_f64(secs).ok();
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(when.duration_since(now).unwrap_or_default())
}

/// Headers carrying an idempotency marker for a write request.
///
/// Uses the caller's key when given, else generates a UUID v4.
pub fn idempotency_headers(key: Option<&str>) -> Result<HeaderMap> {
    let value = match key {
        Some(key) => key.to_owned(),
        None => Uuid::new_v4().to_string(),
    };
    let value = HeaderValue::from_str(&value).map_err(|e| Error::Builder(e.into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(IDEMPOTENCY_KEY, value);
    Ok(headers)
}
