//! HTTP retry policy with exponential backoff.
//!
//! - Max retries: 2 (3 total attempts)
//! - Initial delay: 500ms, doubling, capped at 8 seconds
//! - Down-jitter up to 25% (multiplier in [0.75, 1.0])
//! - Retryable: HTTP 408, 409, 429, 5xx, and connection errors
//! - `Retry-After` (seconds) is honored when present and under a minute
//!
//! Every attempt of one logical request carries the same `Idempotency-Key`
//! so a retried write cannot double-apply server-side.

use std::time::Duration;

use rand::Rng as _;
use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial request).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Parse a `Retry-After` header in seconds.
///
/// Returns `Some(duration)` only for valid values with `0 < duration < 60s`;
/// anything else falls back to computed backoff.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?;
    let secs = value.trim().parse::<u64>().ok()?;
    let duration = Duration::from_secs(secs);
    if duration > Duration::ZERO && duration < Duration::from_secs(60) {
        Some(duration)
    } else {
        None
    }
}

#[must_use]
pub fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS
    ) || status.is_server_error()
}

/// Exponential backoff for the given retry attempt (1-based), down-jittered.
#[must_use]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config
        .initial_delay
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(config.max_delay);
    let multiplier = 1.0 - rand::thread_rng().r#gen::<f64>() * config.jitter_factor;
    base.mul_f64(multiplier.clamp(0.0, 1.0))
}

/// Send a request, retrying transient failures per `config`.
///
/// `make_request` is called once per attempt so the builder (which is not
/// reusable after `send`) can be rebuilt. Returns the final response even if
/// its status is an error; status interpretation belongs to the caller, and
/// only transport failures surface as `Err`.
pub async fn send_with_retry<F>(
    mut make_request: F,
    config: &RetryConfig,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let idempotency_key = format!("atelier-retry-{}", Uuid::new_v4());

    let mut attempt: u32 = 0;
    loop {
        let request = make_request()
            .header("Idempotency-Key", &idempotency_key)
            .header("X-Retry-Count", attempt.to_string());

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if !should_retry_status(status) || attempt >= config.max_retries {
                    return Ok(response);
                }
                let delay = parse_retry_after(response.headers())
                    .unwrap_or_else(|| backoff_delay(config, attempt + 1));
                tracing::debug!(%status, attempt, ?delay, "retrying generation request");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt >= config.max_retries {
                    return Err(e);
                }
                let delay = backoff_delay(config, attempt + 1);
                tracing::debug!(error = %e, attempt, ?delay, "retrying after transport error");
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{RetryConfig, backoff_delay, parse_retry_after, should_retry_status};

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("retry-after", HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn retry_after_parses_in_range_seconds() {
        assert_eq!(parse_retry_after(&headers("3")), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(&headers("0")), None);
        assert_eq!(parse_retry_after(&headers("300")), None);
        assert_eq!(parse_retry_after(&headers("soon")), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn retryable_statuses() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(should_retry_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
        assert!(!should_retry_status(StatusCode::UNAUTHORIZED));
        assert!(!should_retry_status(StatusCode::OK));
    }

    #[test]
    fn backoff_grows_and_stays_bounded() {
        let config = RetryConfig::default();
        for attempt in 1..=10 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay <= config.max_delay);
            assert!(delay >= config.initial_delay.mul_f64(1.0 - config.jitter_factor) || attempt > 1);
        }
        // Deep attempts settle at (jittered) max delay.
        let deep = backoff_delay(&config, 10);
        assert!(deep >= config.max_delay.mul_f64(1.0 - config.jitter_factor));
    }
}
