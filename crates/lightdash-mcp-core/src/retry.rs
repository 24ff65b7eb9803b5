//! Bounded exponential-backoff retry around a single async operation.
//!
//! Failures are classified by looking for HTTP status markers in the error's
//! rendered message. Client errors (`400`, `401`, `403`, `404`) are returned
//! immediately; anything else is retried until `max_attempts` is reached.
//!
//! The classification is a plain substring match. An unrelated message that
//! happens to contain `"404"` is treated as non-retryable; this is a known
//! limitation and is kept as is.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Substrings that mark an error as a client-side failure.
pub const NON_RETRYABLE_MARKERS: &[&str] = &["401", "403", "400", "404"];

/// Default number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Parameters for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled after every retry.
    pub initial_delay: Duration,
    /// Optional ceiling on a single wait. `None` means unbounded growth.
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
    }
}

impl RetryConfig {
    /// Create a config with unbounded backoff. `max_attempts` of 0 becomes 1.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: None,
        }
    }

    /// Cap every individual wait at `max_delay`.
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Wait inserted before attempt `attempt + 1` (attempts are 1-based).
    ///
    /// Equals `initial_delay * 2^(attempt - 1)`, capped by `max_delay` if set.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.initial_delay.saturating_mul(1u32 << exponent);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Whether an error message describes a failure worth retrying.
pub fn is_retryable(message: &str) -> bool {
    !NON_RETRYABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Run `operation` until it succeeds, fails with a client error, or runs out
/// of attempts. Only the last error is returned.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let message = err.to_string();
        if !is_retryable(&message) {
            tracing::debug!(attempt, error = %message, "non-retryable failure");
            return Err(err);
        }
        if attempt >= max_attempts {
            tracing::warn!(attempt, error = %message, "retry attempts exhausted");
            return Err(err);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %message,
            "operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn calls_between(stamps: &[Instant]) -> Vec<Duration> {
        stamps.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_without_retrying() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(5, Duration::from_millis(10));

        let result: Result<u32, String> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_runs_exactly_max_attempts() {
        for max in 1..=5 {
            let calls = AtomicU32::new(0);
            let config = RetryConfig::new(max, Duration::from_millis(5));

            let result: Result<(), String> = with_retry(&config, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("connection reset".to_string()) }
            })
            .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), max, "max_attempts = {max}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(4, Duration::from_millis(5));

        let result: Result<(), String> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("Lightdash API error: NotFoundError (HTTP 404)".to_string()) }
        })
        .await;

        assert!(result.unwrap_err().contains("404"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_and_bad_request_are_not_retried() {
        for marker in ["400", "401", "403"] {
            let calls = AtomicU32::new(0);
            let config = RetryConfig::new(3, Duration::from_millis(5));

            let _: Result<(), String> = with_retry(&config, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("status {marker}")) }
            })
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 1, "marker {marker}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_404_in_message_short_circuits() {
        // Substring classification: a "404" anywhere stops retries.
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(5));

        let _: Result<(), String> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("timeout after 4040ms".to_string()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(5));

        let result: Result<(), String> = with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure #{n}")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure #3");
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(5));

        let result: Result<&str, String> = with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("HTTP 503".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_without_cap() {
        let stamps = Mutex::new(Vec::new());
        let config = RetryConfig::new(5, Duration::from_millis(100));

        let _: Result<(), String> = with_retry(&config, || {
            stamps.lock().unwrap().push(Instant::now());
            async { Err("service unavailable".to_string()) }
        })
        .await;

        let gaps = calls_between(&stamps.lock().unwrap());
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn max_delay_caps_each_wait() {
        let stamps = Mutex::new(Vec::new());
        let config =
            RetryConfig::new(5, Duration::from_millis(100)).with_max_delay(Duration::from_millis(250));

        let _: Result<(), String> = with_retry(&config, || {
            stamps.lock().unwrap().push(Instant::now());
            async { Err("service unavailable".to_string()) }
        })
        .await;

        let gaps = calls_between(&stamps.lock().unwrap());
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250),
                Duration::from_millis(250),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let start = Instant::now();
        let config = RetryConfig::new(1, Duration::from_secs(60));

        let _: Result<(), String> =
            with_retry(&config, || async { Err("boom".to_string()) }).await;

        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryConfig::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_follow_delay_after() {
        let stamps = Mutex::new(Vec::new());
        let config =
            RetryConfig::new(6, Duration::from_millis(30)).with_max_delay(Duration::from_millis(200));

        let _: Result<(), String> = with_retry(&config, || {
            stamps.lock().unwrap().push(Instant::now());
            async { Err("gateway timeout".to_string()) }
        })
        .await;

        let expected: Vec<Duration> = (1..6).map(|k| config.delay_after(k)).collect();
        assert_eq!(calls_between(&stamps.lock().unwrap()), expected);
    }

    #[test]
    fn huge_initial_delay_saturates_instead_of_overflowing() {
        let config = RetryConfig::new(40, Duration::MAX / 2);
        assert_eq!(config.delay_after(35), Duration::MAX);
    }

    #[test]
    fn delay_after_matches_exponential_formula() {
        let config = RetryConfig::new(10, Duration::from_millis(50));
        for k in 1..=6u32 {
            assert_eq!(
                config.delay_after(k),
                Duration::from_millis(50 * 2u64.pow(k - 1))
            );
        }
    }

    #[test]
    fn classification_markers() {
        assert!(is_retryable("HTTP 500"));
        assert!(is_retryable("connection refused"));
        assert!(!is_retryable("HTTP 401 Unauthorized"));
        assert!(!is_retryable("(HTTP 400)"));
    }
}
