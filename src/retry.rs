//! Named, testable retry/backoff policy (SPEC_FULL.md §E.2), shared by the
//! Agent Runtime's tool-call retries (spec §4.8: the Tool Client performs no
//! retry of its own) and the Summarizer's per-chunk retries (spec §4.3).

use std::time::Duration;

use rand::Rng;

const DEFAULT_START: Duration = Duration::from_secs(2);
const DEFAULT_CAP: Duration = Duration::from_secs(30);

/// Exponential backoff with full jitter. Each call to [`next_delay`] doubles
/// the base delay (capped) and returns a uniformly jittered duration in
/// `[0.5, 1.0]` of that cap, matching the "start ~2s, cap ~30s, jitter"
/// shape named in SPEC_FULL.md §E.2.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    start: Duration,
    cap: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self {
            start: DEFAULT_START,
            cap: DEFAULT_CAP,
            attempt: 0,
        }
    }

    pub fn with_bounds(start: Duration, cap: Duration) -> Self {
        Self { start, cap, attempt: 0 }
    }

    /// Returns the next delay and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u128 << self.attempt.min(10);
        let exp_ms = self.start.as_millis().saturating_mul(factor);
        let capped_ms = exp_ms.min(self.cap.as_millis()).max(1);
        self.attempt += 1;

        let jitter = rand::rng().random_range(0.5..=1.0_f64);
        Duration::from_millis((capped_ms as f64 * jitter) as u64)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Retries `operation` up to `max_attempts` times (the first attempt plus
/// `max_attempts - 1` retries), sleeping on [`ExponentialBackoff`] between
/// attempts, stopping early if `is_retryable` returns false for the error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut backoff = ExponentialBackoff::new();
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = backoff.next_delay();
                tracing::warn!(attempt, max_attempts, ?delay, "retry_with_backoff: retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_next_delay_grows_then_caps() {
        let mut backoff = ExponentialBackoff::with_bounds(Duration::from_millis(100), Duration::from_millis(400));
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        let third = backoff.next_delay();
        assert!(first <= Duration::from_millis(100));
        assert!(second <= Duration::from_millis(200));
        assert!(third <= Duration::from_millis(400));
    }

    #[test]
    fn test_attempt_counter_advances() {
        let mut backoff = ExponentialBackoff::new();
        assert_eq!(backoff.attempt(), 0);
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, &str> = retry_with_backoff(
            3,
            |_e: &&str| true,
            || {
                calls.set(calls.get() + 1);
                async move {
                    if calls.get() < 3 {
                        Err("transient")
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_stops_on_non_retryable() {
        let calls = Cell::new(0);
        let result: Result<&str, &str> = retry_with_backoff(
            3,
            |_e: &&str| false,
            || {
                calls.set(calls.get() + 1);
                async move { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_exhausts_attempts() {
        let calls = Cell::new(0);
        let result: Result<&str, &str> = retry_with_backoff(
            3,
            |_e: &&str| true,
            || {
                calls.set(calls.get() + 1);
                async move { Err("always transient") }
            },
        )
        .await;
        assert_eq!(result, Err("always transient"));
        assert_eq!(calls.get(), 3);
    }
}
