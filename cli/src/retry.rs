//! Fixed-delay bounded retry and per-unit deadline helpers.
//!
//! Every network step in this crate (dial, tunnel, remote command) retries a
//! small fixed number of times with a constant delay, and every unit of
//! fan-out work runs under a hard deadline. Both policies live here so call
//! sites never duplicate them.

use std::future::Future;
use std::time::Duration;

use crate::domain::UnitError;

/// Attempts made before a failing operation is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

/// Constant delay between attempts. No backoff, no jitter.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default deadline for one unit of per-instance work.
pub const UNIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `op` up to `attempts` times, sleeping `delay` between failures, and
/// return the first success or the last error. `attempts` is clamped to at
/// least one.
pub async fn retry_fixed<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(_) => tokio::time::sleep(delay).await,
        }
    }
}

/// Run `fut` under a hard deadline, mapping expiry to [`UnitError::Timeout`].
///
/// # Errors
///
/// Returns `fut`'s own error, or `UnitError::Timeout` once `limit` elapses.
pub async fn with_deadline<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, UnitError>>,
) -> Result<T, UnitError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(UnitError::Timeout(limit)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_fixed(3, RETRY_DELAY, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_fixed(3, RETRY_DELAY, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { if attempt < 3 { Err("refused") } else { Ok(attempt) } }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_surfaces_last_error_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: Result<(), String> = retry_fixed(3, RETRY_DELAY, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("attempt {attempt}")) }
        })
        .await;
        assert_eq!(result, Err("attempt 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps between three attempts, each the fixed delay.
        assert_eq!(started.elapsed(), RETRY_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_clamps_zero_attempts_to_one() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_fixed(0, RETRY_DELAY, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out_pending_work() {
        let limit = Duration::from_millis(50);
        let result: Result<(), UnitError> = with_deadline(limit, std::future::pending()).await;
        match result {
            Err(UnitError::Timeout(elapsed)) => assert_eq!(elapsed, limit),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_passes_through_inner_result() {
        let result = with_deadline(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.expect("inner result"), 42);
    }
}
