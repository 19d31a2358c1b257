//! Capped retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Longest pause between two attempts.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (0-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
        .min(MAX_DELAY)
}

/// Run `op` until it succeeds or `max_retries` retries have failed.
///
/// The last error is returned when every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                let delay = backoff_delay(base_delay, attempt);
                log::warn!(
                    "{label} failed (attempt {}/{}): {e}. Retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 20), MAX_DELAY);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = &AtomicU32::new(0);
        let result = retry_with_backoff(3, Duration::ZERO, "op", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::classifier("busy"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(2, Duration::ZERO, "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::classifier("down"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
