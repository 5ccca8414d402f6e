//! Retry/backoff per spec §4.2: "429 and 5xx → retryable up to
//! `maxRetries` (default 3) with exponential backoff (base 500ms, factor
//! 2, jitter ±20%); cap total retry window to `timeout`."

use std::time::Duration;

use rand::Rng;

const BASE_DELAY: Duration = Duration::from_millis(500);
const FACTOR: u32 = 2;
const JITTER_FRACTION: f64 = 0.2;

/// Backoff delay before retry attempt `attempt` (1-indexed: the delay
/// before the *first* retry, i.e. after the initial attempt failed).
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY.as_millis() as u64 * FACTOR.pow(attempt.saturating_sub(1)) as u64;
    let jitter_span = (base as f64 * JITTER_FRACTION) as i64;
    let jitter = rand::rng().random_range(-jitter_span..=jitter_span);
    Duration::from_millis((base as i64 + jitter).max(0) as u64)
}

/// Runs `attempt` up to `max_retries + 1` times total, sleeping the
/// computed backoff between retryable failures, bailing out immediately
/// on a non-retryable error. Returns the last error if every attempt is
/// exhausted.
pub async fn execute<T, E, F, Fut>(max_retries: u32, mut attempt: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: crate::error::IsRetryable,
{
    let mut last_err = None;

    for attempt_number in 0..=max_retries {
        match attempt(attempt_number).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                last_err = Some(err);
                if !retryable || attempt_number == max_retries {
                    break;
                }
                tokio::time::sleep(backoff_delay(attempt_number + 1)).await;
            }
        }
    }

    Err(last_err.expect("loop always runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_by_factor_two_within_jitter_band() {
        let first = backoff_delay(1).as_millis() as f64;
        let second = backoff_delay(2).as_millis() as f64;
        assert!((400.0..=600.0).contains(&first), "first={first}");
        assert!((800.0..=1200.0).contains(&second), "second={second}");
    }

    #[tokio::test]
    async fn execute_stops_after_non_retryable_error() {
        use crate::error::TransportError;

        let mut calls = 0;
        let result = execute::<(), TransportError, _, _>(3, |_attempt| {
            calls += 1;
            async { Err(TransportError::UpstreamRejected { status: 400, body: String::new() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn execute_retries_up_to_max_retries_then_fails() {
        use crate::error::TransportError;

        let mut calls = 0;
        let result = execute::<(), TransportError, _, _>(2, |_attempt| {
            calls += 1;
            async { Err(TransportError::UpstreamUnreachable { detail: "timeout".to_string() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn execute_returns_ok_once_a_retry_succeeds() {
        use crate::error::TransportError;

        let mut calls = 0;
        let result = execute::<&str, TransportError, _, _>(3, |_attempt| {
            calls += 1;
            async move {
                if calls < 2 {
                    Err(TransportError::UpstreamUnreachable { detail: "timeout".to_string() })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 2);
    }
}
