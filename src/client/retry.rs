//! Bounded retry loop with a fixed delay between attempts

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry bound and inter-attempt delay.
///
/// The delay is fixed; there is no exponential growth and no jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so total attempts are `max_retries + 1`
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total attempts, first one included
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Waits between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
///
/// Attempts are strictly sequential and each retry waits `policy.delay`
/// through `sleeper`. The last error is returned once retries run out.
pub async fn with_retries<T, F, Fut, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    S: Sleeper,
{
    let mut remaining = policy.max_retries;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                log::error!("Not retrying {}: {}", e.url(), e);
                return Err(e);
            }
            Err(e) if remaining == 0 => {
                log::error!(
                    "Request to {} failed {} consecutive time(s): {}",
                    e.url(),
                    policy.attempts(),
                    e
                );
                return Err(e);
            }
            Err(e) => {
                remaining -= 1;
                log::warn!(
                    "{}; retrying in {:?} ({} retr{} left)",
                    e,
                    policy.delay,
                    remaining,
                    if remaining == 1 { "y" } else { "ies" }
                );
                sleeper.sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every requested wait instead of sleeping
    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl RecordingSleeper {
        fn waits(&self) -> Vec<Duration> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn unavailable() -> FetchError {
        FetchError::Status {
            url: "http://api/data".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_secs(60));
        assert_eq!(policy.attempts(), 6);
    }

    #[test]
    fn test_attempts_saturate() {
        let policy = RetryPolicy::new(u32::MAX, Duration::ZERO);
        assert_eq!(policy.attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_first_success_never_waits() {
        let sleeper = RecordingSleeper::default();
        let value = with_retries(&RetryPolicy::default(), &sleeper, || async {
            Ok::<_, FetchError>(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        for failures in 0..=3usize {
            let sleeper = RecordingSleeper::default();
            let attempts = AtomicUsize::new(0);
            let policy = RetryPolicy::new(3, Duration::from_secs(7));

            let value = with_retries(&policy, &sleeper, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < failures {
                    Err(unavailable())
                } else {
                    Ok("rows")
                }
            })
            .await
            .unwrap();

            assert_eq!(value, "rows");
            assert_eq!(attempts.load(Ordering::SeqCst), failures + 1);
            assert_eq!(sleeper.waits(), vec![Duration::from_secs(7); failures]);
        }
    }

    #[tokio::test]
    async fn test_exhausted_after_max_retries_plus_one_attempts() {
        let sleeper = RecordingSleeper::default();
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(4, Duration::ZERO);

        let err = with_retries(&policy, &sleeper, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FetchError::Status {
                url: format!("attempt-{}", n),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            })
        })
        .await
        .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.waits().len(), 4);
        assert_eq!(err.url(), "attempt-4");
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let attempts = AtomicUsize::new(0);

        let result = with_retries(&RetryPolicy::new(0, Duration::ZERO), &sleeper, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(unavailable())
        })
        .await;

        assert!(matches!(result, Err(FetchError::Status { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let attempts = AtomicUsize::new(0);

        let result = with_retries(&RetryPolicy::new(10, Duration::ZERO), &sleeper, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FetchError::Empty {
                url: "http://api/data".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(FetchError::Empty { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(sleeper.waits().is_empty());
    }
}
