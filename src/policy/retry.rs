use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How often to try an operation and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Wait before the second attempt; doubles after every failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted, sleeping on the tokio timer
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_sleep(policy, label, op, tokio::time::sleep).await
}

/// Same as [`retry`] with a caller-supplied sleep.
///
/// The last error is handed back unchanged once all attempts have failed.
pub async fn retry_with_sleep<T, E, F, Fut, S, SFut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
    mut sleep: S,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.base_delay;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                error!("{} failed after {} attempts: {}", label, attempts, e);
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    label, attempt, attempts, e, delay
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let mut calls = 0;
        let mut sleeps = Vec::new();

        let result: Result<u32, &str> = retry_with_sleep(
            RetryPolicy::with_attempts(3),
            "flaky",
            || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err("boom")
                    } else {
                        Ok(42)
                    }
                }
            },
            |d| {
                sleeps.push(d);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
        assert_eq!(sleeps, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let mut calls = 0;
        let mut sleeps = Vec::new();

        let result: Result<(), String> = retry_with_sleep(
            RetryPolicy::with_attempts(4),
            "always failing",
            || {
                calls += 1;
                let n = calls;
                async move { Err(format!("failure {}", n)) }
            },
            |d| {
                sleeps.push(d);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(result, Err("failure 4".to_string()));
        assert_eq!(
            sleeps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test]
    async fn test_first_success_never_sleeps() {
        let mut sleeps = Vec::new();
        let result: Result<&str, &str> = retry_with_sleep(
            RetryPolicy::default(),
            "steady",
            || async { Ok("ok") },
            |d| {
                sleeps.push(d);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(result, Ok("ok"));
        assert!(sleeps.is_empty());
    }
}
