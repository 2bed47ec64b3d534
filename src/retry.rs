//! Fixed-delay retry.
//!
//! This module provides the [`RetryPolicy`] type and the [`retry_with_delay`]
//! helper used by [`SessionManager`](crate::SessionManager) to keep trying to
//! establish a persistent session.
//!
//! # Retry Strategy
//!
//! - Every error is retried; there is no retryable/non-retryable split
//! - The delay between attempts is fixed (no backoff, no jitter)
//! - `max_attempts: None` retries forever; the helper then never returns `Err`
//! - Logs each failed attempt for debugging

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

use crate::{log_debug, log_warn};

/// Retry configuration with a fixed delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between the end of a failed attempt and the next attempt.
    pub delay: Duration,

    /// Total attempts allowed, including the first. `None` = unbounded.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with `delay` between attempts.
    pub fn forever(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Retry up to `max_attempts` total attempts with `delay` between them.
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }
}

impl Default for RetryPolicy {
    /// Unbounded, 1.5s between attempts.
    fn default() -> Self {
        Self::forever(Duration::from_millis(1500))
    }
}

/// Boxed future borrowing the retried state for `'a`.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retry an async operation on `state` with a fixed delay between attempts.
///
/// The operation receives `state` mutably on every attempt, which lets the
/// caller retry a method on an owned session without cloning it.
///
/// # Returns
///
/// - `Ok(T)` from the first successful attempt
/// - `Err` from the last attempt once a bounded policy is exhausted
///
/// # Example
///
/// ```ignore
/// let policy = RetryPolicy::forever(Duration::from_millis(1500));
/// retry_with_delay(&policy, "mqtt", &mut session, |s| s.connect()).await?;
/// ```
pub(crate) async fn retry_with_delay<S, T, F>(
    policy: &RetryPolicy,
    label: &str,
    state: &mut S,
    mut operation: F,
) -> crate::Result<T>
where
    S: ?Sized,
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, crate::Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        match operation(&mut *state).await {
            Ok(result) => {
                if attempt > 1 {
                    log_debug!("{label}: succeeded on attempt {attempt}");
                }
                return Ok(result);
            }
            Err(err) => {
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        log_debug!("{label}: retry exhausted after {attempt} attempts: {err}");
                        return Err(err);
                    }
                }

                log_warn!(
                    "{label}: attempt {attempt} failed ({err}), retrying in {:?}",
                    policy.delay
                );

                sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::UplinkError;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_no_retry_on_success() {
        // ---
        let policy = RetryPolicy::default();
        let mut calls = 0u32;

        let result = retry_with_delay(&policy, "test", &mut calls, |c: &mut u32| {
            Box::pin(async move {
                *c += 1;
                Ok::<i32, UplinkError>(42)
            })
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_retry_until_success() {
        // ---
        let policy = RetryPolicy::forever(Duration::from_millis(1500));
        let mut calls = 0u32;
        let start = Instant::now();

        let result = retry_with_delay(&policy, "test", &mut calls, |c: &mut u32| {
            Box::pin(async move {
                *c += 1;
                if *c < 7 {
                    Err(UplinkError::SessionLost)
                } else {
                    Ok(*c)
                }
            })
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 7);
        // six fixed delays between seven attempts
        assert_eq!(start.elapsed(), Duration::from_millis(6 * 1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_exhaustion() {
        // ---
        let policy = RetryPolicy::bounded(Duration::from_millis(100), 3);
        let mut calls = 0u32;
        let start = Instant::now();

        let result = retry_with_delay(&policy, "test", &mut calls, |c: &mut u32| {
            Box::pin(async move {
                *c += 1;
                Err::<(), _>(UplinkError::Timeout)
            })
        })
        .await;

        assert!(matches!(result, Err(UplinkError::Timeout)));
        assert_eq!(calls, 3);
        // no delay after the final attempt
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }
}
