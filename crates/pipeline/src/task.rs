//! Task substrate: bounded retries and hard wall-clock budgets.
//!
//! Per-task isolation comes from `tokio::spawn` at the call sites; this
//! module supplies the two policies every spawned pipeline task runs
//! under: a bounded retry loop with doubling backoff for transient
//! publisher failures, and a hard timeout after which the runtime drops
//! the task (no cooperative cancellation).

use crate::error::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;

/// Retry and budget policy applied by the task substrate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per task, including the first.
    pub attempts: u32,
    /// Initial delay between attempts; doubles after every failure.
    pub backoff: Duration,
    /// Hard wall-clock budget for the whole task.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(retry: &koukai_config::Retry) -> Self {
        Self {
            attempts: retry.task_attempts,
            backoff: Duration::from_millis(retry.backoff_ms),
            timeout: Duration::from_secs(retry.timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Run `op` until it succeeds, fails unretryably, or exhausts the attempt
/// budget. Transient failures back off with doubling delays.
pub async fn run_retrying<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> koukai_publish::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = koukai_publish::Result<T>>,
{
    let mut backoff = policy.backoff;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.attempts && error.is_retryable() => {
                tracing::warn!(task = label, attempt, %error, "attempt failed, backing off");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Enforce a hard wall-clock budget on a whole task. On expiry the future
/// is dropped; the task is simply terminated mid-flight.
pub async fn with_deadline<T>(
    budget: Duration,
    label: &str,
    task: impl Future<Output = T>,
) -> Result<T> {
    match tokio::time::timeout(budget, task).await {
        Ok(value) => Ok(value),
        Err(_) => {
            tracing::error!(task = label, budget_secs = budget.as_secs(), "task exceeded its wall-clock budget");
            Err(exn::Exn::from(ErrorKind::Timeout(budget)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koukai_publish::ErrorKind as PublishErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = run_retrying(&policy(5), "test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(exn::Exn::from(PublishErrorKind::Status(503)))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: koukai_publish::Result<()> = run_retrying(&policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(exn::Exn::from(PublishErrorKind::Status(503))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejections_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: koukai_publish::Result<()> = run_retrying(&policy(10), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(exn::Exn::from(PublishErrorKind::Rejected("duplicate".to_string()))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "a refused payload is refused again");
    }

    #[tokio::test]
    async fn test_deadline_terminates_overrunning_tasks() {
        let err = with_deadline(Duration::from_millis(10), "test", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await
        .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout(_)));
    }

    #[tokio::test]
    async fn test_deadline_passes_results_through() {
        let value = with_deadline(Duration::from_secs(5), "test", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
