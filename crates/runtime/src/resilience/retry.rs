//! Exponential backoff with a cap and predicate-based retryability
//! (spec.md §4.G).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// `retryable` decides whether a given error is worth retrying; the
/// default mirrors spec.md's classification of network-like and
/// overload-like failures.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    retryable: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64, max_delay: Duration) -> Self {
        assert!(max_attempts >= 1);
        assert!(initial_delay > Duration::ZERO);
        assert!(backoff_multiplier > 1.0);
        assert!(max_delay >= initial_delay);
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
            max_delay,
            retryable: Arc::new(default_retryable),
        }
    }

    pub fn with_retryable(mut self, retryable: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.retryable = Arc::new(retryable);
        self
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }

    pub fn should_retry(&self, error_message: &str, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable)(error_message)
    }

    /// Retry `thunk`, converting it to an error message via `Display` to
    /// feed the retryability predicate. Honors cancellation between
    /// attempts (the sleep between retries is itself cancellable by the
    /// surrounding task).
    pub async fn retry<F, Fut, T, E>(&self, mut thunk: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match thunk().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let message = e.to_string();
                    if !self.should_retry(&message, attempt) {
                        return Err(e);
                    }
                    let wait = self.delay(attempt);
                    debug!(attempt, ?wait, error = %message, "retrying after backoff");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), 2.0, Duration::from_secs(10))
    }
}

fn default_retryable(message: &str) -> bool {
    let m = message.to_lowercase();
    const NETWORK_MARKERS: &[&str] = &["timeout", "connection", "io", "refused", "network"];
    const OVERLOAD_MARKERS: &[&str] = &["busy", "overloaded", "rate limit", "service unavailable"];
    // Subprocess execution failures (spec.md §4.G) — spawn/exec errors from
    // the sandbox layer, which don't contain the generic network markers
    // above (e.g. "process failed to spawn or I/O broke" has a slash in
    // "I/O" that breaks the "io" substring match).
    const SUBPROCESS_MARKERS: &[&str] = &[
        "executable not found",
        "failed to spawn",
        "no such file or directory",
        "permission denied",
    ];
    NETWORK_MARKERS.iter().any(|m2| m.contains(m2))
        || OVERLOAD_MARKERS.iter().any(|m2| m.contains(m2))
        || SUBPROCESS_MARKERS.iter().any(|m2| m.contains(m2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0, Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(500)); // capped
    }

    #[test]
    fn default_retryable_matches_network_and_overload_markers() {
        assert!(default_retryable("Connection refused"));
        assert!(default_retryable("request timeout"));
        assert!(default_retryable("service temporarily overloaded"));
        assert!(!default_retryable("invalid argument"));
    }

    #[test]
    fn default_retryable_matches_subprocess_execution_failures() {
        assert!(default_retryable("executable not found: aider"));
        assert!(default_retryable("process failed to spawn or I/O broke: No such file or directory"));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry("timeout", 1));
        assert!(!policy.should_retry("timeout", 3));
    }

    #[tokio::test]
    async fn retry_stops_on_non_retryable_error() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0, Duration::from_millis(5));
        let calls = AtomicU32::new(0);
        let result: Result<(), &'static str> = policy
            .retry(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("invalid input") }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0, Duration::from_millis(5));
        let calls = AtomicU32::new(0);
        let result: Result<&'static str, &'static str> = policy
            .retry(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("connection reset")
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
