//! Bounded polling for eventually-consistent UI state.
//!
//! Every cross-view or counter observation goes through a [`Poller`]: a fixed
//! interval, a hard deadline, and a failure that names the last mismatch.
//! Hard errors raised by a check (driver failures, parse errors) abort the
//! poll at once; only [`Check::Fail`] is retried.

use crate::config::TriviewConfig;
use crate::error::{TriviewError, TriviewResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one polling attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T> {
    /// Condition met, with the observed value
    Pass(T),
    /// Condition not met yet
    Fail(String),
}

impl<T> Check<T> {
    /// Pass when `ok`, else fail with the message produced lazily
    pub fn from_bool(ok: bool, value: T, message: impl FnOnce() -> String) -> Self {
        if ok {
            Self::Pass(value)
        } else {
            Self::Fail(message())
        }
    }

    /// Check if the result is a pass
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

/// A successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    /// Value produced by the passing attempt
    pub value: T,
    /// Number of attempts made
    pub attempts: usize,
    /// Time spent polling
    pub elapsed: Duration,
}

/// A poll that ran out of time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    /// Last failure message
    pub last: String,
    /// Number of attempts made
    pub attempts: usize,
    /// Time spent polling
    pub elapsed: Duration,
}

impl Exhausted {
    /// Elapsed time in whole milliseconds
    #[must_use]
    pub fn waited_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Fixed-interval poller with a deadline
#[derive(Debug, Clone)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    description: String,
}

impl Poller {
    /// Create a poller
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            description: "condition".to_string(),
        }
    }

    /// Poller using the consistency bounds of a config
    #[must_use]
    pub fn consistency(config: &TriviewConfig) -> Self {
        Self::new(config.consistency_timeout(), config.poll_interval())
    }

    /// Poller using the actionability bounds of a config
    #[must_use]
    pub fn actionability(config: &TriviewConfig) -> Self {
        Self::new(config.actionability_timeout(), config.poll_interval())
    }

    /// Describe what is awaited, for error messages
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Deadline
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until the check passes or time runs out.
    ///
    /// The outer `Result` carries hard errors raised by the check.
    pub async fn attempt<T, F, Fut>(&self, mut check: F) -> TriviewResult<Result<Polled<T>, Exhausted>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TriviewResult<Check<T>>>,
    {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match check().await? {
                Check::Pass(value) => {
                    return Ok(Ok(Polled {
                        value,
                        attempts,
                        elapsed: start.elapsed(),
                    }));
                }
                Check::Fail(last) => {
                    if start.elapsed() >= self.timeout {
                        return Ok(Err(Exhausted {
                            last,
                            attempts,
                            elapsed: start.elapsed(),
                        }));
                    }
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Poll until the check passes; time running out is a `ConsistencyTimeout`
    pub async fn until<T, F, Fut>(&self, check: F) -> TriviewResult<Polled<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TriviewResult<Check<T>>>,
    {
        match self.attempt(check).await? {
            Ok(polled) => {
                tracing::debug!(
                    what = %self.description,
                    attempts = polled.attempts,
                    elapsed_ms = polled.elapsed.as_millis() as u64,
                    "condition reached"
                );
                Ok(polled)
            }
            Err(exhausted) => Err(TriviewError::ConsistencyTimeout {
                what: self.description.clone(),
                waited_ms: exhausted.waited_ms(),
                last: exhausted.last,
            }),
        }
    }

    /// Require the check to pass at every poll for `window`.
    ///
    /// Used for "nothing changes" assertions, where a single passing read
    /// right after an action proves nothing.
    pub async fn holds<F, Fut>(&self, window: Duration, mut check: F) -> TriviewResult<usize>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TriviewResult<Check<()>>>,
    {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            if let Check::Fail(last) = check().await? {
                return Err(TriviewError::ConsistencyTimeout {
                    what: format!("{} (stable for {}ms)", self.description, window.as_millis()),
                    waited_ms: start.elapsed().as_millis() as u64,
                    last,
                });
            }
            if start.elapsed() >= window {
                return Ok(attempts);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast() -> Poller {
        Poller::new(Duration::from_millis(200), Duration::from_millis(10))
    }

    mod until_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_passes_on_first_success() {
            let counter = Arc::new(AtomicUsize::new(0));
            let c = counter.clone();
            let polled = fast()
                .until(move || {
                    let c = c.clone();
                    async move {
                        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                        Ok(Check::from_bool(n >= 3, n, || format!("n={n}")))
                    }
                })
                .await
                .unwrap();
            assert_eq!(polled.value, 3);
            assert_eq!(polled.attempts, 3);
            assert_eq!(counter.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_times_out_with_last_message() {
            let err = fast()
                .with_description("counter == 4")
                .until(|| async { Ok(Check::<()>::Fail("counter is 3".into())) })
                .await
                .unwrap_err();
            match err {
                TriviewError::ConsistencyTimeout {
                    what,
                    waited_ms,
                    last,
                } => {
                    assert_eq!(what, "counter == 4");
                    assert!(waited_ms >= 200);
                    assert_eq!(last, "counter is 3");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_hard_error_aborts_immediately() {
            let counter = Arc::new(AtomicUsize::new(0));
            let c = counter.clone();
            let err = fast()
                .until(move || {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err::<Check<()>, _>(TriviewError::Config {
                            message: "boom".into(),
                        })
                    }
                })
                .await
                .unwrap_err();
            assert!(matches!(err, TriviewError::Config { .. }));
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_attempt_reports_exhaustion() {
            let outcome = fast()
                .attempt(|| async { Ok(Check::<()>::Fail("nope".into())) })
                .await
                .unwrap();
            let exhausted = outcome.unwrap_err();
            assert!(exhausted.attempts > 1);
            assert_eq!(exhausted.last, "nope");
        }
    }

    mod holds_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_holds_for_window() {
            let attempts = fast()
                .holds(Duration::from_millis(50), || async { Ok(Check::Pass(())) })
                .await
                .unwrap();
            assert!(attempts >= 5);
        }

        #[tokio::test(start_paused = true)]
        async fn test_holds_fails_on_first_violation() {
            let counter = Arc::new(AtomicUsize::new(0));
            let c = counter.clone();
            let err = fast()
                .holds(Duration::from_millis(100), move || {
                    let c = c.clone();
                    async move {
                        let n = c.fetch_add(1, Ordering::SeqCst);
                        Ok(Check::from_bool(n < 2, (), || "count changed".to_string()))
                    }
                })
                .await
                .unwrap_err();
            assert!(err.to_string().contains("count changed"));
        }
    }
}
