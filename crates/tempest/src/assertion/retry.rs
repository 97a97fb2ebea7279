//! Polling loop behind every assertion.
//!
//! A probe is re-run until it reports [`Observation::Held`] or the session
//! timeout runs out. One last probe always runs at the deadline, so a state
//! that settles just before the timeout is still seen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// What one probe of the page saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The expectation holds
    Held,
    /// It does not, with what was seen instead
    Missed(String),
}

impl Observation {
    /// `Held` if `condition`, otherwise `Missed` with the lazily built note
    #[must_use]
    pub fn when(condition: bool, seen: impl FnOnce() -> String) -> Self {
        if condition {
            Self::Held
        } else {
            Self::Missed(seen())
        }
    }

    /// Whether the expectation holds
    #[must_use]
    pub const fn held(&self) -> bool {
        matches!(self, Self::Held)
    }
}

/// Deadline and cadence of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Give up after this long
    pub timeout: Duration,
    /// Sleep between probes
    pub poll_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS))
    }
}

impl RetryConfig {
    /// Poll at the default interval until `timeout`
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Change the sleep between probes
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Timeout in whole milliseconds
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// An expectation polled until it holds or `config.timeout` elapses
///
/// ```ignore
/// RetryAssertion::new(config, || async {
///     Observation::when(banner_shown().await, || "banner hidden".into())
/// })
/// .labelled("banner visible")
/// .verify()
/// .await?;
/// ```
pub struct RetryAssertion<F> {
    probe: F,
    config: RetryConfig,
    label: Option<String>,
}

impl<F, Fut> RetryAssertion<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Observation>,
{
    /// Poll `probe` with `config`
    #[must_use]
    pub const fn new(config: RetryConfig, probe: F) -> Self {
        Self {
            probe,
            config,
            label: None,
        }
    }

    /// Name used as the prefix of the failure message
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Probe until the expectation holds.
    ///
    /// Sleeps never overshoot the deadline.
    pub async fn verify(mut self) -> Result<Settled, RetryError> {
        let started = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let seen = match (self.probe)().await {
                Observation::Held => {
                    return Ok(Settled {
                        attempts,
                        elapsed: started.elapsed(),
                    })
                }
                Observation::Missed(seen) => seen,
            };

            let elapsed = started.elapsed();
            let Some(remaining) = self.config.timeout.checked_sub(elapsed).filter(|r| !r.is_zero())
            else {
                return Err(RetryError {
                    label: self.label,
                    seen,
                    attempts,
                    elapsed,
                });
            };
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }
    }
}

impl<F> fmt::Debug for RetryAssertion<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAssertion")
            .field("label", &self.label)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// How a passing assertion got there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    /// Probes run, including the passing one
    pub attempts: u32,
    /// Time to the passing probe
    pub elapsed: Duration,
}

/// An assertion that never held
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{seen} (after {attempts} attempt(s), {}ms)", label_prefix(.label.as_deref()), .elapsed.as_millis())]
pub struct RetryError {
    /// Assertion name
    pub label: Option<String>,
    /// Last observation
    pub seen: String,
    /// Probes run
    pub attempts: u32,
    /// Time spent polling
    pub elapsed: Duration,
}

fn label_prefix(label: Option<&str>) -> String {
    label.map(|l| format!("{l}: ")).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick() -> RetryConfig {
        RetryConfig::new(Duration::from_millis(80)).with_poll_interval(Duration::from_millis(10))
    }

    mod config {
        use super::*;

        #[test]
        fn test_defaults_follow_harness_config() {
            let config = RetryConfig::default();
            assert_eq!(config.timeout_ms(), crate::config::DEFAULT_TIMEOUT_MS);
            assert_eq!(
                config.poll_interval,
                Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS)
            );
        }
    }

    mod polling {
        use super::*;

        #[tokio::test]
        async fn test_first_probe_passes() {
            let settled = RetryAssertion::new(quick(), || async { Observation::Held })
                .verify()
                .await
                .unwrap();
            assert_eq!(settled.attempts, 1);
        }

        #[tokio::test]
        async fn test_never_holds_waits_out_the_timeout() {
            let started = Instant::now();
            let err = RetryAssertion::new(quick(), || async {
                Observation::Missed("text was \"Loading\"".into())
            })
            .labelled("expect(status).to_have_text(\"Ready\")")
            .verify()
            .await
            .unwrap_err();

            assert!(started.elapsed() >= Duration::from_millis(80));
            assert!(err.attempts > 1);
            assert!(err
                .to_string()
                .starts_with("expect(status).to_have_text(\"Ready\"): text was \"Loading\" (after "));
        }

        #[tokio::test]
        async fn test_settles_on_third_probe() {
            let probes = Arc::new(AtomicU32::new(0));
            let settled = RetryAssertion::new(quick(), || {
                let probes = probes.clone();
                async move {
                    let n = probes.fetch_add(1, Ordering::SeqCst);
                    Observation::when(n == 2, || "not yet".into())
                }
            })
            .verify()
            .await
            .unwrap();
            assert_eq!(settled.attempts, 3);
        }

        #[tokio::test]
        async fn test_unlabelled_message() {
            let err = RetryAssertion::new(RetryConfig::new(Duration::ZERO), || async {
                Observation::Missed("hidden".into())
            })
            .verify()
            .await
            .unwrap_err();
            assert_eq!(err.attempts, 1);
            assert!(err.to_string().starts_with("hidden (after 1 attempt(s)"));
        }
    }
}
