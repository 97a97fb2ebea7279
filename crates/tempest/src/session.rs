//! Session provisioning and teardown.
//!
//! A [`Session`] is one browser process, one isolated context and one page,
//! with tracing already running. It belongs to exactly one run and is torn
//! down exactly once: explicitly through [`Session::close`], or, if the run
//! future is dropped first, by a best-effort task spawned from `Drop`.

use crate::assertion::retry::RetryConfig;
use crate::config::HarnessConfig;
use crate::driver::{Browser, BrowserContext, Driver, LaunchOptions, Page, TraceOptions};
use crate::locator::bounded;
use crate::result::{HarnessError, HarnessResult};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to provision a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Browser launch options (the default timeout lives here)
    pub launch: LaunchOptions,
    /// Poll interval for auto-waiting and assertions
    pub poll_interval: Duration,
    /// What the trace records
    pub trace: TraceOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

impl SessionOptions {
    /// Options derived from a harness configuration
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            launch: LaunchOptions {
                headless: config.headless,
                default_timeout: config.default_timeout(),
                chromium_path: config.chromium_path.clone(),
                sandbox: config.sandbox,
            },
            poll_interval: config.poll_interval(),
            trace: TraceOptions {
                screenshots: config.trace.screenshots,
                snapshots: config.trace.snapshots,
                sources: config.trace.sources,
                title: None,
                source_files: Vec::new(),
            },
        }
    }

    /// Override headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.launch.headless = headless;
        self
    }

    /// Replace the trace options
    #[must_use]
    pub fn with_trace(mut self, trace: TraceOptions) -> Self {
        self.trace = trace;
        self
    }

    /// The fixed timeout applied to every interaction
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.launch.default_timeout
    }
}

/// A live browser session scoped to one run
pub struct Session {
    browser: Option<Box<dyn Browser>>,
    context: Option<Box<dyn BrowserContext>>,
    page: Arc<dyn Page>,
    retry: RetryConfig,
    tracing: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("tracing", &self.tracing)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Launch a browser, open a fresh context, set the default timeout,
    /// start tracing and open a page, in that order.
    ///
    /// A launch failure propagates unchanged. If a later step fails, what was
    /// already opened is closed before the error is returned.
    pub async fn provision(driver: &dyn Driver, options: &SessionOptions) -> HarnessResult<Self> {
        let timeout = options.timeout();
        let browser = driver.launch(&options.launch).await?;

        let context = match browser.new_context().await {
            Ok(context) => context,
            Err(err) => {
                release(None, Some(browser), timeout).await;
                return Err(err);
            }
        };

        let prepared = async {
            context.set_default_timeout(timeout).await?;
            context.start_tracing(&options.trace).await?;
            context.new_page().await
        }
        .await;

        match prepared {
            Ok(page) => {
                tracing::debug!(
                    headless = options.launch.headless,
                    timeout_ms = timeout.as_millis() as u64,
                    "session provisioned"
                );
                Ok(Self {
                    browser: Some(browser),
                    context: Some(context),
                    page,
                    retry: RetryConfig::new(timeout).with_poll_interval(options.poll_interval),
                    tracing: true,
                })
            }
            Err(err) => {
                release(Some(context), Some(browser), timeout).await;
                Err(err)
            }
        }
    }

    /// The page procedures interact with
    #[must_use]
    pub fn page(&self) -> Arc<dyn Page> {
        self.page.clone()
    }

    /// Timing for every wait and assertion in this session
    #[must_use]
    pub const fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    /// The fixed interaction timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.retry.timeout
    }

    /// Whether the trace is still recording
    #[must_use]
    pub const fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// Whether teardown has not happened yet
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.context.is_some() || self.browser.is_some()
    }

    /// Stop tracing and persist the archive to `path`.
    ///
    /// The trace is considered stopped afterwards even when persisting fails.
    pub async fn stop_trace(&mut self, path: &Path) -> HarnessResult<()> {
        let context = self.context.as_ref().ok_or_else(|| HarnessError::TraceError {
            message: "session already closed".to_string(),
        })?;
        if !self.tracing {
            return Err(HarnessError::TraceError {
                message: "trace already stopped".to_string(),
            });
        }
        self.tracing = false;
        bounded("tracing.stop", self.retry.timeout, context.stop_tracing(path)).await
    }

    /// Close the context, then the browser.
    ///
    /// Both are attempted even if the first fails; the errors are combined.
    pub async fn close(mut self) -> HarnessResult<()> {
        let errors = teardown(self.context.take(), self.browser.take(), self.retry.timeout).await;
        if errors.is_empty() {
            tracing::debug!("session closed");
            Ok(())
        } else {
            Err(HarnessError::TeardownError {
                message: errors.join("; "),
            })
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_open() {
            return;
        }
        let context = self.context.take();
        let browser = self.browser.take();
        let timeout = self.retry.timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("session dropped without teardown, closing in background");
                handle.spawn(release(context, browser, timeout));
            }
            Err(_) => {
                tracing::warn!("session dropped outside a runtime, browser may leak");
            }
        }
    }
}

async fn teardown(
    context: Option<Box<dyn BrowserContext>>,
    browser: Option<Box<dyn Browser>>,
    timeout: Duration,
) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(context) = context {
        if let Err(err) = bounded("context.close", timeout, context.close()).await {
            errors.push(format!("context: {err}"));
        }
    }
    if let Some(browser) = browser {
        if let Err(err) = bounded("browser.close", timeout, browser.close()).await {
            errors.push(format!("browser: {err}"));
        }
    }
    errors
}

async fn release(
    context: Option<Box<dyn BrowserContext>>,
    browser: Option<Box<dyn Browser>>,
    timeout: Duration,
) {
    for error in teardown(context, browser, timeout).await {
        tracing::warn!(%error, "teardown failed");
    }
}
