//! The capability bundle handed to a procedure.
//!
//! [`ExecutionContext::bind`] composes handles over a live [`Session`]; it
//! performs no I/O. The context is immutable once built and is the only
//! thing a procedure can reach: a page handle, an auto-retrying assertion
//! helper, a pattern matcher and an id generator.

use crate::assertion::Expect;
use crate::assertion::retry::RetryConfig;
use crate::driver::Page;
use crate::locator::{bounded, Locator, Pattern, Selector, TextMatch};
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Capabilities available to a running procedure
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    page: PageHandle,
    expect: Expect,
    re: PatternMatcher,
    uuid: IdGenerator,
}

impl ExecutionContext {
    /// Build the context for a session
    #[must_use]
    pub fn bind(session: &Session) -> Self {
        Self::from_page(session.page(), session.retry_config())
    }

    /// Build a context over any page
    #[must_use]
    pub fn from_page(page: Arc<dyn Page>, retry: RetryConfig) -> Self {
        Self {
            page: PageHandle { page, retry },
            expect: Expect::new(retry),
            re: PatternMatcher,
            uuid: IdGenerator,
        }
    }

    /// Page interaction handle
    #[must_use]
    pub const fn page(&self) -> &PageHandle {
        &self.page
    }

    /// Auto-retrying assertions
    #[must_use]
    pub const fn expect(&self) -> &Expect {
        &self.expect
    }

    /// Regular expressions
    #[must_use]
    pub const fn re(&self) -> &PatternMatcher {
        &self.re
    }

    /// Unique ids
    #[must_use]
    pub const fn uuid(&self) -> &IdGenerator {
        &self.uuid
    }
}

/// Interaction handle for the session's page
#[derive(Clone)]
pub struct PageHandle {
    page: Arc<dyn Page>,
    retry: RetryConfig,
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PageHandle {
    /// Navigate to `url`
    pub async fn goto(&self, url: &str) -> HarnessResult<()> {
        tracing::debug!(url, "goto");
        bounded(&format!("goto({url:?})"), self.retry.timeout, self.page.goto(url)).await
    }

    /// Current URL
    pub async fn url(&self) -> HarnessResult<String> {
        bounded("url", self.retry.timeout, self.page.url()).await
    }

    /// Reload the page
    pub async fn reload(&self) -> HarnessResult<()> {
        tracing::debug!("reload");
        bounded("reload", self.retry.timeout, self.page.reload()).await
    }

    /// Locate by ARIA role; narrow with [`Locator::with_name`]
    #[must_use]
    pub fn get_by_role(&self, role: &str) -> Locator {
        self.locate(Selector::role(role))
    }

    /// Locate by text content
    #[must_use]
    pub fn get_by_text(&self, text: impl Into<TextMatch>) -> Locator {
        self.locate(Selector::text(text))
    }

    /// Locate form controls by label
    #[must_use]
    pub fn get_by_label(&self, text: impl Into<TextMatch>) -> Locator {
        self.locate(Selector::label(text))
    }

    /// Locate inputs by placeholder
    #[must_use]
    pub fn get_by_placeholder(&self, text: impl Into<TextMatch>) -> Locator {
        self.locate(Selector::Placeholder(text.into()))
    }

    /// Locate by `data-testid`
    #[must_use]
    pub fn get_by_test_id(&self, id: &str) -> Locator {
        self.locate(Selector::test_id(id))
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn locator(&self, css: &str) -> Locator {
        self.locate(Selector::css(css))
    }

    /// Sleep for `ms` milliseconds.
    ///
    /// A wait longer than the session timeout fails immediately.
    pub async fn wait_for_timeout(&self, ms: u64) -> HarnessResult<()> {
        let wait = Duration::from_millis(ms);
        if wait > self.retry.timeout {
            return Err(HarnessError::Timeout {
                action: format!("wait_for_timeout({ms})"),
                ms: self.retry.timeout_ms(),
                message: "wait is longer than the session timeout".to_string(),
            });
        }
        tokio::time::sleep(wait).await;
        Ok(())
    }

    /// The underlying page, for page-level assertions
    #[must_use]
    pub fn raw(&self) -> Arc<dyn Page> {
        self.page.clone()
    }

    fn locate(&self, selector: Selector) -> Locator {
        Locator::new(self.page.clone(), selector, self.retry)
    }
}

/// Regular-expression utility
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    /// Case-insensitive flag bit (same value as Python's `re.I`)
    pub const IGNORECASE: u32 = 2;

    /// Compile a case-sensitive pattern
    pub fn compile(&self, pattern: &str) -> HarnessResult<Pattern> {
        self.compile_with(pattern, 0)
    }

    /// Compile with flag bits; only [`Self::IGNORECASE`] is recognized
    pub fn compile_with(&self, pattern: &str, flags: u32) -> HarnessResult<Pattern> {
        Pattern::new(pattern, flags & Self::IGNORECASE != 0).map_err(|e| {
            HarnessError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// First match of `pattern` in `text`
    pub fn search(&self, pattern: &str, text: &str) -> HarnessResult<Option<String>> {
        let regex = regex::Regex::new(pattern).map_err(|e| HarnessError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(regex.find(text).map(|m| m.as_str().to_string()))
    }

    /// Escape `text` for literal use inside a pattern
    #[must_use]
    pub fn escape(&self, text: &str) -> String {
        regex::escape(text)
    }
}

/// Random id generator
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// A random (version 4) UUID
    #[must_use]
    pub fn uuid4(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::mock::{ClickEffect, MockDriver, MockElement, MockFaults, MockPageSpec, MockSite};
    use crate::result::FailureKind;
    use crate::session::SessionOptions;
    use std::time::Instant;

    fn site() -> MockSite {
        MockSite::new().with_page(
            "http://app/",
            MockPageSpec::new("App")
                .with(MockElement::heading("Tasks"))
                .with(MockElement::input("New task").placeholder("What needs doing?"))
                .with(MockElement::button("Add").on_click(ClickEffect::SetText {
                    target: "status".into(),
                    text: "1 task".into(),
                }))
                .with(MockElement::paragraph("0 tasks").id("status").test_id("status")),
        )
    }

    async fn bound() -> (MockDriver, Session, ExecutionContext) {
        let driver = MockDriver::new(site());
        let options = SessionOptions::default();
        let session = Session::provision(&driver, &options).await.unwrap();
        let ctx = ExecutionContext::bind(&session);
        (driver, session, ctx)
    }

    #[tokio::test]
    async fn test_bind_performs_no_io() {
        let driver = MockDriver::new(site());
        let session = Session::provision(&driver, &SessionOptions::default())
            .await
            .unwrap();
        let before = driver.stats().history().len();
        let ctx = ExecutionContext::bind(&session);
        assert_eq!(driver.stats().history().len(), before);
        assert_eq!(ctx.expect().retry_config(), &session.retry_config());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_page_handle_flow() {
        let (_driver, session, ctx) = bound().await;
        let page = ctx.page();
        page.goto("http://app/").await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://app/");

        page.get_by_placeholder("needs doing").fill("write docs").await.unwrap();
        page.get_by_role("button").with_name("Add").click().await.unwrap();

        let status = page.get_by_test_id("status");
        assert_eq!(status.text_content().await.unwrap(), "1 task");
        ctx.expect().that(&status).to_have_text("1 task").await.unwrap();
        ctx.expect()
            .that(&page.get_by_label("New task"))
            .to_have_value("write docs")
            .await
            .unwrap();
        ctx.expect()
            .page(page.raw())
            .to_have_url(ctx.re().compile(r"app/$").unwrap())
            .await
            .unwrap();
        session.close().await.unwrap();
    }

    async fn short_session(faults: MockFaults) -> (Session, ExecutionContext) {
        let config = HarnessConfig::default()
            .with_default_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(10));
        let driver = MockDriver::with_faults(site(), faults);
        let session = Session::provision(&driver, &SessionOptions::from_config(&config))
            .await
            .unwrap();
        let ctx = ExecutionContext::bind(&session);
        (session, ctx)
    }

    #[tokio::test]
    async fn test_stalled_queries_time_out() {
        let (session, ctx) = short_session(MockFaults::none().stall_queries()).await;
        ctx.page().goto("http://app/").await.unwrap();

        let started = Instant::now();
        let button = ctx.page().get_by_role("button");
        let click = button.click();
        let err = tokio::time::timeout(Duration::from_secs(2), click)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);

        let tasks = ctx.page().get_by_text("tasks");
        let read = tasks.text_content();
        let err = tokio::time::timeout(Duration::from_secs(2), read)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(1));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_timeout_is_capped_by_session_timeout() {
        let (session, ctx) = short_session(MockFaults::none()).await;
        ctx.page().wait_for_timeout(20).await.unwrap();

        let started = Instant::now();
        let err = ctx.page().wait_for_timeout(1_000_000_000).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(started.elapsed() < Duration::from_millis(100));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_goto_unknown_url() {
        let (_driver, session, ctx) = bound().await;
        let err = ctx.page().goto("http://missing/").await.unwrap_err();
        assert_eq!(err.kind(), crate::result::FailureKind::Navigation);
        session.close().await.unwrap();
    }

    #[test]
    fn test_pattern_matcher() {
        let re = PatternMatcher;
        let p = re.compile_with("sign in", PatternMatcher::IGNORECASE).unwrap();
        assert!(p.is_match("Please SIGN IN"));
        assert!(!re.compile("sign in").unwrap().is_match("SIGN IN"));

        assert_eq!(
            re.search(r"\d+", "order 42 shipped").unwrap().as_deref(),
            Some("42")
        );
        assert_eq!(re.search("x", "abc").unwrap(), None);
        assert_eq!(re.escape("a.b"), r"a\.b");

        let err = re.compile("(").unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPattern { .. }));
    }

    #[test]
    fn test_uuid4_unique() {
        let ids = IdGenerator;
        let a = ids.uuid4();
        let b = ids.uuid4();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
