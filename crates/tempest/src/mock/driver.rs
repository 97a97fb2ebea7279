//! In-process driver serving a [`MockSite`].

use super::site::{ClickEffect, MockElement, MockSite};
use crate::accessibility::AccessibilityNode;
use crate::driver::{
    Browser, BrowserContext, Driver, ElementState, LaunchOptions, Page, TraceOptions,
};
use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::trace::{TraceEvent, TraceRecorder};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Placeholder screenshot bytes (PNG signature)
const MOCK_PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const BLANK_URL: &str = "about:blank";

/// Failures to inject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct MockFaults {
    /// `launch` fails
    pub launch: bool,
    /// Reading page markup fails
    pub dom_snapshot: bool,
    /// Reading the accessibility tree fails
    pub accessibility_snapshot: bool,
    /// Snapshot reads never complete
    pub stall_snapshots: bool,
    /// Element queries never complete
    pub stall_queries: bool,
    /// Stopping the trace fails
    pub trace_stop: bool,
    /// Closing the context fails
    pub context_close: bool,
    /// Closing the browser fails
    pub browser_close: bool,
}

impl MockFaults {
    /// No faults
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Fail launches
    #[must_use]
    pub const fn fail_launch(mut self) -> Self {
        self.launch = true;
        self
    }

    /// Fail DOM snapshots
    #[must_use]
    pub const fn fail_dom_snapshot(mut self) -> Self {
        self.dom_snapshot = true;
        self
    }

    /// Fail accessibility snapshots
    #[must_use]
    pub const fn fail_accessibility_snapshot(mut self) -> Self {
        self.accessibility_snapshot = true;
        self
    }

    /// Hang snapshot reads
    #[must_use]
    pub const fn stall_snapshots(mut self) -> Self {
        self.stall_snapshots = true;
        self
    }

    /// Hang element queries
    #[must_use]
    pub const fn stall_queries(mut self) -> Self {
        self.stall_queries = true;
        self
    }

    /// Fail trace stop
    #[must_use]
    pub const fn fail_trace_stop(mut self) -> Self {
        self.trace_stop = true;
        self
    }

    /// Fail context close
    #[must_use]
    pub const fn fail_context_close(mut self) -> Self {
        self.context_close = true;
        self
    }

    /// Fail browser close
    #[must_use]
    pub const fn fail_browser_close(mut self) -> Self {
        self.browser_close = true;
        self
    }
}

/// Call counters and the ordered call history of a [`MockDriver`]
#[derive(Debug, Default)]
pub struct MockStats {
    launches: AtomicUsize,
    contexts_opened: AtomicUsize,
    context_closes: AtomicUsize,
    browser_closes: AtomicUsize,
    history: Mutex<Vec<String>>,
}

impl MockStats {
    /// Launch attempts
    #[must_use]
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Contexts created
    #[must_use]
    pub fn contexts_opened(&self) -> usize {
        self.contexts_opened.load(Ordering::SeqCst)
    }

    /// Context close calls
    #[must_use]
    pub fn context_closes(&self) -> usize {
        self.context_closes.load(Ordering::SeqCst)
    }

    /// Browser close calls
    #[must_use]
    pub fn browser_closes(&self) -> usize {
        self.browser_closes.load(Ordering::SeqCst)
    }

    /// Every call in order (e.g. `page.goto:http://app/`)
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock_history().clone()
    }

    /// Whether a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.lock_history()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Index of the first call starting with `prefix`
    #[must_use]
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lock_history()
            .iter()
            .position(|c| c.starts_with(prefix))
    }

    fn record(&self, call: impl Into<String>) {
        self.lock_history().push(call.into());
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct Shared {
    site: Arc<MockSite>,
    faults: MockFaults,
    stats: Arc<MockStats>,
}

/// Deterministic driver for tests.
///
/// Every launch starts from the pristine [`MockSite`]; nothing a run does is
/// visible to another run.
#[derive(Debug, Clone)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Driver serving `site`
    #[must_use]
    pub fn new(site: MockSite) -> Self {
        Self::with_faults(site, MockFaults::none())
    }

    /// Driver serving `site` with injected failures
    #[must_use]
    pub fn with_faults(site: MockSite, faults: MockFaults) -> Self {
        Self {
            shared: Arc::new(Shared {
                site: Arc::new(site),
                faults,
                stats: Arc::new(MockStats::default()),
            }),
        }
    }

    /// Counters and call history
    #[must_use]
    pub fn stats(&self) -> Arc<MockStats> {
        self.shared.stats.clone()
    }

    /// The served site
    #[must_use]
    pub fn site(&self) -> &MockSite {
        &self.shared.site
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn launch(&self, options: &LaunchOptions) -> HarnessResult<Box<dyn Browser>> {
        let stats = &self.shared.stats;
        stats.launches.fetch_add(1, Ordering::SeqCst);
        stats.record(format!("launch:headless={}", options.headless));
        if self.shared.faults.launch {
            return Err(HarnessError::BrowserLaunchError {
                message: "mock browser refused to start".to_string(),
            });
        }
        Ok(Box::new(MockBrowser {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockBrowser {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_context(&self) -> HarnessResult<Box<dyn BrowserContext>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HarnessError::ContextError {
                message: "browser has been closed".to_string(),
            });
        }
        self.shared.stats.contexts_opened.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.record("context.new");
        Ok(Box::new(MockContext {
            shared: self.shared.clone(),
            recorder: Arc::new(TraceRecorder::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        self.shared.stats.browser_closes.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.record("browser.close");
        self.closed.store(true, Ordering::SeqCst);
        if self.shared.faults.browser_close {
            return Err(HarnessError::TeardownError {
                message: "mock browser did not exit".to_string(),
            });
        }
        Ok(())
    }
}

struct MockContext {
    shared: Arc<Shared>,
    recorder: Arc<TraceRecorder>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserContext for MockContext {
    async fn set_default_timeout(&self, timeout: Duration) -> HarnessResult<()> {
        self.shared
            .stats
            .record(format!("context.timeout:{}", timeout.as_millis()));
        Ok(())
    }

    async fn start_tracing(&self, options: &TraceOptions) -> HarnessResult<()> {
        self.shared.stats.record("tracing.start");
        self.recorder.start(options)
    }

    async fn stop_tracing(&self, path: &Path) -> HarnessResult<()> {
        self.shared.stats.record("tracing.stop");
        if self.shared.faults.trace_stop {
            return Err(HarnessError::TraceError {
                message: "mock trace archive could not be written".to_string(),
            });
        }
        self.recorder.stop(path).map(|_| ())
    }

    async fn new_page(&self) -> HarnessResult<Arc<dyn Page>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HarnessError::ContextError {
                message: "context has been closed".to_string(),
            });
        }
        self.shared.stats.record("page.new");
        Ok(Arc::new(MockPage {
            shared: self.shared.clone(),
            recorder: self.recorder.clone(),
            closed: self.closed.clone(),
            state: Mutex::new(PageState::blank()),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        self.shared.stats.context_closes.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.record("context.close");
        self.closed.store(true, Ordering::SeqCst);
        if self.shared.faults.context_close {
            return Err(HarnessError::TeardownError {
                message: "mock context did not close".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
struct PageState {
    url: String,
    title: String,
    elements: Vec<MockElement>,
    loaded_at: Instant,
    loaded: bool,
}

impl PageState {
    fn blank() -> Self {
        Self {
            url: BLANK_URL.to_string(),
            title: String::new(),
            elements: Vec::new(),
            loaded_at: Instant::now(),
            loaded: false,
        }
    }

    fn load(&mut self, site: &MockSite, url: &str) -> HarnessResult<()> {
        let spec = site.page(url).ok_or_else(|| HarnessError::NavigationError {
            url: url.to_string(),
            message: "net::ERR_CONNECTION_REFUSED".to_string(),
        })?;
        self.url = url.to_string();
        self.title.clone_from(&spec.title);
        self.elements.clone_from(&spec.elements);
        self.loaded_at = Instant::now();
        self.loaded = true;
        Ok(())
    }

    fn is_attached(&self, element: &MockElement) -> bool {
        element
            .appears_after
            .map_or(true, |delay| self.loaded_at.elapsed() >= delay)
    }

    fn matching(&self, selector: &Selector) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| self.is_attached(el) && el.matches(selector))
            .map(|(i, _)| i)
            .collect()
    }

    fn target(&self, selector: &Selector, index: usize) -> HarnessResult<usize> {
        self.matching(selector)
            .get(index)
            .copied()
            .ok_or_else(|| HarnessError::PageError {
                message: format!("{selector} has no match at index {index}"),
            })
    }

    fn element_by_id(&mut self, id: &str) -> Option<&mut MockElement> {
        self.elements
            .iter_mut()
            .find(|el| el.id.as_deref() == Some(id))
    }

    fn body_html(&self) -> String {
        self.elements
            .iter()
            .filter(|el| self.is_attached(el))
            .map(MockElement::to_html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct MockPage {
    shared: Arc<Shared>,
    recorder: Arc<TraceRecorder>,
    closed: Arc<AtomicBool>,
    state: Mutex<PageState>,
}

impl MockPage {
    fn ensure_open(&self) -> HarnessResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(HarnessError::PageError {
                message: "Target page, context or browser has been closed".to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trace(&self, state: &PageState, mut event: TraceEvent) {
        let Some(flags) = self.recorder.flags() else {
            return;
        };
        if flags.screenshots {
            event = event.with_screenshot(&MOCK_PNG);
        }
        if flags.snapshots {
            event = event.with_dom_snapshot(state.body_html());
        }
        self.recorder.record(event);
    }

    async fn snapshot_gate(&self, call: &str, fail: bool) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record(call);
        if self.shared.faults.stall_snapshots {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(HarnessError::PageError {
                message: format!("{call} failed: page crashed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record(format!("page.goto:{url}"));
        let mut state = self.lock();
        let result = state.load(&self.shared.site, url);
        let mut event = TraceEvent::new("goto").with_detail(url);
        if let Err(e) = &result {
            event = event.with_error(e.to_string());
        }
        self.trace(&state, event);
        result
    }

    async fn url(&self) -> HarnessResult<String> {
        self.ensure_open()?;
        Ok(self.lock().url.clone())
    }

    async fn reload(&self) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record("page.reload");
        let mut state = self.lock();
        if state.loaded {
            let url = state.url.clone();
            state.load(&self.shared.site, &url)?;
        }
        self.trace(&state, TraceEvent::new("reload"));
        Ok(())
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementState>> {
        self.ensure_open()?;
        if self.shared.faults.stall_queries {
            std::future::pending::<()>().await;
        }
        let state = self.lock();
        Ok(state
            .matching(selector)
            .into_iter()
            .map(|i| state.elements[i].state())
            .collect())
    }

    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record(format!("page.click:{selector}"));
        let mut state = self.lock();
        let target = state.target(selector, index)?;
        match state.elements[target].on_click.clone() {
            Some(ClickEffect::Navigate(url)) => state.load(&self.shared.site, &url)?,
            Some(ClickEffect::Reveal(id)) => {
                if let Some(el) = state.element_by_id(&id) {
                    el.visible = true;
                    el.appears_after = None;
                }
            }
            Some(ClickEffect::SetText { target, text }) => {
                if let Some(el) = state.element_by_id(&target) {
                    el.text = text;
                }
            }
            None => {}
        }
        self.trace(&state, TraceEvent::new("click").with_detail(selector.to_string()));
        Ok(())
    }

    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record(format!("page.fill:{selector}"));
        let mut state = self.lock();
        let target = state.target(selector, index)?;
        let element = &mut state.elements[target];
        if !element.is_editable() {
            return Err(HarnessError::InputError {
                message: format!("<{}> is not an editable element", element.tag),
            });
        }
        element.value = Some(text.to_string());
        self.trace(&state, TraceEvent::new("fill").with_detail(selector.to_string()));
        Ok(())
    }

    async fn press(&self, selector: &Selector, index: usize, key: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.shared.stats.record(format!("page.press:{selector}:{key}"));
        let state = self.lock();
        state.target(selector, index)?;
        self.trace(
            &state,
            TraceEvent::new("press").with_detail(format!("{selector} {key}")),
        );
        Ok(())
    }

    async fn inner_html(&self, selector: &Selector) -> HarnessResult<String> {
        self.snapshot_gate("capture.dom", self.shared.faults.dom_snapshot)
            .await?;
        let state = self.lock();
        if matches!(selector, Selector::Css(css) if css.trim().eq_ignore_ascii_case("body")) {
            return Ok(state.body_html());
        }
        let target = state.target(selector, 0)?;
        Ok(state.elements[target].text.clone())
    }

    async fn accessibility_snapshot(&self) -> HarnessResult<Option<AccessibilityNode>> {
        self.snapshot_gate(
            "capture.accessibility",
            self.shared.faults.accessibility_snapshot,
        )
        .await?;
        let state = self.lock();
        if !state.loaded {
            return Ok(None);
        }
        let root = state
            .elements
            .iter()
            .filter(|el| state.is_attached(el))
            .filter_map(MockElement::accessibility_node)
            .fold(AccessibilityNode::new("WebArea", state.title.clone()), AccessibilityNode::with_child);
        Ok(Some(root))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::site::MockPageSpec;

    fn site() -> MockSite {
        MockSite::new()
            .with_page(
                "http://app/",
                MockPageSpec::new("Home")
                    .with(MockElement::heading("Welcome"))
                    .with(MockElement::button("Show").on_click(ClickEffect::Reveal("secret".into())))
                    .with(MockElement::paragraph("Hidden text").id("secret").role("status").hidden())
                    .with(MockElement::input("Name"))
                    .with(MockElement::link("Next", "http://app/next")),
            )
            .with_page("http://app/next", MockPageSpec::new("Next"))
    }

    async fn open(driver: &MockDriver) -> (Box<dyn Browser>, Box<dyn BrowserContext>, Arc<dyn Page>) {
        let browser = driver.launch(&LaunchOptions::default()).await.unwrap();
        let context = browser.new_context().await.unwrap();
        let page = context.new_page().await.unwrap();
        (browser, context, page)
    }

    #[tokio::test]
    async fn test_navigation_and_queries() {
        let driver = MockDriver::new(site());
        let (_b, _c, page) = open(&driver).await;
        assert_eq!(page.url().await.unwrap(), BLANK_URL);

        page.goto("http://app/").await.unwrap();
        let buttons = page.query_all(&Selector::role("button")).await.unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].text, "Show");

        let err = page.goto("http://nowhere/").await.unwrap_err();
        assert!(matches!(err, HarnessError::NavigationError { .. }));
        assert_eq!(page.url().await.unwrap(), "http://app/");
    }

    #[tokio::test]
    async fn test_click_effects() {
        let driver = MockDriver::new(site());
        let (_b, _c, page) = open(&driver).await;
        page.goto("http://app/").await.unwrap();

        let secret = Selector::css("#secret");
        assert!(!page.query_all(&secret).await.unwrap()[0].visible);
        page.click(&Selector::role("button"), 0).await.unwrap();
        assert!(page.query_all(&secret).await.unwrap()[0].visible);

        page.click(&Selector::role("link"), 0).await.unwrap();
        assert_eq!(page.url().await.unwrap(), "http://app/next");
    }

    #[tokio::test]
    async fn test_fill_requires_editable() {
        let driver = MockDriver::new(site());
        let (_b, _c, page) = open(&driver).await;
        page.goto("http://app/").await.unwrap();

        page.fill(&Selector::label("Name"), 0, "alice").await.unwrap();
        let state = page.query_all(&Selector::label("Name")).await.unwrap();
        assert_eq!(state[0].value.as_deref(), Some("alice"));

        let err = page.fill(&Selector::role("button"), 0, "x").await.unwrap_err();
        assert!(matches!(err, HarnessError::InputError { .. }));
    }

    #[tokio::test]
    async fn test_fresh_state_per_launch() {
        let driver = MockDriver::new(site());
        let (_b1, _c1, first) = open(&driver).await;
        first.goto("http://app/").await.unwrap();
        first.click(&Selector::role("button"), 0).await.unwrap();

        let (_b2, _c2, second) = open(&driver).await;
        second.goto("http://app/").await.unwrap();
        assert!(!second.query_all(&Selector::css("#secret")).await.unwrap()[0].visible);
        assert_eq!(driver.stats().launches(), 2);
    }

    #[tokio::test]
    async fn test_snapshots() {
        let driver = MockDriver::new(site());
        let (_b, _c, page) = open(&driver).await;
        assert!(page.accessibility_snapshot().await.unwrap().is_none());

        page.goto("http://app/").await.unwrap();
        let html = page.inner_html(&Selector::css("body")).await.unwrap();
        assert!(html.contains("<h1>Welcome</h1>"));
        let tree = page.accessibility_snapshot().await.unwrap().unwrap();
        assert_eq!(tree.name, "Home");
        assert!(tree.find("button", "Show").is_some());
        assert!(tree.find("status", "Hidden text").is_none());

        let stats = driver.stats();
        assert!(stats.was_called("capture.dom"));
        assert_eq!(stats.count("capture.accessibility"), 2);
    }

    #[tokio::test]
    async fn test_faults() {
        let faults = MockFaults::none().fail_dom_snapshot().fail_context_close();
        let driver = MockDriver::with_faults(site(), faults);
        let (browser, context, page) = open(&driver).await;
        page.goto("http://app/").await.unwrap();

        assert!(page.inner_html(&Selector::css("body")).await.is_err());
        assert!(page.accessibility_snapshot().await.is_ok());
        assert!(context.close().await.is_err());
        assert!(page.url().await.is_err());
        browser.close().await.unwrap();

        let stats = driver.stats();
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);

        let refused = MockDriver::with_faults(site(), MockFaults::none().fail_launch());
        assert!(refused.launch(&LaunchOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_trace_records_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.trace.json");
        let driver = MockDriver::new(site());
        let (_b, context, page) = open(&driver).await;

        context.start_tracing(&TraceOptions::all()).await.unwrap();
        page.goto("http://app/").await.unwrap();
        page.click(&Selector::role("button"), 0).await.unwrap();
        context.stop_tracing(&path).await.unwrap();

        let archive = crate::trace::TraceArchive::read(&path).unwrap();
        let actions: Vec<_> = archive.events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["goto", "click"]);
        assert!(archive.events[0].screenshot.is_some());
        assert!(archive.events[1]
            .dom_snapshot
            .as_deref()
            .unwrap()
            .contains("Hidden text"));
    }
}
