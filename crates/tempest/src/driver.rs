//! Driver capability: the browser engine as seen by the harness.
//!
//! The harness never talks to a browser directly. It consumes these traits,
//! which keeps the run controller testable against [`crate::mock::MockDriver`]
//! and lets [`crate::browser::ChromiumDriver`] (feature `browser`) be swapped
//! for another engine.
//!
//! ```text
//! Driver ──launch──► Browser ──new_context──► BrowserContext ──new_page──► Page
//!                      │                        │  tracing start/stop
//!                      └─ close                 └─ close
//! ```

use crate::accessibility::AccessibilityNode;
use crate::locator::Selector;
use crate::result::HarnessResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Options for launching one browser process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Default timeout for engine-level operations
    pub default_timeout: Duration,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            default_timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            chromium_path: None,
            sandbox: true,
        }
    }
}

/// Source text embedded in a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSource {
    /// Display name (usually the test name)
    pub name: String,
    /// Source text
    pub text: String,
}

/// Options for starting trace recording
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOptions {
    /// Capture a screenshot after each action
    pub screenshots: bool,
    /// Capture a DOM snapshot after each action
    pub snapshots: bool,
    /// Embed sources in the trace
    pub sources: bool,
    /// Trace title
    pub title: Option<String>,
    /// Sources to embed when `sources` is on
    pub source_files: Vec<TraceSource>,
}

impl TraceOptions {
    /// Capture everything
    #[must_use]
    pub const fn all() -> Self {
        Self {
            screenshots: true,
            snapshots: true,
            sources: true,
            title: None,
            source_files: Vec::new(),
        }
    }

    /// Set the trace title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach a source file (ignored when `sources` is off)
    #[must_use]
    pub fn with_source(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        if self.sources {
            self.source_files.push(TraceSource {
                name: name.into(),
                text: text.into(),
            });
        }
        self
    }
}

/// State of one element matched by a selector, read at query time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementState {
    /// Lowercase tag name
    pub tag: String,
    /// Text content
    pub text: String,
    /// Form control value
    #[serde(default)]
    pub value: Option<String>,
    /// Rendered and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
            value: None,
            visible: true,
            enabled: true,
        }
    }

    /// Whether the element can receive input
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Launches browsers
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch a fresh browser process
    async fn launch(&self, options: &LaunchOptions) -> HarnessResult<Box<dyn Browser>>;
}

/// A running browser process
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh context with no shared cookies or storage
    async fn new_context(&self) -> HarnessResult<Box<dyn BrowserContext>>;

    /// Close the browser
    async fn close(&self) -> HarnessResult<()>;
}

/// An isolated browser context owning pages and a trace recorder
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Set the default timeout for engine-level operations in this context
    async fn set_default_timeout(&self, timeout: Duration) -> HarnessResult<()>;

    /// Start recording a trace
    async fn start_tracing(&self, options: &TraceOptions) -> HarnessResult<()>;

    /// Stop recording and persist the trace archive to `path`
    async fn stop_tracing(&self, path: &Path) -> HarnessResult<()>;

    /// Open a page in this context
    async fn new_page(&self) -> HarnessResult<Arc<dyn Page>>;

    /// Close the context and all of its pages
    async fn close(&self) -> HarnessResult<()>;
}

/// A page in a browser context.
///
/// Primitives here never wait: the auto-waiting and auto-retrying behavior
/// lives in [`crate::locator::Locator`] and [`crate::assertion::Expect`].
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to URL
    async fn goto(&self, url: &str) -> HarnessResult<()>;

    /// Get current URL
    async fn url(&self) -> HarnessResult<String>;

    /// Reload page
    async fn reload(&self) -> HarnessResult<()>;

    /// State of every element currently matching `selector`, in document order
    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementState>>;

    /// Click the `index`-th match
    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()>;

    /// Replace the value of the `index`-th match
    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()>;

    /// Press a key on the `index`-th match
    async fn press(&self, selector: &Selector, index: usize, key: &str) -> HarnessResult<()>;

    /// Inner markup of the first match
    async fn inner_html(&self, selector: &Selector) -> HarnessResult<String>;

    /// Accessibility tree of the page, `None` when the page has no tree yet
    async fn accessibility_snapshot(&self) -> HarnessResult<Option<AccessibilityNode>>;
}
