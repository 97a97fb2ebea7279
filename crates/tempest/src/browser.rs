//! Chromium driver over the Chrome DevTools Protocol.
//!
//! One Chromium process per [`Driver::launch`], one CDP browser context per
//! [`Browser::new_context`]. Element queries run as generated JavaScript
//! (see [`Selector::to_query`]) against helpers installed on demand as
//! `window.__tempest`. The trace is recorded by the driver itself: an
//! action log with optional PNG screenshots and body markup, written as
//! JSON when tracing stops.

use crate::accessibility::AccessibilityNode;
use crate::driver::{Browser, BrowserContext, Driver, ElementState, LaunchOptions, Page, TraceOptions};
use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::trace::{TraceEvent, TraceRecorder};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// In-page helpers shared by every generated query
const HELPERS: &str = r#"
if (!window.__tempest) {
  const norm = s => String(s == null ? '' : s).replace(/\s+/g, ' ').trim();
  const byId = id => { const el = document.getElementById(id); return el ? norm(el.textContent) : ''; };
  const inputRole = el => {
    switch ((el.getAttribute('type') || 'text').toLowerCase()) {
      case 'checkbox': return 'checkbox';
      case 'radio': return 'radio';
      case 'button': case 'submit': case 'reset': return 'button';
      case 'range': return 'slider';
      case 'search': return 'searchbox';
      case 'number': return 'spinbutton';
      case 'hidden': return '';
      default: return 'textbox';
    }
  };
  const implicit = {
    BUTTON: 'button', H1: 'heading', H2: 'heading', H3: 'heading', H4: 'heading',
    H5: 'heading', H6: 'heading', TEXTAREA: 'textbox', SELECT: 'combobox', IMG: 'img',
    UL: 'list', OL: 'list', LI: 'listitem', NAV: 'navigation', MAIN: 'main', FORM: 'form',
    DIALOG: 'dialog', TABLE: 'table', TR: 'row', TD: 'cell', TH: 'columnheader'
  };
  const t = {
    norm,
    all: () => Array.from(document.querySelectorAll('body *')),
    role: el => {
      const explicit = el.getAttribute('role');
      if (explicit) return explicit.split(' ')[0];
      if (el.tagName === 'A') return el.hasAttribute('href') ? 'link' : '';
      if (el.tagName === 'INPUT') return inputRole(el);
      return implicit[el.tagName] || '';
    },
    labelled: el => ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)
      || el.hasAttribute('aria-label') || el.hasAttribute('aria-labelledby'),
    label: el => {
      if (el.hasAttribute('aria-label')) return norm(el.getAttribute('aria-label'));
      if (el.hasAttribute('aria-labelledby')) {
        return norm(el.getAttribute('aria-labelledby').split(/\s+/).map(byId).join(' '));
      }
      if (el.id) {
        const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
        if (label) return norm(label.textContent);
      }
      const wrapping = el.closest('label');
      return wrapping ? norm(wrapping.textContent) : '';
    },
    name: el => {
      const label = t.label(el);
      if (label) return label;
      if (el.tagName === 'IMG') return norm(el.getAttribute('alt'));
      if (el.tagName === 'INPUT' && ['button', 'submit', 'reset'].includes(el.type)) return norm(el.value);
      const role = t.role(el);
      if (['button', 'link', 'heading', 'tab', 'menuitem', 'option', 'cell', 'columnheader', 'listitem', 'checkbox', 'radio'].includes(role)) {
        return norm(el.textContent);
      }
      return norm(el.getAttribute('title'));
    },
    ownText: el => Array.from(el.childNodes).some(n => n.nodeType === 3 && n.textContent.trim()),
    visible: el => {
      const style = getComputedStyle(el);
      const rect = el.getBoundingClientRect();
      return style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0;
    },
    enabled: el => !el.disabled && el.getAttribute('aria-disabled') !== 'true',
    state: el => ({
      tag: el.tagName.toLowerCase(),
      text: norm(el.innerText !== undefined ? el.innerText : el.textContent),
      value: typeof el.value === 'string' && ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName) ? el.value : null,
      visible: t.visible(el),
      enabled: t.enabled(el)
    }),
    tree: el => {
      const children = Array.from(el.children).filter(t.visible).flatMap(child => {
        const node = t.tree(child);
        return node.role ? [node] : node.children;
      });
      const role = t.role(el);
      const node = { role, name: role ? t.name(el) : '', disabled: !t.enabled(el), children };
      if (['textbox', 'searchbox', 'combobox', 'spinbutton', 'slider'].includes(role)) node.value = el.value;
      return node;
    },
    target: (list, index) => {
      const el = list[index];
      if (!el) throw new Error('element is not attached');
      el.scrollIntoView({ block: 'center', inline: 'center' });
      return el;
    }
  };
  window.__tempest = t;
}
"#;

fn page_error(err: impl std::fmt::Display) -> HarnessError {
    HarnessError::PageError {
        message: err.to_string(),
    }
}

/// Drives a locally installed Chromium
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    /// Create a driver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn launch(&self, options: &LaunchOptions) -> HarnessResult<Box<dyn Browser>> {
        let mut builder = CdpConfig::builder().request_timeout(options.default_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|message| HarnessError::BrowserLaunchError { message })?;

        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(|e| {
            HarnessError::BrowserLaunchError {
                message: e.to_string(),
            }
        })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("CDP handler loop ended");
                    break;
                }
            }
        });
        tracing::info!(headless = options.headless, "chromium launched");

        Ok(Box::new(ChromiumBrowser {
            inner: Arc::new(tokio::sync::Mutex::new(browser)),
            handler: Mutex::new(Some(handler)),
        }))
    }
}

struct ChromiumBrowser {
    inner: Arc<tokio::sync::Mutex<CdpBrowser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_context(&self) -> HarnessResult<Box<dyn BrowserContext>> {
        let id = self
            .inner
            .lock()
            .await
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| HarnessError::ContextError {
                message: e.to_string(),
            })?
            .result
            .browser_context_id;
        Ok(Box::new(ChromiumContext {
            browser: self.inner.clone(),
            id,
            recorder: Arc::new(TraceRecorder::new()),
            pages: Mutex::new(Vec::new()),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        let result = {
            let mut browser = self.inner.lock().await;
            match browser.close().await {
                Ok(_) => browser.wait().await.map(|_| ()).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            }
        };
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
        result.map_err(|message| HarnessError::TeardownError { message })
    }
}

struct ChromiumContext {
    browser: Arc<tokio::sync::Mutex<CdpBrowser>>,
    id: BrowserContextId,
    recorder: Arc<TraceRecorder>,
    pages: Mutex<Vec<CdpPage>>,
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn set_default_timeout(&self, timeout: std::time::Duration) -> HarnessResult<()> {
        // CDP requests are already bounded by the launch-time request timeout.
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "context timeout set");
        Ok(())
    }

    async fn start_tracing(&self, options: &TraceOptions) -> HarnessResult<()> {
        self.recorder.start(options)
    }

    async fn stop_tracing(&self, path: &Path) -> HarnessResult<()> {
        let archive = self.recorder.stop(path)?;
        tracing::debug!(
            path = %path.display(),
            events = archive.events.len(),
            "trace written"
        );
        Ok(())
    }

    async fn new_page(&self) -> HarnessResult<Arc<dyn Page>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(page_error)?;
        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(page_error)?;
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(page.clone());
        Ok(Arc::new(ChromiumPage {
            page,
            recorder: self.recorder.clone(),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        let pages: Vec<CdpPage> = std::mem::take(
            &mut *self.pages.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for page in pages {
            if let Err(err) = page.close().await {
                tracing::debug!(error = %err, "page already gone");
            }
        }
        self.browser
            .lock()
            .await
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .map(|_| ())
            .map_err(|e| HarnessError::TeardownError {
                message: e.to_string(),
            })
    }
}

struct ChromiumPage {
    page: CdpPage,
    recorder: Arc<TraceRecorder>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, expr: &str) -> HarnessResult<T> {
        let script = format!("(() => {{ {HELPERS}\n return ({expr}); }})()");
        self.page
            .evaluate(script)
            .await
            .map_err(page_error)?
            .into_value()
            .map_err(page_error)
    }

    async fn act(&self, selector: &Selector, index: usize, body: &str) -> HarnessResult<()> {
        let expr = format!(
            "(() => {{ const el = __tempest.target({}, {index}); {body}; return true; }})()",
            selector.to_query()
        );
        self.eval::<bool>(&expr).await.map(|_| ())
    }

    async fn body_html(&self) -> HarnessResult<String> {
        self.eval("document.body ? document.body.innerHTML : ''").await
    }

    async fn record(&self, event: TraceEvent) {
        let Some(flags) = self.recorder.flags() else {
            return;
        };
        let mut event = event;
        if flags.screenshots {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            match self.page.screenshot(params).await {
                Ok(png) => event = event.with_screenshot(&png),
                Err(err) => tracing::debug!(error = %err, "trace screenshot skipped"),
            }
        }
        if flags.snapshots {
            if let Ok(html) = self.body_html().await {
                event = event.with_dom_snapshot(html);
            }
        }
        self.recorder.record(event);
    }

    async fn traced(&self, event: TraceEvent, result: HarnessResult<()>) -> HarnessResult<()> {
        let event = match &result {
            Ok(()) => event,
            Err(err) => event.with_error(err.to_string()),
        };
        self.record(event).await;
        result
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        let result = self
            .page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| HarnessError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            });
        self.traced(TraceEvent::new("goto").with_detail(url), result)
            .await
    }

    async fn url(&self) -> HarnessResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(page_error)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn reload(&self) -> HarnessResult<()> {
        let result = self.page.reload().await.map(|_| ()).map_err(page_error);
        self.traced(TraceEvent::new("reload"), result).await
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementState>> {
        self.eval(&format!("{}.map(__tempest.state)", selector.to_query()))
            .await
    }

    async fn click(&self, selector: &Selector, index: usize) -> HarnessResult<()> {
        let result = self.act(selector, index, "el.click()").await;
        self.traced(
            TraceEvent::new("click").with_detail(selector.to_string()),
            result,
        )
        .await
    }

    async fn fill(&self, selector: &Selector, index: usize, text: &str) -> HarnessResult<()> {
        let body = format!(
            "if (el.isContentEditable) {{ el.textContent = {text:?}; }} \
             else if ('value' in el) {{ el.focus(); el.value = {text:?}; }} \
             else {{ throw new Error('element is not an <input>, <textarea> or [contenteditable]'); }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }}))"
        );
        let result = self
            .act(selector, index, &body)
            .await
            .map_err(|e| HarnessError::InputError {
                message: e.to_string(),
            });
        self.traced(
            TraceEvent::new("fill").with_detail(selector.to_string()),
            result,
        )
        .await
    }

    async fn press(&self, selector: &Selector, index: usize, key: &str) -> HarnessResult<()> {
        let body = format!(
            "el.focus(); \
             for (const type of ['keydown', 'keypress', 'keyup']) {{ \
               el.dispatchEvent(new KeyboardEvent(type, {{ key: {key:?}, bubbles: true }})); \
             }} \
             if ({key:?} === 'Enter' && el.form) {{ el.form.requestSubmit(); }}"
        );
        let result = self
            .act(selector, index, &body)
            .await
            .map_err(|e| HarnessError::InputError {
                message: e.to_string(),
            });
        self.traced(
            TraceEvent::new("press").with_detail(format!("{selector} {key}")),
            result,
        )
        .await
    }

    async fn inner_html(&self, selector: &Selector) -> HarnessResult<String> {
        if matches!(selector, Selector::Css(css) if css.trim().eq_ignore_ascii_case("body")) {
            return self.body_html().await;
        }
        self.eval(&format!(
            "(() => {{ const el = {}[0]; return el ? el.innerHTML : ''; }})()",
            selector.to_query()
        ))
        .await
    }

    async fn accessibility_snapshot(&self) -> HarnessResult<Option<AccessibilityNode>> {
        let root: Option<AccessibilityNode> = self
            .eval(
                "document.body ? Object.assign(__tempest.tree(document.body), \
                 { role: 'WebArea', name: document.title }) : null",
            )
            .await?;
        Ok(root)
    }
}
