//! Locator abstraction for element selection and interaction.
//!
//! # Design Philosophy
//!
//! - **Auto-Waiting**: actions wait for the target to be attached, visible and enabled
//! - **Strict Selection**: fails if multiple elements match and no position was chosen
//! - **One Timeout**: every wait is bounded by the session timeout; there is no per-call override
//! - **Fluent API**: `page.get_by_role("button").with_name("Start").click()`

use crate::assertion::retry::RetryConfig;
use crate::driver::{ElementState, Page};
use crate::result::{HarnessError, HarnessResult};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A compiled regular expression that remembers how it was written
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern
    pub fn new(source: impl Into<String>, case_insensitive: bool) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source,
            case_insensitive,
            regex,
        })
    }

    /// Pattern source as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether matching ignores case
    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Whether the pattern matches anywhere in `text`
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Leftmost match in `text`
    #[must_use]
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)?;
        if self.case_insensitive {
            f.write_str("i")?;
        }
        Ok(())
    }
}

/// How a locator compares text (names, labels, content)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Case-insensitive substring after whitespace normalization
    Substring(String),
    /// Whole-string equality after whitespace normalization
    Exact(String),
    /// Regular expression search
    Pattern(Pattern),
}

impl TextMatch {
    /// Exact match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Turn a substring match into an exact one; patterns are unchanged
    #[must_use]
    pub fn into_exact(self) -> Self {
        match self {
            Self::Substring(s) => Self::Exact(s),
            other => other,
        }
    }

    /// Check a candidate string
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Substring(needle) => normalize_whitespace(candidate)
                .to_lowercase()
                .contains(&normalize_whitespace(needle).to_lowercase()),
            Self::Exact(expected) => {
                normalize_whitespace(candidate) == normalize_whitespace(expected)
            }
            Self::Pattern(pattern) => pattern.is_match(candidate),
        }
    }
}

impl From<&str> for TextMatch {
    fn from(s: &str) -> Self {
        Self::Substring(s.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(s: String) -> Self {
        Self::Substring(s)
    }
}

impl From<Pattern> for TextMatch {
    fn from(p: Pattern) -> Self {
        Self::Pattern(p)
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring(s) => write!(f, "{s:?}"),
            Self::Exact(s) => write!(f, "{s:?}, exact=true"),
            Self::Pattern(p) => write!(f, "{p}"),
        }
    }
}

/// Collapse runs of whitespace and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// ARIA role with optional accessible name filter
    Role {
        /// Role name
        role: String,
        /// Accessible name filter
        name: Option<TextMatch>,
    },
    /// Text content selector
    Text(TextMatch),
    /// Associated `<label>` or `aria-label`
    Label(TextMatch),
    /// Placeholder attribute
    Placeholder(TextMatch),
    /// Test ID selector (data-testid attribute)
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::Text(text.into())
    }

    /// Create a label selector
    #[must_use]
    pub fn label(text: impl Into<TextMatch>) -> Self {
        Self::Label(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Convert to a JavaScript expression yielding an array of matching elements.
    ///
    /// Relies on the `__tempest` helpers installed by the Chromium driver.
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::Role { role, name } => format!(
                "__tempest.all().filter(el => __tempest.role(el) === {role:?} && {})",
                name.as_ref()
                    .map_or_else(|| "true".to_string(), |m| text_match_js(m, "__tempest.name(el)"))
            ),
            Self::Text(m) => format!(
                "__tempest.all().filter(el => __tempest.ownText(el) && {})",
                text_match_js(m, "el.textContent")
            ),
            Self::Label(m) => format!(
                "__tempest.all().filter(el => __tempest.labelled(el) && {})",
                text_match_js(m, "__tempest.label(el)")
            ),
            Self::Placeholder(m) => format!(
                "Array.from(document.querySelectorAll('[placeholder]')).filter(el => {})",
                text_match_js(m, "el.getAttribute('placeholder')")
            ),
            Self::TestId(id) => {
                format!("Array.from(document.querySelectorAll('[data-testid={id:?}]'))")
            }
        }
    }
}

fn text_match_js(m: &TextMatch, subject: &str) -> String {
    match m {
        TextMatch::Substring(s) => format!(
            "__tempest.norm({subject}).toLowerCase().includes(__tempest.norm({s:?}).toLowerCase())"
        ),
        TextMatch::Exact(s) => format!("__tempest.norm({subject}) === __tempest.norm({s:?})"),
        TextMatch::Pattern(p) => format!(
            "new RegExp({:?}, {:?}).test({subject} || '')",
            p.source(),
            if p.is_case_insensitive() { "i" } else { "" }
        ),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "locator({s:?})"),
            Self::Role { role, name: None } => write!(f, "get_by_role({role:?})"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "get_by_role({role:?}, name={name})"),
            Self::Text(m) => write!(f, "get_by_text({m})"),
            Self::Label(m) => write!(f, "get_by_label({m})"),
            Self::Placeholder(m) => write!(f, "get_by_placeholder({m})"),
            Self::TestId(id) => write!(f, "get_by_test_id({id:?})"),
        }
    }
}

/// Which match a locator targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Exactly one element must match
    #[default]
    Strict,
    /// First match
    First,
    /// Last match
    Last,
    /// Zero-based match index
    Nth(usize),
}

/// Run `fut` under the session timeout, mapping expiry to [`HarnessError::Timeout`]
pub(crate) async fn bounded<T, F>(action: &str, timeout: Duration, fut: F) -> HarnessResult<T>
where
    F: Future<Output = HarnessResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| {
            Err(HarnessError::Timeout {
                action: action.to_string(),
                ms: timeout.as_millis() as u64,
                message: "driver did not respond".to_string(),
            })
        })
}

/// A locator for finding and interacting with elements.
#[derive(Clone)]
pub struct Locator {
    page: Arc<dyn Page>,
    selector: Selector,
    position: Position,
    retry: RetryConfig,
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.selector)
            .field("position", &self.position)
            .field("retry", &self.retry)
            .finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        match self.position {
            Position::Strict => Ok(()),
            Position::First => f.write_str(".first"),
            Position::Last => f.write_str(".last"),
            Position::Nth(i) => write!(f, ".nth({i})"),
        }
    }
}

impl Locator {
    /// Create a locator bound to a page
    #[must_use]
    pub fn new(page: Arc<dyn Page>, selector: Selector, retry: RetryConfig) -> Self {
        Self {
            page,
            selector,
            position: Position::Strict,
            retry,
        }
    }

    /// The selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// The targeted position
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Timing used by waits on this locator
    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Filter a role locator by accessible name; no effect on other selectors
    #[must_use]
    pub fn with_name(mut self, name: impl Into<TextMatch>) -> Self {
        if let Selector::Role { name: ref mut slot, .. } = self.selector {
            *slot = Some(name.into());
        }
        self
    }

    /// Require whole-string matches instead of substring matches
    #[must_use]
    pub fn exact(mut self) -> Self {
        self.selector = match self.selector {
            Selector::Role { role, name } => Selector::Role {
                role,
                name: name.map(TextMatch::into_exact),
            },
            Selector::Text(m) => Selector::Text(m.into_exact()),
            Selector::Label(m) => Selector::Label(m.into_exact()),
            Selector::Placeholder(m) => Selector::Placeholder(m.into_exact()),
            other => other,
        };
        self
    }

    /// Target the `index`-th match
    #[must_use]
    pub fn nth(mut self, index: usize) -> Self {
        self.position = Position::Nth(index);
        self
    }

    /// Target the first match
    #[must_use]
    pub fn first(mut self) -> Self {
        self.position = Position::First;
        self
    }

    /// Target the last match
    #[must_use]
    pub fn last(mut self) -> Self {
        self.position = Position::Last;
        self
    }

    /// Current state of every match
    pub async fn states(&self) -> HarnessResult<Vec<ElementState>> {
        bounded("query", self.retry.timeout, self.page.query_all(&self.selector)).await
    }

    /// Resolve the targeted index among `count` matches.
    ///
    /// `Ok(None)` means no element is targeted yet (keep waiting).
    pub fn resolve(&self, count: usize) -> HarnessResult<Option<usize>> {
        if count == 0 {
            return Ok(None);
        }
        match self.position {
            Position::Strict if count > 1 => Err(HarnessError::StrictModeViolation {
                selector: self.to_string(),
                count,
            }),
            Position::Strict | Position::First => Ok(Some(0)),
            Position::Last => Ok(Some(count - 1)),
            Position::Nth(i) => Ok((i < count).then_some(i)),
        }
    }

    /// The targeted element right now, if any
    pub async fn target(&self) -> HarnessResult<Option<ElementState>> {
        let states = self.states().await?;
        Ok(self.resolve(states.len())?.map(|i| states[i].clone()))
    }

    async fn wait_for(&self, action: &str, actionable: bool) -> HarnessResult<(usize, ElementState)> {
        let start = Instant::now();
        loop {
            let remaining = self.retry.timeout.saturating_sub(start.elapsed());
            let query = bounded(action, remaining, self.page.query_all(&self.selector));
            let last = match query.await {
                Ok(states) => match self.resolve(states.len())? {
                    Some(i) if !actionable || states[i].is_actionable() => {
                        return Ok((i, states[i].clone()));
                    }
                    Some(i) if !states[i].visible => "element is not visible".to_string(),
                    Some(_) => "element is not enabled".to_string(),
                    None => "no element matches".to_string(),
                },
                Err(e) => e.to_string(),
            };

            let elapsed = start.elapsed();
            if elapsed >= self.retry.timeout {
                return Err(HarnessError::Timeout {
                    action: format!("{self}.{action}"),
                    ms: self.retry.timeout_ms(),
                    message: last,
                });
            }
            tracing::trace!(locator = %self, action, %last, "waiting");
            tokio::time::sleep(self.retry.poll_interval.min(self.retry.timeout - elapsed)).await;
        }
    }

    /// Wait until actionable, then click
    pub async fn click(&self) -> HarnessResult<()> {
        let (index, _) = self.wait_for("click", true).await?;
        tracing::debug!(locator = %self, "click");
        bounded("click", self.retry.timeout, self.page.click(&self.selector, index)).await
    }

    /// Wait until actionable, then replace the value
    pub async fn fill(&self, text: &str) -> HarnessResult<()> {
        let (index, _) = self.wait_for("fill", true).await?;
        tracing::debug!(locator = %self, "fill");
        bounded(
            "fill",
            self.retry.timeout,
            self.page.fill(&self.selector, index, text),
        )
        .await
    }

    /// Wait until actionable, then press a key (e.g. "Enter")
    pub async fn press(&self, key: &str) -> HarnessResult<()> {
        let (index, _) = self.wait_for("press", true).await?;
        tracing::debug!(locator = %self, key, "press");
        bounded(
            "press",
            self.retry.timeout,
            self.page.press(&self.selector, index, key),
        )
        .await
    }

    /// Wait until attached, then read the text content
    pub async fn text_content(&self) -> HarnessResult<String> {
        let (_, state) = self.wait_for("text_content", false).await?;
        Ok(state.text)
    }

    /// Whether the targeted element is visible right now (no waiting)
    pub async fn is_visible(&self) -> HarnessResult<bool> {
        Ok(self.target().await?.is_some_and(|s| s.visible))
    }

    /// Number of matches right now (no waiting)
    pub async fn count(&self) -> HarnessResult<usize> {
        Ok(self.states().await?.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_substring_is_case_insensitive() {
            let m = TextMatch::from("start game");
            assert!(m.matches("  Start   Game now "));
            assert!(!m.matches("Stop"));
        }

        #[test]
        fn test_exact_normalizes_whitespace() {
            let m = TextMatch::exact("Add Task");
            assert!(m.matches(" Add \n Task "));
            assert!(!m.matches("Add Task!"));
            assert!(!m.matches("add task"));
        }

        #[test]
        fn test_pattern() {
            let p = Pattern::new(r"^\s*log in\s*$", true).unwrap();
            let m = TextMatch::from(p);
            assert!(m.matches(" Log In "));
            assert!(!m.matches("Log in now"));
        }

        #[test]
        fn test_into_exact() {
            assert_eq!(
                TextMatch::from("a").into_exact(),
                TextMatch::Exact("a".into())
            );
            let p = TextMatch::from(Pattern::new("a", false).unwrap());
            assert_eq!(p.clone().into_exact(), p);
        }

        #[test]
        fn test_pattern_display_and_eq() {
            let p = Pattern::new("sign in", true).unwrap();
            assert_eq!(p.to_string(), "/sign in/i");
            assert_eq!(p, Pattern::new("sign in", true).unwrap());
            assert_ne!(p, Pattern::new("sign in", false).unwrap());
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_css_query() {
            let query = Selector::css("button.primary").to_query();
            assert!(query.contains("querySelectorAll"));
            assert!(query.contains("button.primary"));
        }

        #[test]
        fn test_role_query() {
            let query = Selector::Role {
                role: "button".into(),
                name: Some(TextMatch::exact("Start")),
            }
            .to_query();
            assert!(query.contains("__tempest.role(el) === \"button\""));
            assert!(query.contains("=== __tempest.norm(\"Start\")"));
        }

        #[test]
        fn test_pattern_query() {
            let query =
                Selector::label(Pattern::new("email", true).unwrap()).to_query();
            assert!(query.contains("new RegExp(\"email\", \"i\")"));
        }

        #[test]
        fn test_test_id_query() {
            let query = Selector::test_id("score").to_query();
            assert!(query.contains("data-testid"));
            assert!(query.contains("score"));
        }

        #[test]
        fn test_display() {
            let s = Selector::Role {
                role: "button".into(),
                name: Some("Start".into()),
            };
            assert_eq!(s.to_string(), "get_by_role(\"button\", name=\"Start\")");
            assert_eq!(
                Selector::label(TextMatch::exact("Email")).to_string(),
                "get_by_label(\"Email\", exact=true)"
            );
            assert_eq!(Selector::css("#a").to_string(), "locator(\"#a\")");
        }
    }
}
