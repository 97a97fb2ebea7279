//! Auto-retrying assertions (Playwright's `expect()`).
//!
//! Every assertion polls the page until it holds or the session timeout
//! elapses, then fails with the last observed state.

pub mod retry;

use crate::driver::{ElementState, Page};
use crate::locator::{normalize_whitespace, Locator, TextMatch};
use crate::result::{HarnessError, HarnessResult};
use retry::{Observation, RetryAssertion, RetryConfig};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Assertion helper handed to procedures
#[derive(Debug, Clone, Copy)]
pub struct Expect {
    retry: RetryConfig,
}

impl Expect {
    /// Create an assertion helper polling with `retry`
    #[must_use]
    pub const fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Timing shared by all assertions from this helper
    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Assertions about a locator
    #[must_use]
    pub fn that(&self, locator: &Locator) -> LocatorAssertions {
        LocatorAssertions {
            locator: locator.clone(),
            retry: self.retry,
        }
    }

    /// Assertions about a page
    #[must_use]
    pub fn page(&self, page: Arc<dyn Page>) -> PageAssertions {
        PageAssertions {
            page,
            retry: self.retry,
        }
    }
}

async fn verify<F, Fut>(retry: RetryConfig, description: String, check: F) -> HarnessResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Observation>,
{
    match RetryAssertion::new(retry, check)
        .labelled(description.clone())
        .verify()
        .await
    {
        Ok(result) => {
            tracing::debug!(assertion = %description, attempts = result.attempts, "passed");
            Ok(())
        }
        Err(err) => Err(HarnessError::AssertionFailed {
            message: err.to_string(),
        }),
    }
}

/// Assertions on a locator
#[derive(Debug, Clone)]
pub struct LocatorAssertions {
    locator: Locator,
    retry: RetryConfig,
}

impl LocatorAssertions {
    async fn check_target<P>(&self, expectation: impl fmt::Display, predicate: P) -> HarnessResult<()>
    where
        P: Fn(Option<&ElementState>) -> Observation + Clone + Send + Sync,
    {
        let description = format!("expect({}).{expectation}", self.locator);
        let locator = self.locator.clone();
        verify(self.retry, description, move || {
            let locator = locator.clone();
            let predicate = predicate.clone();
            async move {
                match locator.target().await {
                    Ok(state) => predicate(state.as_ref()),
                    Err(e) => Observation::Missed(e.to_string()),
                }
            }
        })
        .await
    }

    /// Element is attached and visible
    pub async fn to_be_visible(&self) -> HarnessResult<()> {
        self.check_target("to_be_visible()", |state| match state {
            Some(s) if s.visible => Observation::Held,
            Some(_) => Observation::Missed("element is not visible".into()),
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Element is detached or not visible
    pub async fn to_be_hidden(&self) -> HarnessResult<()> {
        self.check_target("to_be_hidden()", |state| {
            Observation::when(!state.is_some_and(|s| s.visible), || {
                "element is visible".into()
            })
        })
        .await
    }

    /// Alias of [`Self::to_be_hidden`]
    pub async fn not_to_be_visible(&self) -> HarnessResult<()> {
        self.to_be_hidden().await
    }

    /// Full text equals `expected` (string) or matches it (pattern)
    pub async fn to_have_text(&self, expected: impl Into<TextMatch>) -> HarnessResult<()> {
        let expected = expected.into().into_exact();
        let shown = expected.to_string();
        self.check_target(format!("to_have_text({shown})"), move |state| match state {
            Some(s) => Observation::when(expected.matches(&s.text), || {
                format!("text was {:?}", normalize_whitespace(&s.text))
            }),
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Text contains `expected` (case-sensitive, whitespace-normalized)
    pub async fn to_contain_text(&self, expected: &str) -> HarnessResult<()> {
        let needle = normalize_whitespace(expected);
        self.check_target(format!("to_contain_text({expected:?})"), move |state| match state {
            Some(s) => {
                let text = normalize_whitespace(&s.text);
                Observation::when(text.contains(&needle), || {
                    format!("text was {text:?}")
                })
            }
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Form control value equals `expected`
    pub async fn to_have_value(&self, expected: &str) -> HarnessResult<()> {
        let expected = expected.to_string();
        self.check_target(format!("to_have_value({expected:?})"), move |state| match state {
            Some(s) => {
                let value = s.value.clone().unwrap_or_default();
                Observation::when(value == expected, || {
                    format!("value was {value:?}")
                })
            }
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Element is enabled
    pub async fn to_be_enabled(&self) -> HarnessResult<()> {
        self.check_target("to_be_enabled()", |state| match state {
            Some(s) => Observation::when(s.enabled, || "element is disabled".into()),
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Element is disabled
    pub async fn to_be_disabled(&self) -> HarnessResult<()> {
        self.check_target("to_be_disabled()", |state| match state {
            Some(s) => Observation::when(!s.enabled, || "element is enabled".into()),
            None => Observation::Missed("no element matches".into()),
        })
        .await
    }

    /// Number of matches equals `expected` (position is ignored)
    pub async fn to_have_count(&self, expected: usize) -> HarnessResult<()> {
        let description = format!("expect({}).to_have_count({expected})", self.locator);
        let locator = self.locator.clone();
        verify(self.retry, description, move || {
            let locator = locator.clone();
            async move {
                match locator.count().await {
                    Ok(count) => Observation::when(count == expected, || {
                        format!("count was {count}")
                    }),
                    Err(e) => Observation::Missed(e.to_string()),
                }
            }
        })
        .await
    }
}

/// Assertions on a page
#[derive(Clone)]
pub struct PageAssertions {
    page: Arc<dyn Page>,
    retry: RetryConfig,
}

impl fmt::Debug for PageAssertions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAssertions")
            .field("retry", &self.retry)
            .finish()
    }
}

impl PageAssertions {
    /// URL equals `expected` (string) or contains a match (pattern)
    pub async fn to_have_url(&self, expected: impl Into<TextMatch>) -> HarnessResult<()> {
        let expected = match expected.into() {
            TextMatch::Substring(s) | TextMatch::Exact(s) => UrlMatch::Equals(s),
            TextMatch::Pattern(p) => UrlMatch::Search(p),
        };
        let description = format!("expect(page).to_have_url({expected})");
        let page = self.page.clone();
        verify(self.retry, description, move || {
            let page = page.clone();
            let expected = expected.clone();
            async move {
                match page.url().await {
                    Ok(url) => Observation::when(expected.matches(&url), || {
                        format!("url was {url:?}")
                    }),
                    Err(e) => Observation::Missed(e.to_string()),
                }
            }
        })
        .await
    }
}

#[derive(Debug, Clone)]
enum UrlMatch {
    Equals(String),
    Search(crate::locator::Pattern),
}

impl UrlMatch {
    fn matches(&self, url: &str) -> bool {
        match self {
            Self::Equals(s) => url == s,
            Self::Search(p) => p.is_match(url),
        }
    }
}

impl fmt::Display for UrlMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(s) => write!(f, "{s:?}"),
            Self::Search(p) => write!(f, "{p}"),
        }
    }
}
