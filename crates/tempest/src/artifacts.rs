//! Artifact Capturer: best-effort snapshots of the page at failure time.

use crate::accessibility::AccessibilityNode;
use crate::driver::Page;
use crate::locator::{bounded, Selector};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whatever could be captured; empty is valid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// Rendered markup of `<body>`
    pub dom_snapshot: Option<String>,
    /// Accessibility tree of the page
    pub accessibility_snapshot: Option<AccessibilityNode>,
}

impl ArtifactBundle {
    /// Nothing was captured
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.dom_snapshot.is_none() && self.accessibility_snapshot.is_none()
    }
}

/// Capture artifacts from a live session
pub async fn capture(session: &Session) -> ArtifactBundle {
    capture_page(session.page().as_ref(), session.timeout()).await
}

/// Capture artifacts from `page`, bounding each attempt by `timeout`.
///
/// The DOM and accessibility snapshots are attempted independently; a
/// failure is logged and leaves that field empty.
pub async fn capture_page(page: &dyn Page, timeout: Duration) -> ArtifactBundle {
    let body = Selector::css("body");
    let dom_snapshot = match bounded("capture.dom", timeout, page.inner_html(&body)).await {
        Ok(markup) => Some(markup),
        Err(err) => {
            tracing::warn!(error = %err, "DOM snapshot capture failed");
            None
        }
    };

    let accessibility_snapshot =
        match bounded("capture.accessibility", timeout, page.accessibility_snapshot()).await {
            Ok(tree) => tree,
            Err(err) => {
                tracing::warn!(error = %err, "accessibility snapshot capture failed");
                None
            }
        };

    ArtifactBundle {
        dom_snapshot,
        accessibility_snapshot,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement, MockFaults, MockPageSpec, MockSite};
    use crate::session::SessionOptions;

    fn site() -> MockSite {
        MockSite::new().with_page(
            "http://app/",
            MockPageSpec::new("Shop")
                .with(MockElement::heading("Cart"))
                .with(MockElement::button("Checkout")),
        )
    }

    async fn capture_with(faults: MockFaults) -> (MockDriver, ArtifactBundle) {
        let driver = MockDriver::with_faults(site(), faults);
        let mut options = SessionOptions::default();
        options.launch.default_timeout = Duration::from_millis(100);
        let session = Session::provision(&driver, &options).await.unwrap();
        session.page().goto("http://app/").await.unwrap();
        let bundle = capture(&session).await;
        session.close().await.unwrap();
        (driver, bundle)
    }

    #[tokio::test]
    async fn test_captures_both() {
        let (driver, bundle) = capture_with(MockFaults::none()).await;
        assert!(bundle.dom_snapshot.unwrap().contains("Checkout"));
        let tree = bundle.accessibility_snapshot.unwrap();
        assert!(tree.find("button", "Checkout").is_some());
        assert!(driver.stats().position("capture.dom") < driver.stats().position("capture.accessibility"));
    }

    #[tokio::test]
    async fn test_dom_failure_keeps_accessibility() {
        let (driver, bundle) = capture_with(MockFaults::none().fail_dom_snapshot()).await;
        assert!(bundle.dom_snapshot.is_none());
        assert!(bundle.accessibility_snapshot.is_some());
        assert!(driver.stats().was_called("capture.accessibility"));
    }

    #[tokio::test]
    async fn test_accessibility_failure_keeps_dom() {
        let (_driver, bundle) = capture_with(MockFaults::none().fail_accessibility_snapshot()).await;
        assert!(bundle.dom_snapshot.is_some());
        assert!(bundle.accessibility_snapshot.is_none());
    }

    #[tokio::test]
    async fn test_unresponsive_page_yields_empty_bundle() {
        let (driver, bundle) = capture_with(MockFaults::none().stall_snapshots()).await;
        assert!(bundle.is_empty());
        assert_eq!(driver.stats().context_closes(), 1);
    }

    #[test]
    fn test_bundle_serializes() {
        let bundle = ArtifactBundle {
            dom_snapshot: Some("<p>x</p>".into()),
            accessibility_snapshot: None,
        };
        let json = serde_json::to_string(&bundle).unwrap();
        let back: ArtifactBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
        assert!(ArtifactBundle::default().is_empty());
    }
}
