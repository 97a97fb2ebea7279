//! Tempest: a harness for running generated browser end-to-end tests
//!
//! Tempest executes a single test procedure against a live browser session
//! and reports pass/fail. When a procedure fails it captures the page's DOM
//! and accessibility tree before the session is torn down, and it always
//! persists the interaction trace.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    TEMPEST Run Pipeline                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Procedure  │    │ Execution  │    │   Run      │            │
//! │   │ Loader     │───►│ Context    │───►│ Controller │            │
//! │   │            │    │ Binder     │    │            │            │
//! │   └────────────┘    └─────▲──────┘    └─────┬──────┘            │
//! │                           │                 │                   │
//! │                     ┌─────┴──────┐    ┌─────▼──────┐            │
//! │                     │  Session   │    │  Artifact  │            │
//! │                     │ Provisioner│    │  Capturer  │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tempest::{Harness, HarnessConfig, MockDriver, MockElement, MockPageSpec, MockSite};
//!
//! # async fn demo() -> tempest::HarnessResult<()> {
//! let site = MockSite::new().with_page(
//!     "http://localhost:8080/",
//!     MockPageSpec::new("Game").with(MockElement::button("Start")),
//! );
//! let harness = Harness::new(MockDriver::new(site), HarnessConfig::default());
//! let result = harness
//!     .run_test(
//!         "start button",
//!         r#"async fn t(ctx) {
//!             await ctx.page.goto("http://localhost:8080/");
//!             await ctx.expect(ctx.page.get_by_role("button", name="Start")).to_be_visible();
//!         }"#,
//!     )
//!     .await?;
//! assert!(result.passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod accessibility;
mod artifacts;
mod assertion;
#[cfg(feature = "browser")]
#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
mod browser;
mod config;
mod context;
mod driver;
mod harness;
mod loader;
mod locator;
mod procedure;
mod reporter;
mod result;
mod session;
mod trace;

/// Deterministic in-process driver for tests
pub mod mock;

/// Procedure source language: lexer, parser, compiler and interpreter
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod script;

pub use accessibility::{implicit_role, AccessibilityNode};
pub use artifacts::{capture, capture_page, ArtifactBundle};
pub use assertion::retry::{Observation, RetryAssertion, RetryConfig, RetryError, Settled};
pub use assertion::{Expect, LocatorAssertions, PageAssertions};
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use config::{
    HarnessConfig, TraceSettings, DEFAULT_ARTIFACTS_DIR, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use context::{ExecutionContext, IdGenerator, PageHandle, PatternMatcher};
pub use driver::{
    Browser, BrowserContext, Driver, ElementState, LaunchOptions, Page, TraceOptions, TraceSource,
};
pub use harness::{
    slug, FailurePayload, Harness, RunOptions, RunResult, RunStatus, RunTarget, SuiteResults,
    TestCase, TestFailure, TestSuite,
};
pub use loader::{load, LoadOptions, LoadedProcedure};
pub use locator::{normalize_whitespace, Locator, Pattern, Position, Selector, TextMatch};
pub use mock::{ClickEffect, MockDriver, MockElement, MockFaults, MockPageSpec, MockSite, MockStats};
pub use procedure::{FnProcedure, Procedure, TestProcedure};
pub use reporter::{E2eTestSpec, TestOutput, TestStep};
pub use result::{FailureKind, HarnessError, HarnessResult, LoadError};
pub use script::{compile, Script, ScriptProcedure};
pub use session::{Session, SessionOptions};
pub use trace::{TraceArchive, TraceEvent, TraceFlags, TraceRecorder, MAX_EVENTS, TRACE_FORMAT_VERSION};
