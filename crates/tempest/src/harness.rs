//! Run Controller: load, provision, bind, execute, report.
//!
//! ```text
//! procedure ──load──▶ LoadedProcedure
//!                         │
//! driver ──provision──▶ Session ──bind──▶ ExecutionContext
//!                         │                     │
//!                         └──────execute◀───────┘
//!                                  │
//!            Ok  ─▶ stop trace ─▶ close ─▶ PASS
//!            Err ─▶ capture ─▶ stop trace ─▶ close ─▶ FAIL + artifacts
//! ```
//!
//! Load and launch errors are returned as `Err`: there is no session to
//! capture from. Everything after provisioning produces a [`RunResult`],
//! and the session is closed exactly once on every path.

use crate::accessibility::AccessibilityNode;
use crate::artifacts::{self, ArtifactBundle};
use crate::config::HarnessConfig;
use crate::context::ExecutionContext;
use crate::driver::Driver;
use crate::loader::{self, LoadOptions, LoadedProcedure};
use crate::procedure::TestProcedure;
use crate::reporter::E2eTestSpec;
use crate::result::{FailureKind, HarnessError, HarnessResult};
use crate::session::{Session, SessionOptions};
use futures::future::{join_all, FutureExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// The procedure returned normally
    Pass,
    /// The procedure raised an error or panicked
    Fail,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// The original failure plus whatever artifacts were captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePayload {
    /// Error text
    pub message: String,
    /// Failure class, stable across runs
    pub kind: FailureKind,
    /// Markup of `<body>` at failure time
    pub dom_snapshot: Option<String>,
    /// Accessibility tree at failure time
    pub accessibility_snapshot: Option<AccessibilityNode>,
}

impl FailurePayload {
    /// Payload for `error` without artifacts
    #[must_use]
    pub fn new(error: &HarnessError) -> Self {
        Self::with_artifacts(error, ArtifactBundle::default())
    }

    /// Payload for `error` enriched with `bundle`
    #[must_use]
    pub fn with_artifacts(error: &HarnessError, bundle: ArtifactBundle) -> Self {
        Self {
            message: error.to_string(),
            kind: error.kind(),
            dom_snapshot: bundle.dom_snapshot,
            accessibility_snapshot: bundle.accessibility_snapshot,
        }
    }
}

/// Record of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Test name
    pub name: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// Pass or fail
    pub status: RunStatus,
    /// Present exactly when the run failed
    pub failure: Option<FailurePayload>,
    /// Where the trace was persisted, if it was
    pub trace_path: Option<PathBuf>,
    /// Wall time from invocation to teardown
    pub duration_ms: u64,
}

impl RunResult {
    /// A failed run that never got a session
    #[must_use]
    pub fn from_error(name: impl Into<String>, run_id: Uuid, error: &HarnessError, duration: Duration) -> Self {
        Self {
            name: name.into(),
            run_id,
            status: RunStatus::Fail,
            failure: Some(FailurePayload::new(error)),
            trace_path: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Whether the run passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Pass
    }

    /// Failure class, if the run failed
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// `Err` for a failed run, carrying the enriched failure
    pub fn into_outcome(self) -> Result<Self, TestFailure> {
        match self.failure {
            Some(payload) if self.status == RunStatus::Fail => Err(TestFailure {
                name: self.name,
                payload,
                trace_path: self.trace_path,
            }),
            failure => Ok(Self { failure, ..self }),
        }
    }
}

/// A failed run as an error value
#[derive(Debug, Clone, thiserror::Error)]
#[error("Test '{name}' failed: {}", .payload.message)]
pub struct TestFailure {
    /// Test name
    pub name: String,
    /// Failure with artifacts
    pub payload: FailurePayload,
    /// Persisted trace
    pub trace_path: Option<PathBuf>,
}

/// Per-run overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Overrides [`HarnessConfig::headless`]
    pub headless: Option<bool>,
    /// Overrides the default `<artifacts_dir>/<name>.trace.json`
    pub trace_path: Option<PathBuf>,
    /// Entry point to run from procedure source
    pub entry_point: Option<String>,
}

impl RunOptions {
    /// Show or hide the browser window
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Persist the trace at `path`
    #[must_use]
    pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    /// Run a named entry point
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }
}

/// Identity of a run being executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// Test name
    pub name: String,
    /// Run id
    pub run_id: Uuid,
    /// Trace destination
    pub trace_path: PathBuf,
}

/// A test in a suite
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Test name
    pub name: String,
    /// What to run
    pub procedure: TestProcedure,
    /// Entry point for procedure source
    pub entry_point: Option<String>,
}

impl TestCase {
    /// Create a test case
    #[must_use]
    pub fn new(name: impl Into<String>, procedure: impl Into<TestProcedure>) -> Self {
        Self {
            name: name.into(),
            procedure: procedure.into(),
            entry_point: None,
        }
    }

    /// Run a named entry point
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }
}

/// Tests executed together, concurrently
#[derive(Debug, Clone)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Tests in this suite
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Add a test case
    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Builder form of [`Self::add_test`]
    #[must_use]
    pub fn with_test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    /// Number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

/// Results from running a suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// One result per test, in suite order
    pub results: Vec<RunResult>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(RunResult::passed)
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed()).count()
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&RunResult> {
        self.results.iter().filter(|r| !r.passed()).collect()
    }
}

/// Runs procedures against browsers from one driver
#[derive(Clone)]
pub struct Harness {
    driver: Arc<dyn Driver>,
    config: HarnessConfig,
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Create a harness
    #[must_use]
    pub fn new(driver: impl Driver + 'static, config: HarnessConfig) -> Self {
        Self::from_arc(Arc::new(driver), config)
    }

    /// Create a harness over a shared driver
    #[must_use]
    pub fn from_arc(driver: Arc<dyn Driver>, config: HarnessConfig) -> Self {
        Self { driver, config }
    }

    /// Configuration in effect
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Default trace destination for a test
    #[must_use]
    pub fn trace_path_for(&self, name: &str) -> PathBuf {
        self.config
            .artifacts_dir
            .join(format!("{}.trace.json", slug(name)))
    }

    /// Run one procedure with default options
    pub async fn run_test(
        &self,
        name: &str,
        procedure: impl Into<TestProcedure>,
    ) -> HarnessResult<RunResult> {
        self.run_test_with(name, procedure, &RunOptions::default())
            .await
    }

    /// Load, provision, bind and execute.
    ///
    /// Returns `Err` only for load and launch failures.
    pub async fn run_test_with(
        &self,
        name: &str,
        procedure: impl Into<TestProcedure>,
        options: &RunOptions,
    ) -> HarnessResult<RunResult> {
        let trace_path = options
            .trace_path
            .clone()
            .unwrap_or_else(|| self.trace_path_for(name));
        let target = RunTarget {
            name: name.to_string(),
            run_id: Uuid::new_v4(),
            trace_path,
        };
        self.run_target(target, procedure.into(), options).await
    }

    /// Run the procedure of a generated test specification
    pub async fn run_spec(&self, spec: &E2eTestSpec) -> HarnessResult<RunResult> {
        tracing::debug!(test = %spec.test_name, target_url = %spec.target_url, "running generated test");
        self.run_test(&spec.test_name, spec.test_code.as_str()).await
    }

    /// Run every test of `suite` concurrently, one session each.
    ///
    /// Each test writes its trace to `<artifacts_dir>/<name>-<run_id>.trace.json`.
    /// Load and launch errors become failed results.
    pub async fn run_suite(&self, suite: &TestSuite) -> SuiteResults {
        let start = Instant::now();
        tracing::info!(suite = %suite.name, tests = suite.test_count(), "suite started");

        let runs = suite.tests.iter().map(|test| async move {
            let run_id = Uuid::new_v4();
            let target = RunTarget {
                name: test.name.clone(),
                run_id,
                trace_path: self
                    .config
                    .artifacts_dir
                    .join(format!("{}-{run_id}.trace.json", slug(&test.name))),
            };
            let options = RunOptions {
                entry_point: test.entry_point.clone(),
                ..RunOptions::default()
            };
            let started = Instant::now();
            match self.run_target(target, test.procedure.clone(), &options).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(test = %test.name, error = %err, "test could not start");
                    RunResult::from_error(&test.name, run_id, &err, started.elapsed())
                }
            }
        });
        let results = join_all(runs).await;

        let suite_results = SuiteResults {
            suite_name: suite.name.clone(),
            results,
            duration: start.elapsed(),
        };
        tracing::info!(
            suite = %suite.name,
            passed = suite_results.passed_count(),
            failed = suite_results.failed_count(),
            "suite finished"
        );
        suite_results
    }

    async fn run_target(
        &self,
        target: RunTarget,
        procedure: TestProcedure,
        options: &RunOptions,
    ) -> HarnessResult<RunResult> {
        let load_options = LoadOptions {
            entry_point: options.entry_point.clone(),
        };
        let procedure = loader::load(procedure, &load_options)?;

        let mut trace = SessionOptions::from_config(&self.config)
            .trace
            .with_title(target.name.as_str());
        if let Some(text) = procedure.source() {
            trace = trace.with_source(format!("{}.tempest", slug(&target.name)), text);
        }
        let session_options = SessionOptions::from_config(&self.config)
            .with_headless(options.headless.unwrap_or(self.config.headless))
            .with_trace(trace);

        let session = Session::provision(self.driver.as_ref(), &session_options).await?;
        let context = ExecutionContext::bind(&session);
        Ok(Self::execute(&procedure, context, session, target).await)
    }

    /// Invoke `procedure` with `context`, then capture, persist the trace
    /// and tear `session` down.
    ///
    /// Capture and trace failures are logged and never replace the
    /// procedure's own error. The session is closed exactly once, including
    /// when a capture step panics.
    pub async fn execute(
        procedure: &LoadedProcedure,
        context: ExecutionContext,
        mut session: Session,
        target: RunTarget,
    ) -> RunResult {
        let start = Instant::now();
        tracing::info!(test = %target.name, run_id = %target.run_id, "run started");

        let outcome = AssertUnwindSafe(procedure.run(&context))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(HarnessError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });
        drop(context);

        let failure = match outcome {
            Ok(()) => None,
            Err(error) => {
                tracing::debug!(test = %target.name, error = %error, "procedure failed");
                let bundle = AssertUnwindSafe(artifacts::capture(&session))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        tracing::warn!(
                            panic = %panic_message(payload.as_ref()),
                            "artifact capture panicked"
                        );
                        ArtifactBundle::default()
                    });
                Some(FailurePayload::with_artifacts(&error, bundle))
            }
        };

        let trace_path = AssertUnwindSafe(persist_trace(&mut session, &target.trace_path))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                tracing::warn!(panic = %panic_message(payload.as_ref()), "trace stop panicked");
                None
            });

        if let Err(err) = session.close().await {
            tracing::warn!(test = %target.name, error = %err, "session teardown failed");
        }

        let status = if failure.is_some() {
            RunStatus::Fail
        } else {
            RunStatus::Pass
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            test = %target.name,
            run_id = %target.run_id,
            status = %status,
            duration_ms,
            "run finished"
        );

        RunResult {
            name: target.name,
            run_id: target.run_id,
            status,
            failure,
            trace_path,
            duration_ms,
        }
    }
}

async fn persist_trace(session: &mut Session, path: &Path) -> Option<PathBuf> {
    match session.stop_trace(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "trace saved");
            Some(path.to_path_buf())
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to save trace");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "procedure panicked".to_string()
    }
}

/// File-name-safe form of a test name
#[must_use]
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "test".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement, MockFaults, MockPageSpec, MockSite};
    use crate::trace::TraceArchive;
    use std::time::Duration;

    fn site() -> MockSite {
        MockSite::new().with_page(
            "http://app/",
            MockPageSpec::new("Game")
                .with(MockElement::heading("Tic Tac Toe"))
                .with(MockElement::button("Start")),
        )
    }

    fn harness(driver: MockDriver, dir: &Path) -> Harness {
        let config = HarnessConfig::default()
            .with_default_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
            .with_artifacts_dir(dir);
        Harness::new(driver, config)
    }

    const PASSING: &str = r#"
async fn start_visible(ctx) {
    await ctx.page.goto("http://app/");
    await ctx.expect(ctx.page.get_by_role("button", name="Start")).to_be_visible();
}
"#;

    const FAILING: &str = r#"
async fn winner_shown(ctx) {
    await ctx.page.goto("http://app/");
    await ctx.expect(ctx.page.get_by_text("X wins")).to_be_visible();
}
"#;

    mod results {
        use super::*;

        #[test]
        fn test_slug() {
            assert_eq!(slug("X wins the game!"), "x-wins-the-game");
            assert_eq!(slug("test_login"), "test_login");
            assert_eq!(slug("  "), "test");
            assert_eq!(slug("a//b"), "a-b");
        }

        #[test]
        fn test_into_outcome() {
            let err = HarnessError::AssertionFailed {
                message: "nope".into(),
            };
            let failed = RunResult::from_error("t", Uuid::nil(), &err, Duration::ZERO);
            let failure = failed.into_outcome().unwrap_err();
            assert_eq!(failure.payload.kind, FailureKind::Assertion);
            assert_eq!(failure.to_string(), "Test 't' failed: Assertion failed: nope");

            let passed = RunResult {
                name: "t".into(),
                run_id: Uuid::nil(),
                status: RunStatus::Pass,
                failure: None,
                trace_path: None,
                duration_ms: 1,
            };
            assert!(passed.into_outcome().unwrap().passed());
        }

        #[test]
        fn test_status_serializes_uppercase() {
            assert_eq!(serde_json::to_string(&RunStatus::Pass).unwrap(), "\"PASS\"");
            assert_eq!(RunStatus::Fail.to_string(), "FAIL");
        }

        #[test]
        fn test_panic_message() {
            let payload: Box<dyn Any + Send> = Box::new("boom");
            assert_eq!(panic_message(payload.as_ref()), "boom");
            let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
            assert_eq!(panic_message(payload.as_ref()), "bang");
            let payload: Box<dyn Any + Send> = Box::new(7_u8);
            assert_eq!(panic_message(payload.as_ref()), "procedure panicked");
        }
    }

    mod runs {
        use super::*;

        #[tokio::test]
        async fn test_pass_persists_trace_and_closes() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let result = harness(driver, dir.path())
                .run_test("start visible", PASSING)
                .await
                .unwrap();

            assert!(result.passed());
            assert!(result.failure.is_none());
            let trace_path = result.trace_path.unwrap();
            assert_eq!(trace_path, dir.path().join("start-visible.trace.json"));
            let archive = TraceArchive::read(&trace_path).unwrap();
            assert_eq!(archive.title.as_deref(), Some("start visible"));
            assert_eq!(archive.sources.len(), 1);
            assert_eq!(stats.context_closes(), 1);
            assert_eq!(stats.browser_closes(), 1);
            assert!(!stats.was_called("capture."));
        }

        #[tokio::test]
        async fn test_fail_captures_before_teardown() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let result = harness(driver, dir.path())
                .run_test("winner", FAILING)
                .await
                .unwrap();

            assert_eq!(result.status, RunStatus::Fail);
            let failure = result.failure.unwrap();
            assert_eq!(failure.kind, FailureKind::Assertion);
            assert!(failure.message.contains("X wins"));
            assert!(failure.dom_snapshot.unwrap().contains("Start"));
            assert!(failure.accessibility_snapshot.is_some());
            assert!(result.trace_path.is_some());

            let capture = stats.position("capture.dom").unwrap();
            let trace = stats.position("tracing.stop").unwrap();
            let context = stats.position("context.close").unwrap();
            let browser = stats.position("browser.close").unwrap();
            assert!(capture < trace && trace < context && context < browser);
            assert_eq!(stats.count("context.close"), 1);
        }

        #[tokio::test]
        async fn test_secondary_failures_do_not_mask() {
            let dir = tempfile::tempdir().unwrap();
            let faults = MockFaults::none()
                .fail_dom_snapshot()
                .fail_trace_stop()
                .fail_context_close();
            let driver = MockDriver::with_faults(site(), faults);
            let stats = driver.stats();
            let result = harness(driver, dir.path())
                .run_test("winner", FAILING)
                .await
                .unwrap();

            let failure = result.failure.unwrap();
            assert_eq!(failure.kind, FailureKind::Assertion);
            assert!(failure.dom_snapshot.is_none());
            assert!(failure.accessibility_snapshot.is_some());
            assert!(result.trace_path.is_none());
            assert_eq!(stats.context_closes(), 1);
            assert_eq!(stats.browser_closes(), 1);
        }

        #[tokio::test]
        async fn test_load_error_before_provisioning() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let err = harness(driver, dir.path())
                .run_test("empty", "fn helper(ctx) {}")
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                HarnessError::Load(crate::result::LoadError::NoProcedureFound)
            ));
            assert_eq!(stats.launches(), 0);
        }

        #[tokio::test]
        async fn test_launch_error_propagates() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::with_faults(site(), MockFaults::none().fail_launch());
            let err = harness(driver, dir.path())
                .run_test("t", PASSING)
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::BrowserLaunchError { .. }));
        }

        #[tokio::test]
        async fn test_panic_is_a_failure() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let procedure = TestProcedure::from_fn(|_ctx| async {
                panic!("procedure exploded");
            });
            let result = harness(driver, dir.path())
                .run_test("boom", procedure)
                .await
                .unwrap();
            let failure = result.failure.unwrap();
            assert_eq!(failure.kind, FailureKind::Panic);
            assert!(failure.message.contains("procedure exploded"));
            assert_eq!(stats.context_closes(), 1);
        }

        #[tokio::test]
        async fn test_run_options() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let source = format!("{PASSING}\nasync fn other(ctx) {{ ctx.page.goto(\"http://nowhere/\"); }}");
            let options = RunOptions::default()
                .with_headless(false)
                .with_trace_path(dir.path().join("custom/run.json"))
                .with_entry_point("other");
            let result = harness(driver, dir.path())
                .run_test_with("t", source, &options)
                .await
                .unwrap();
            assert_eq!(result.failure_kind(), Some(FailureKind::Navigation));
            assert_eq!(result.trace_path, Some(dir.path().join("custom/run.json")));
            assert!(stats.was_called("launch:headless=false"));
        }

        #[tokio::test]
        async fn test_run_suite_concurrently() {
            let dir = tempfile::tempdir().unwrap();
            let driver = MockDriver::new(site());
            let stats = driver.stats();
            let suite = TestSuite::new("game")
                .with_test(TestCase::new("passes", PASSING))
                .with_test(TestCase::new("fails", FAILING))
                .with_test(TestCase::new("broken", "let x = 1;"));
            let results = harness(driver, dir.path()).run_suite(&suite).await;

            assert_eq!(results.total(), 3);
            assert_eq!(results.passed_count(), 1);
            assert_eq!(results.failed_count(), 2);
            assert!(!results.all_passed());
            assert_eq!(results.results[0].name, "passes");
            assert_eq!(
                results.failures()[1].failure_kind(),
                Some(FailureKind::Script)
            );
            let first = results.results[0].trace_path.clone().unwrap();
            assert!(first
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("passes-"));
            assert_eq!(stats.launches(), 2);
            assert_eq!(stats.context_closes(), 2);
        }

        #[tokio::test]
        async fn test_run_spec() {
            let dir = tempfile::tempdir().unwrap();
            let spec = E2eTestSpec {
                test_name: "start_visible".into(),
                test_description: "start button shows".into(),
                target_url: "http://app/".into(),
                test_steps: Vec::new(),
                test_code: PASSING.into(),
            };
            let result = harness(MockDriver::new(site()), dir.path())
                .run_spec(&spec)
                .await
                .unwrap();
            assert!(result.passed());
            assert_eq!(result.name, "start_visible");
        }
    }
}
