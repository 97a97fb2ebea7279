//! End-to-end run scenarios against the mock driver
//!
//! Each test drives the full load → provision → bind → execute pipeline and
//! checks the lifecycle guarantees through `MockStats`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;
use tempest::{
    load, ClickEffect, ExecutionContext, FailureKind, Harness, HarnessConfig, HarnessError,
    LoadError, LoadOptions, MockDriver, MockElement, MockFaults, MockPageSpec, MockSite,
    RunOptions, RunStatus, Session, SessionOptions, TestOutput, TestProcedure,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tempest=debug")
        .try_init();
}

fn game_site() -> MockSite {
    MockSite::new()
        .with_page(
            "http://game.test/",
            MockPageSpec::new("Tic Tac Toe")
                .with(MockElement::heading("Tic Tac Toe"))
                .with(MockElement::input("Player name").placeholder("Your name"))
                .with(MockElement::button("Start").on_click(ClickEffect::Reveal("board".into())))
                .with(
                    MockElement::new("div")
                        .id("board")
                        .role("grid")
                        .name("Board")
                        .hidden(),
                )
                .with(MockElement::link("Rules", "http://game.test/rules")),
        )
        .with_page(
            "http://game.test/rules",
            MockPageSpec::new("Rules").with(MockElement::heading("How to play")),
        )
        .with_page(
            "http://game.test/slow",
            MockPageSpec::new("Slow").with(
                MockElement::paragraph("Loaded")
                    .test_id("status")
                    .appears_after(Duration::from_millis(60)),
            ),
        )
}

fn harness(driver: MockDriver, dir: &TempDir) -> Harness {
    let config = HarnessConfig::default()
        .with_default_timeout(Duration::from_millis(300))
        .with_poll_interval(Duration::from_millis(10))
        .with_artifacts_dir(dir.path());
    Harness::new(driver, config)
}

const START_GAME: &str = r#"
let BASE = "http://game.test";

async fn start_game(ctx) {
    await ctx.page.goto(BASE + "/");
    await ctx.page.get_by_placeholder("Your name").fill("alice");
    await ctx.page.get_by_role("button", name=ctx.re.compile("start", ctx.re.I)).click();
    await ctx.expect(ctx.page.get_by_role("grid", name="Board")).to_be_visible();
}
"#;

const WINNER_SHOWN: &str = r#"
async fn winner_shown(ctx) {
    await ctx.page.goto("http://game.test/");
    await ctx.expect(ctx.page.get_by_text("X wins")).to_be_visible();
}
"#;

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_passing_run_closes_session_once() {
        init_logging();
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();

        let result = harness(driver, &dir).run_test("start game", START_GAME).await.unwrap();

        assert_eq!(result.status, RunStatus::Pass);
        assert_eq!(stats.launches(), 1);
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);
        assert!(result.trace_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_failing_run_reports_dom_snapshot() {
        init_logging();
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();

        let result = harness(driver, &dir).run_test("winner", WINNER_SHOWN).await.unwrap();

        assert_eq!(result.status, RunStatus::Fail);
        let failure = result.failure.as_ref().unwrap();
        assert!(!failure.message.is_empty());
        assert!(failure.dom_snapshot.as_deref().unwrap().contains("Tic Tac Toe"));
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);

        let output = TestOutput::from(&result);
        let text = output.failure_output.unwrap();
        assert!(text.contains("DOM SNAPSHOT:"));
        assert!(text.contains("ACCESSIBILITY SNAPSHOT:"));
        assert!(text.contains("- heading \"Tic Tac Toe\""));
    }

    #[tokio::test]
    async fn test_capture_and_trace_stop_precede_teardown() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();

        harness(driver, &dir).run_test("winner", WINNER_SHOWN).await.unwrap();

        let order: Vec<usize> = [
            "capture.dom",
            "capture.accessibility",
            "tracing.stop",
            "context.close",
            "browser.close",
        ]
        .iter()
        .map(|event| stats.position(event).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "order was {order:?}");
    }

    #[tokio::test]
    async fn test_unresponsive_page_still_tears_down() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::with_faults(game_site(), MockFaults::none().stall_snapshots());
        let stats = driver.stats();

        let result = harness(driver, &dir).run_test("winner", WINNER_SHOWN).await.unwrap();

        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Assertion);
        assert!(failure.dom_snapshot.is_none());
        assert!(failure.accessibility_snapshot.is_none());
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);
    }

    #[tokio::test]
    async fn test_stalled_element_queries_fail_the_run() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::with_faults(game_site(), MockFaults::none().stall_queries());
        let stats = driver.stats();

        let harness = harness(driver, &dir);
        let run = harness.run_test("start", START_GAME);
        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run must be bounded by the session timeout")
            .unwrap();

        assert_eq!(result.status, RunStatus::Fail);
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert!(result.failure.unwrap().dom_snapshot.is_some());
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);
    }

    #[tokio::test]
    async fn test_teardown_failures_are_not_escalated() {
        let dir = TempDir::new().unwrap();
        let faults = MockFaults::none().fail_context_close().fail_browser_close();
        let driver = MockDriver::with_faults(game_site(), faults);
        let stats = driver.stats();

        let result = harness(driver, &dir).run_test("start", START_GAME).await.unwrap();

        assert!(result.passed());
        assert_eq!(stats.context_closes(), 1);
        assert_eq!(stats.browser_closes(), 1);
    }
}

mod capture {
    use super::*;

    #[tokio::test]
    async fn test_dom_failure_keeps_accessibility_tree() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::with_faults(game_site(), MockFaults::none().fail_dom_snapshot());
        let result = harness(driver, &dir).run_test("winner", WINNER_SHOWN).await.unwrap();
        let failure = result.failure.unwrap();
        assert!(failure.dom_snapshot.is_none());
        assert!(failure
            .accessibility_snapshot
            .unwrap()
            .find("button", "Start")
            .is_some());
    }

    #[tokio::test]
    async fn test_accessibility_failure_keeps_dom() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::with_faults(
            game_site(),
            MockFaults::none().fail_accessibility_snapshot(),
        );
        let result = harness(driver, &dir).run_test("winner", WINNER_SHOWN).await.unwrap();
        let failure = result.failure.unwrap();
        assert!(failure.dom_snapshot.is_some());
        assert!(failure.accessibility_snapshot.is_none());
        assert_eq!(failure.kind, FailureKind::Assertion);
    }
}

mod loading {
    use super::*;

    #[tokio::test]
    async fn test_no_procedure_found_before_provisioning() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();

        let err = harness(driver, &dir)
            .run_test("empty", "let URL = \"http://game.test/\";\nfn helper(ctx) {}")
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Load(LoadError::NoProcedureFound)));
        assert_eq!(stats.launches(), 0);
        assert!(stats.history().is_empty());
    }

    #[tokio::test]
    async fn test_bind_without_invoking() {
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();
        let procedure = load(TestProcedure::from(START_GAME), &LoadOptions::default()).unwrap();
        assert_eq!(procedure.name(), Some("start_game"));

        let session = Session::provision(&driver, &SessionOptions::default()).await.unwrap();
        let before = stats.history();
        let ctx = ExecutionContext::bind(&session);

        let _ = (ctx.page(), ctx.expect(), ctx.re(), ctx.uuid());
        assert_eq!(stats.history(), before);
        assert!(!stats.was_called("page.goto"));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_failure_is_returned() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::with_faults(game_site(), MockFaults::none().fail_launch());
        let stats = driver.stats();
        let err = harness(driver, &dir).run_test("t", START_GAME).await.unwrap_err();
        assert!(matches!(err, HarnessError::BrowserLaunchError { .. }));
        assert_eq!(stats.contexts_opened(), 0);
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_waits_for_late_element() {
        let dir = TempDir::new().unwrap();
        let source = r#"
async fn loads(ctx) {
    await ctx.page.goto("http://game.test/slow");
    await ctx.expect(ctx.page.get_by_test_id("status")).to_have_text("Loaded");
}
"#;
        let result = harness(MockDriver::new(game_site()), &dir)
            .run_test("slow", source)
            .await
            .unwrap();
        assert!(result.passed(), "{:?}", result.failure);
    }

    #[tokio::test]
    async fn test_link_navigation() {
        let dir = TempDir::new().unwrap();
        let source = r#"
async fn rules(ctx) {
    await ctx.page.goto("http://game.test/");
    await ctx.page.get_by_role("link", name="Rules").click();
    await ctx.expect(ctx.page).to_have_url("http://game.test/rules");
    await ctx.expect(ctx.page.get_by_role("heading")).to_have_text("How to play");
}
"#;
        let result = harness(MockDriver::new(game_site()), &dir)
            .run_test("rules", source)
            .await
            .unwrap();
        assert!(result.passed(), "{:?}", result.failure);
    }

    #[tokio::test]
    async fn test_closure_procedure() {
        let dir = TempDir::new().unwrap();
        let procedure = TestProcedure::from_fn(|ctx: ExecutionContext| async move {
            ctx.page().goto("http://game.test/").await?;
            let heading = ctx.page().get_by_role("heading");
            ctx.expect().that(&heading).to_have_text("Tic Tac Toe").await
        });
        let result = harness(MockDriver::new(game_site()), &dir)
            .run_test("closure", procedure)
            .await
            .unwrap();
        assert!(result.passed());
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let dir = TempDir::new().unwrap();
        let driver = MockDriver::new(game_site());
        let stats = driver.stats();
        let harness = harness(driver, &dir);

        let options_a = RunOptions::default().with_trace_path(dir.path().join("a.trace.json"));
        let options_b = RunOptions::default().with_trace_path(dir.path().join("b.trace.json"));
        let (a, b) = tokio::join!(
            harness.run_test_with("a", START_GAME, &options_a),
            harness.run_test_with("b", WINNER_SHOWN, &options_b),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a.passed());
        assert_eq!(b.failure_kind(), Some(FailureKind::Assertion));
        assert_ne!(a.run_id, b.run_id);
        assert!(dir.path().join("a.trace.json").exists());
        assert!(dir.path().join("b.trace.json").exists());
        assert_eq!(stats.launches(), 2);
        assert_eq!(stats.context_closes(), 2);
        assert_eq!(stats.browser_closes(), 2);
    }

    #[tokio::test]
    async fn test_repeat_runs_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let harness = harness(MockDriver::new(game_site()), &dir);
        for source in [START_GAME, WINNER_SHOWN] {
            let first = harness.run_test("repeat", source).await.unwrap();
            let second = harness.run_test("repeat", source).await.unwrap();
            assert_eq!(first.status, second.status);
            assert_eq!(first.failure_kind(), second.failure_kind());
        }
    }
}
