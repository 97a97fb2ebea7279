//! Reports for the agent that generated the procedure, and the generator's
//! test-specification records.

use crate::harness::RunResult;
use serde::{Deserialize, Serialize};

/// Pass/fail plus a readable failure report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutput {
    /// The run passed
    pub success: bool,
    /// Error text followed by the captured snapshots
    pub failure_output: Option<String>,
}

impl TestOutput {
    /// Successful output
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            success: true,
            failure_output: None,
        }
    }
}

impl From<&RunResult> for TestOutput {
    fn from(result: &RunResult) -> Self {
        let Some(failure) = &result.failure else {
            return Self::passed();
        };

        let mut output = failure.message.clone();
        if let Some(dom) = failure.dom_snapshot.as_deref().filter(|d| !d.is_empty()) {
            output.push_str("\n\nDOM SNAPSHOT:\n");
            output.push_str(dom);
        }
        if let Some(tree) = &failure.accessibility_snapshot {
            output.push_str("\n\nACCESSIBILITY SNAPSHOT:\n");
            output.push_str(&tree.render());
        }
        if let Some(path) = &result.trace_path {
            output.push_str(&format!("\n\nTRACE: {}", path.display()));
        }
        Self {
            success: false,
            failure_output: Some(output),
        }
    }
}

impl From<RunResult> for TestOutput {
    fn from(result: RunResult) -> Self {
        Self::from(&result)
    }
}

/// One step of a generated test plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    /// Position in the plan, starting at 1
    pub step_number: u32,
    /// What to do
    pub action: String,
    /// Element acted on
    #[serde(default)]
    pub target_element: Option<String>,
    /// Text typed or selected
    #[serde(default)]
    pub input_data: Option<String>,
    /// Observable outcome
    pub expected_result: String,
    /// Free-form remarks from the generator
    #[serde(default)]
    pub notes: Option<String>,
}

/// A generated end-to-end test: the plan and the procedure implementing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct E2eTestSpec {
    /// Name, also used for the trace file
    pub test_name: String,
    /// What the test covers
    pub test_description: String,
    /// Application entry URL
    pub target_url: String,
    /// Ordered plan
    #[serde(default)]
    pub test_steps: Vec<TestStep>,
    /// Procedure source text
    #[serde(alias = "async_playwright_test_code")]
    pub test_code: String,
}

impl E2eTestSpec {
    /// Parse the generator's JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
