//! Result and error types for Tempest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Tempest operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while loading, provisioning or running a procedure
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set TEMPEST_CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Browser context could not be created or used
    #[error("Browser context error: {message}")]
    ContextError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("{action} timed out after {ms}ms: {message}")]
    Timeout {
        /// What was being waited for
        action: String,
        /// Timeout in milliseconds
        ms: u64,
        /// Last observed state
        message: String,
    },

    /// Locator resolved to more than one element
    #[error("Strict mode violation: {selector} resolved to {count} elements")]
    StrictModeViolation {
        /// Locator description
        selector: String,
        /// Number of matches
        count: usize,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    InputError {
        /// Error message
        message: String,
    },

    /// Assertion failed after auto-retry
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Runtime error raised by interpreted procedure text
    #[error("Script error at line {line}: {message}")]
    ScriptError {
        /// Source line of the failing expression
        line: usize,
        /// Error message
        message: String,
    },

    /// Regular expression could not be compiled
    #[error("Invalid pattern /{pattern}/: {message}")]
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// Procedure panicked
    #[error("Procedure panicked: {message}")]
    Panicked {
        /// Panic payload
        message: String,
    },

    /// Procedure text could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Snapshot extraction failed
    #[error("Artifact capture failed: {message}")]
    ArtifactError {
        /// Error message
        message: String,
    },

    /// Trace recording could not be started or persisted
    #[error("Trace error: {message}")]
    TraceError {
        /// Error message
        message: String,
    },

    /// Closing the context or browser failed
    #[error("Teardown failed: {message}")]
    TeardownError {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Classify this error for reporting and run-to-run comparison
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::AssertionFailed { .. } => FailureKind::Assertion,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::NavigationError { .. } => FailureKind::Navigation,
            Self::StrictModeViolation { .. } => FailureKind::StrictMode,
            Self::ScriptError { .. } | Self::InvalidPattern { .. } | Self::Load(_) => {
                FailureKind::Script
            }
            Self::Panicked { .. } => FailureKind::Panic,
            Self::BrowserNotFound
            | Self::BrowserLaunchError { .. }
            | Self::ContextError { .. }
            | Self::PageError { .. }
            | Self::InputError { .. } => FailureKind::Driver,
            Self::ArtifactError { .. }
            | Self::TraceError { .. }
            | Self::TeardownError { .. }
            | Self::ConfigError { .. }
            | Self::Io(_)
            | Self::Json(_) => FailureKind::Other,
        }
    }

    /// Build a script error for the given source line
    #[must_use]
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        Self::ScriptError {
            line,
            message: message.into(),
        }
    }
}

/// Structural errors found while turning procedure text into a callable.
///
/// These are authoring errors: they surface before any browser is launched
/// and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Source text is not well formed
    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// Error message
        message: String,
    },

    /// A name is used that nothing in the source defines
    #[error("Unresolved name '{name}' at line {line}")]
    UnresolvedName {
        /// The name
        name: String,
        /// 1-based line
        line: usize,
    },

    /// A module function is called with the wrong number of arguments
    #[error("Function '{name}' takes {expected} argument(s) but {found} were given (line {line})")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
        /// 1-based line
        line: usize,
    },

    /// A name is defined twice at module level
    #[error("Duplicate definition of '{name}' at line {line}")]
    DuplicateDefinition {
        /// The name
        name: String,
        /// 1-based line
        line: usize,
    },

    /// A module constant could not be evaluated at load time
    #[error("Constant '{name}' must be a literal expression: {message}")]
    InvalidConstant {
        /// Constant name
        name: String,
        /// Error message
        message: String,
    },

    /// Source defines no asynchronous function
    #[error("No async function found in the provided procedure source")]
    NoProcedureFound,

    /// The requested entry point does not exist
    #[error("Entry point '{name}' not found in procedure source")]
    EntryPointNotFound {
        /// Requested name
        name: String,
    },

    /// The selected function cannot serve as an entry point
    #[error("Function '{name}' cannot be used as a test procedure: {message}")]
    InvalidEntryPoint {
        /// Function name
        name: String,
        /// Error message
        message: String,
    },
}

/// Failure class of a run, stable across repeated runs of the same procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An auto-retrying assertion never held
    Assertion,
    /// An interaction waited longer than the session timeout
    Timeout,
    /// Navigation failed
    Navigation,
    /// A locator matched more than one element
    StrictMode,
    /// Procedure text raised a runtime error
    Script,
    /// Procedure panicked
    Panic,
    /// The browser engine reported an error
    Driver,
    /// Anything else
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Assertion => "assertion",
            Self::Timeout => "timeout",
            Self::Navigation => "navigation",
            Self::StrictMode => "strict_mode",
            Self::Script => "script",
            Self::Panic => "panic",
            Self::Driver => "driver",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = HarnessError::AssertionFailed {
            message: "nope".into(),
        };
        assert_eq!(err.kind(), FailureKind::Assertion);

        let err = HarnessError::Timeout {
            action: "click".into(),
            ms: 5000,
            message: "not visible".into(),
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.to_string(), "click timed out after 5000ms: not visible");

        let err: HarnessError = LoadError::NoProcedureFound.into();
        assert_eq!(err.kind(), FailureKind::Script);
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::Syntax {
            line: 3,
            column: 7,
            message: "expected ';'".into(),
        };
        assert_eq!(err.to_string(), "Syntax error at 3:7: expected ';'");
    }

    #[test]
    fn test_failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::StrictMode).unwrap();
        assert_eq!(json, "\"strict_mode\"");
        assert_eq!(FailureKind::StrictMode.to_string(), "strict_mode");
    }
}
