//! Harness configuration.
//!
//! Loaded from YAML, then optionally overridden from the environment:
//!
//! ```yaml
//! headless: true
//! default_timeout_ms: 5000
//! poll_interval_ms: 100
//! artifacts_dir: results/artifacts
//! trace:
//!   screenshots: true
//!   snapshots: true
//!   sources: true
//! ```

use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default interaction and assertion timeout (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval for auto-retrying assertions (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default directory for trace archives
pub const DEFAULT_ARTIFACTS_DIR: &str = "results/artifacts";

/// Environment variable overriding [`HarnessConfig::headless`]
pub const ENV_HEADLESS: &str = "TEMPEST_HEADLESS";
/// Environment variable overriding [`HarnessConfig::artifacts_dir`]
pub const ENV_ARTIFACTS_DIR: &str = "TEMPEST_ARTIFACTS_DIR";
/// Environment variable overriding [`HarnessConfig::chromium_path`]
pub const ENV_CHROMIUM_PATH: &str = "TEMPEST_CHROMIUM_PATH";
/// Environment variable overriding [`HarnessConfig::default_timeout_ms`]
pub const ENV_TIMEOUT_MS: &str = "TEMPEST_TIMEOUT_MS";

/// What the trace recorder captures while a procedure runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Capture a screenshot after each action
    pub screenshots: bool,
    /// Capture a DOM snapshot after each action
    pub snapshots: bool,
    /// Embed procedure source text in the trace
    pub sources: bool,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            screenshots: true,
            snapshots: true,
            sources: true,
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Run the browser without a visible window
    pub headless: bool,
    /// Timeout applied to every interaction and assertion in a run
    pub default_timeout_ms: u64,
    /// Interval between assertion retries
    pub poll_interval_ms: u64,
    /// Directory trace archives are written to
    pub artifacts_dir: PathBuf,
    /// Trace capture settings
    pub trace: TraceSettings,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            headless: true,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            trace: TraceSettings::default(),
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| HarnessError::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `TEMPEST_*` environment overrides
    pub fn with_env_overrides(self) -> HarnessResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_HEADLESS) {
            self.headless = parse_bool(ENV_HEADLESS, &value)?;
        }
        if let Some(value) = lookup(ENV_ARTIFACTS_DIR) {
            self.artifacts_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_CHROMIUM_PATH) {
            self.chromium_path = Some(value);
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| HarnessError::ConfigError {
                        message: format!("{ENV_TIMEOUT_MS} must be an integer, got '{value}'"),
                    })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants
    pub fn validate(&self) -> HarnessResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(HarnessError::ConfigError {
                message: "default_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::ConfigError {
                message: "poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms > self.default_timeout_ms {
            return Err(HarnessError::ConfigError {
                message: format!(
                    "poll_interval_ms ({}) exceeds default_timeout_ms ({})",
                    self.poll_interval_ms, self.default_timeout_ms
                ),
            });
        }
        Ok(())
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the run-wide timeout
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the assertion poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Set trace capture settings
    #[must_use]
    pub const fn with_trace(mut self, trace: TraceSettings) -> Self {
        self.trace = trace;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Run-wide timeout as a [`Duration`]
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Poll interval as a [`Duration`]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_bool(key: &str, value: &str) -> HarnessResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HarnessError::ConfigError {
            message: format!("{key} must be a boolean, got '{value}'"),
        }),
    }
}
