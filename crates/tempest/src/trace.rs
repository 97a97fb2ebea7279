//! Interaction trace recording.
//!
//! Driver implementations own a [`TraceRecorder`] per browser context. Each
//! page action appends a [`TraceEvent`] (optionally with a screenshot and a
//! DOM snapshot); stopping the recorder writes a single [`TraceArchive`] to
//! disk. The harness treats the written file as opaque.

use crate::driver::{TraceOptions, TraceSource};
use crate::result::{HarnessError, HarnessResult};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

/// Archive format version
pub const TRACE_FORMAT_VERSION: u32 = 1;

/// Maximum events kept per trace; later events are counted but dropped
pub const MAX_EVENTS: usize = 10_000;

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Milliseconds since recording started
    pub offset_ms: u64,
    /// Wall-clock time of the event
    pub timestamp: DateTime<Utc>,
    /// Action name (e.g. "goto", "click")
    pub action: String,
    /// Action argument or target description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Error text if the action failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64 PNG captured after the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Page markup captured after the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<String>,
}

impl TraceEvent {
    /// Create an event (offset and timestamp are filled in by the recorder)
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            offset_ms: 0,
            timestamp: Utc::now(),
            action: action.into(),
            detail: None,
            error: None,
            screenshot: None,
            dom_snapshot: None,
        }
    }

    /// Set the detail
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Record an error
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach PNG bytes
    #[must_use]
    pub fn with_screenshot(mut self, png: &[u8]) -> Self {
        if !png.is_empty() {
            self.screenshot = Some(base64::engine::general_purpose::STANDARD.encode(png));
        }
        self
    }

    /// Attach a DOM snapshot
    #[must_use]
    pub fn with_dom_snapshot(mut self, html: impl Into<String>) -> Self {
        self.dom_snapshot = Some(html.into());
        self
    }
}

/// Flags a trace was recorded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFlags {
    /// Screenshots captured
    pub screenshots: bool,
    /// DOM snapshots captured
    pub snapshots: bool,
    /// Sources embedded
    pub sources: bool,
}

/// A complete persisted trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceArchive {
    /// Format version
    pub version: u32,
    /// Unique trace id
    pub trace_id: Uuid,
    /// Title
    #[serde(default)]
    pub title: Option<String>,
    /// When recording started
    pub started_at: DateTime<Utc>,
    /// When recording stopped
    pub stopped_at: DateTime<Utc>,
    /// Capture flags
    pub flags: TraceFlags,
    /// Embedded sources
    #[serde(default)]
    pub sources: Vec<TraceSource>,
    /// Recorded events
    pub events: Vec<TraceEvent>,
    /// Events dropped after [`MAX_EVENTS`]
    #[serde(default)]
    pub dropped_events: usize,
}

impl TraceArchive {
    /// Read an archive back from disk
    pub fn read(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug)]
struct ActiveTrace {
    archive: TraceArchive,
    started: Instant,
}

/// Records trace events for one browser context
#[derive(Debug, Default)]
pub struct TraceRecorder {
    active: Mutex<Option<ActiveTrace>>,
}

impl TraceRecorder {
    /// Create an idle recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording
    pub fn start(&self, options: &TraceOptions) -> HarnessResult<()> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(HarnessError::TraceError {
                message: "tracing has already been started".to_string(),
            });
        }
        let now = Utc::now();
        *active = Some(ActiveTrace {
            archive: TraceArchive {
                version: TRACE_FORMAT_VERSION,
                trace_id: Uuid::new_v4(),
                title: options.title.clone(),
                started_at: now,
                stopped_at: now,
                flags: TraceFlags {
                    screenshots: options.screenshots,
                    snapshots: options.snapshots,
                    sources: options.sources,
                },
                sources: if options.sources {
                    options.source_files.clone()
                } else {
                    Vec::new()
                },
                events: Vec::new(),
                dropped_events: 0,
            },
            started: Instant::now(),
        });
        Ok(())
    }

    /// Capture flags of the running trace, `None` when idle
    #[must_use]
    pub fn flags(&self) -> Option<TraceFlags> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.archive.flags)
    }

    /// Whether a trace is running
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.flags().is_some()
    }

    /// Append an event; ignored when idle
    pub fn record(&self, mut event: TraceEvent) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(trace) = active.as_mut() {
            if trace.archive.events.len() >= MAX_EVENTS {
                trace.archive.dropped_events += 1;
                return;
            }
            event.offset_ms = trace.started.elapsed().as_millis() as u64;
            trace.archive.events.push(event);
        }
    }

    /// Stop recording and write the archive to `path` (overwriting it)
    pub fn stop(&self, path: &Path) -> HarnessResult<TraceArchive> {
        let trace = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| HarnessError::TraceError {
                message: "tracing was not started".to_string(),
            })?;

        let mut archive = trace.archive;
        archive.stopped_at = Utc::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(&archive)?)?;
        Ok(archive)
    }
}
