//! Screenshot policy and capture.
//!
//! At test teardown the [`ScreenshotService`] decides from the configured
//! [`ScreenshotMode`] and the outcome whether to capture anything. With a
//! visual surface it saves an image; without one it saves a JSON diagnostic
//! snapshot of the process and the current execution instead, so headless
//! runs still leave evidence behind. Capture problems are logged and never
//! reach the test.

use crate::config::ReportSettings;
pub use crate::config::ScreenshotMode;
use crate::context::{lock, ContextSummary, TestOutcome};
use crate::file_store::FileStore;
use crate::mime::screenshot_mime_type;
use crate::propagation::ContextStore;
use crate::result::{ReportError, ReportResult};
use crate::surface::VisualSurface;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Maximum length of a sanitized file-name stem
pub const MAX_FILE_NAME_LEN: usize = 100;

/// Characters rejected in file names on at least one supported OS
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Whether a teardown with this mode and outcome captures an artifact
#[must_use]
pub const fn should_capture(mode: ScreenshotMode, outcome: TestOutcome) -> bool {
    match mode {
        ScreenshotMode::Never => false,
        ScreenshotMode::OnFailureOnly => outcome.is_failure(),
        ScreenshotMode::Always => true,
    }
}

/// Make a test name safe to use as a file name on every supported OS
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();

    if sanitized.is_empty() {
        "test".to_string()
    } else {
        sanitized
    }
}

/// Local-time stamp used in artifact names
#[must_use]
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Process and execution state captured when there is no visual surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    /// Test name
    pub test_name: String,
    /// Outcome, or "Manual" for manual captures
    pub outcome: String,
    /// Capture description (manual captures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Host name
    pub machine_name: String,
    /// OS process id
    pub process_id: u32,
    /// Capturing thread
    pub thread_id: String,
    /// Resident memory in bytes, when the platform exposes it
    pub memory_bytes: Option<u64>,
    /// Metadata of the current execution
    pub context: ContextSummary,
}

impl DiagnosticSnapshot {
    /// Capture the current process and execution state
    #[must_use]
    pub fn capture(test_name: &str, outcome: &str, description: Option<&str>) -> Self {
        let context = lock(&ContextStore::current()).summary();
        Self {
            test_name: test_name.to_string(),
            outcome: outcome.to_string(),
            description: description.map(str::to_string),
            timestamp: Utc::now(),
            machine_name: machine_name(),
            process_id: std::process::id(),
            thread_id: format!("{:?}", std::thread::current().id()),
            memory_bytes: resident_memory_bytes(),
            context,
        }
    }

    /// Pretty JSON bytes
    pub fn to_json(&self) -> ReportResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn resident_memory_bytes() -> Option<u64> {
    // statm: size resident shared ... (in pages)
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident * 4096)
}

/// Captures screenshots or diagnostic snapshots according to [`ReportSettings`]
#[derive(Debug, Clone)]
pub struct ScreenshotService {
    settings: ReportSettings,
    directory: PathBuf,
    store: Arc<FileStore>,
}

impl ScreenshotService {
    /// Create a service writing under `working_dir`
    #[must_use]
    pub fn new(settings: ReportSettings, working_dir: &Path, store: Arc<FileStore>) -> Self {
        let directory = settings.screenshot_dir_in(working_dir);
        Self {
            settings,
            directory,
            store,
        }
    }

    /// Directory artifacts are written to
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Active settings
    #[must_use]
    pub const fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Apply the capture policy at test teardown.
    ///
    /// Returns the artifact path, or `None` when nothing was captured
    /// (policy said no, or capture failed).
    pub fn capture_on_teardown(
        &self,
        test_name: &str,
        outcome: TestOutcome,
        surface: Option<&dyn VisualSurface>,
    ) -> Option<PathBuf> {
        if !should_capture(self.settings.screenshot_mode, outcome) {
            debug!(
                test = test_name,
                %outcome,
                mode = %self.settings.screenshot_mode,
                "screenshot not required"
            );
            return None;
        }

        let stem = sanitize_file_name(test_name);
        let timestamp = file_timestamp();
        let result = match surface {
            Some(surface) => self.save_surface(
                surface,
                &format!("{stem}_{outcome}_{timestamp}"),
                &format!("Screenshot_{outcome}_{test_name}"),
            ),
            None => self.save_snapshot(
                &DiagnosticSnapshot::capture(test_name, &outcome.to_string(), None),
                &format!("{stem}_{outcome}_Context_{timestamp}"),
                &format!("Context_{outcome}_{test_name}"),
            ),
        };
        self.report(test_name, result)
    }

    /// Capture on demand, regardless of the policy
    pub fn take_manual_screenshot(
        &self,
        name: &str,
        description: Option<&str>,
        surface: Option<&dyn VisualSurface>,
    ) -> Option<PathBuf> {
        let stem = sanitize_file_name(name);
        let timestamp = file_timestamp();
        let result = match surface {
            Some(surface) => self.save_surface(surface, &format!("{stem}_{timestamp}"), name),
            None => self.save_snapshot(
                &DiagnosticSnapshot::capture(name, "Manual", description),
                &format!("{stem}_Manual_{timestamp}"),
                name,
            ),
        };
        self.report(name, result)
    }

    /// Delete screenshots in the artifact directory older than `max_age`.
    ///
    /// Only files with the configured format extension are considered.
    /// Returns the number of files deleted.
    pub fn cleanup_old_screenshots(&self, max_age: Duration) -> usize {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %self.directory.display(), error = %err, "nothing to clean up");
                return 0;
            }
        };

        let format = self.settings.screenshot_format.trim_start_matches('.');
        let now = SystemTime::now();
        let mut deleted = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            let matches_format = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(format));
            if !matches_format {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > max_age) {
                match self.store.remove_file(&path) {
                    Ok(()) => deleted += 1,
                    Err(err) => warn!(path = %path.display(), error = %err, "could not delete old screenshot"),
                }
            }
        }

        info!(dir = %self.directory.display(), deleted, "old screenshots cleaned up");
        deleted
    }

    /// [`Self::cleanup_old_screenshots`] with the configured retention
    pub fn cleanup_with_retention(&self) -> usize {
        let days = u64::from(self.settings.screenshot_retention_days);
        self.cleanup_old_screenshots(Duration::from_secs(days * 24 * 60 * 60))
    }

    fn save_surface(
        &self,
        surface: &dyn VisualSurface,
        stem: &str,
        attachment_name: &str,
    ) -> ReportResult<PathBuf> {
        let bytes = surface.screenshot()?;
        if bytes.is_empty() {
            return Err(ReportError::screenshot("surface returned an empty image"));
        }
        let extension = self.settings.screenshot_format.trim_start_matches('.').to_ascii_lowercase();
        self.persist(&bytes, stem, &extension, attachment_name)
    }

    fn save_snapshot(
        &self,
        snapshot: &DiagnosticSnapshot,
        stem: &str,
        attachment_name: &str,
    ) -> ReportResult<PathBuf> {
        let bytes = snapshot.to_json()?;
        self.persist(&bytes, stem, "json", attachment_name)
    }

    fn persist(
        &self,
        bytes: &[u8],
        stem: &str,
        extension: &str,
        attachment_name: &str,
    ) -> ReportResult<PathBuf> {
        if bytes.len() > self.settings.max_screenshot_size {
            warn!(
                size = bytes.len(),
                max = self.settings.max_screenshot_size,
                artifact = stem,
                "artifact exceeds maximum screenshot size"
            );
        }

        self.store.create_dir_all(&self.directory)?;
        let path = self.directory.join(format!("{stem}.{extension}"));
        self.store.write(&path, bytes)?;

        if self.settings.include_screenshot_in_report {
            lock(&ContextStore::current()).add_attachment(
                attachment_name,
                bytes,
                screenshot_mime_type(extension),
                extension,
            );
        }
        Ok(path)
    }

    fn report(&self, name: &str, result: ReportResult<PathBuf>) -> Option<PathBuf> {
        match result {
            Ok(path) => {
                info!(test = name, path = %path.display(), "artifact captured");
                Some(path)
            }
            Err(err) => {
                warn!(test = name, error = %err, "artifact capture failed");
                None
            }
        }
    }
}
