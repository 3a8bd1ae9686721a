//! Per-test execution context.
//!
//! An [`ExecutionContext`] aggregates everything recorded while one test runs:
//! identity metadata, a flat ordered list of steps, and an ordered list of
//! attachments. Steps and attachments are append-only; [`ExecutionContext::clear`]
//! is the only way to empty them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Context shared between an execution and the propagation store
pub type SharedContext = Arc<Mutex<ExecutionContext>>;

/// Category used when none is given
pub const DEFAULT_CATEGORY: &str = "General";

/// Lock a shared context, recovering from poisoning.
///
/// A panicking test body must not prevent teardown from reading its context.
pub fn lock(context: &SharedContext) -> MutexGuard<'_, ExecutionContext> {
    context
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Test severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    /// Blocks further work
    Blocker,
    /// Critical
    Critical,
    /// High
    High,
    /// Normal
    #[default]
    Normal,
    /// Medium
    Medium,
    /// Minor
    Minor,
    /// Trivial
    Trivial,
}

impl Severity {
    /// Lowercase label value used in result files
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Medium => "medium",
            Self::Minor => "minor",
            Self::Trivial => "trivial",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome reported by the test runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped
    Skipped,
    /// Result could not be determined
    Inconclusive,
    /// Passed with warnings
    Warning,
}

impl TestOutcome {
    /// Check if this outcome is a failure
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step passed
    #[default]
    Passed,
    /// Step failed an assertion
    Failed,
    /// Step was skipped
    Skipped,
    /// Step errored unexpectedly
    Broken,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity metadata supplied at test start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInfo {
    /// Test name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Severity
    pub severity: Severity,
    /// Category (suite label)
    pub category: String,
}

impl TestInfo {
    /// Create test info with default severity and category
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            severity: Severity::Normal,
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set severity
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set category
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Handle to a step returned by [`ExecutionContext::add_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId {
    index: usize,
    generation: u64,
}

/// A timestamped sub-operation of a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// When the step started
    pub start_time: DateTime<Utc>,
    /// When the step ended, `None` while running or abandoned
    pub end_time: Option<DateTime<Utc>>,
    /// Step status
    pub status: StepStatus,
    /// Error message for failed steps
    pub error_message: Option<String>,
}

impl Step {
    fn started(name: String, description: Option<String>) -> Self {
        Self {
            name,
            description,
            start_time: Utc::now(),
            end_time: None,
            status: StepStatus::Passed,
            error_message: None,
        }
    }

    /// Elapsed time, `None` until the step is completed
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Whether the step has been completed
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }
}

/// An artifact recorded for the current test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// Raw content
    pub content: Vec<u8>,
    /// MIME type
    pub mime_type: String,
    /// File extension without the dot
    pub extension: String,
}

impl Attachment {
    /// Content size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Context metadata included in headless diagnostic snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    /// Test name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Category
    pub category: String,
    /// Severity
    pub severity: Severity,
    /// Number of steps recorded
    pub step_count: usize,
    /// Number of attachments recorded
    pub attachment_count: usize,
}

/// Everything recorded during one logical test execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    id: Uuid,
    generation: u64,
    name: Option<String>,
    description: Option<String>,
    severity: Severity,
    category: String,
    started_at: DateTime<Utc>,
    steps: Vec<Step>,
    attachments: Vec<Attachment>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            name: None,
            description: None,
            severity: Severity::Normal,
            category: DEFAULT_CATEGORY.to_string(),
            started_at: Utc::now(),
            steps: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Create an empty context behind a shared handle
    #[must_use]
    pub fn shared() -> SharedContext {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Unique id of this execution
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Test name
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Test description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Severity
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Category
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// When the current test started (set by `set_test_info` and `clear`)
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Steps in append order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Attachments in append order
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Look up a step by id
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&Step> {
        if id.generation != self.generation {
            return None;
        }
        self.steps.get(id.index)
    }

    /// Replace identity metadata; steps and attachments are untouched
    pub fn set_test_info(&mut self, info: &TestInfo) {
        self.name = Some(info.name.clone());
        self.description = info.description.clone();
        self.severity = info.severity;
        self.category = info.category.clone();
        self.started_at = Utc::now();
        debug!(
            test = %info.name,
            severity = %info.severity,
            category = %info.category,
            "test info set"
        );
    }

    /// Append a running step
    pub fn add_step(&mut self, name: impl Into<String>, description: Option<String>) -> StepId {
        let step = Step::started(name.into(), description);
        debug!(step = %step.name, "step started");
        self.steps.push(step);
        StepId {
            index: self.steps.len() - 1,
            generation: self.generation,
        }
    }

    /// Complete a step. Absent or unknown steps are ignored; a second
    /// completion overwrites the first.
    pub fn complete_step(
        &mut self,
        step: impl Into<Option<StepId>>,
        status: StepStatus,
        error_message: Option<String>,
    ) {
        let Some(id) = step.into() else {
            return;
        };
        if id.generation != self.generation {
            return;
        }
        let Some(step) = self.steps.get_mut(id.index) else {
            return;
        };

        step.end_time = Some(Utc::now());
        step.status = status;
        step.error_message = error_message;
        debug!(
            step = %step.name,
            %status,
            duration_ms = step.duration().map_or(0, |d| d.num_milliseconds()),
            error = step.error_message.as_deref().unwrap_or(""),
            "step completed"
        );
    }

    /// Append a binary attachment
    pub fn add_attachment(
        &mut self,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        extension: impl Into<String>,
    ) {
        let attachment = Attachment {
            name: name.into(),
            content: content.into(),
            mime_type: mime_type.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        };
        debug!(
            attachment = %attachment.name,
            mime_type = %attachment.mime_type,
            size = attachment.size(),
            "attachment added"
        );
        self.attachments.push(attachment);
    }

    /// Append a UTF-8 text attachment (`text/plain`)
    pub fn add_text_attachment(&mut self, name: impl Into<String>, text: &str, extension: Option<&str>) {
        self.add_attachment(name, text.as_bytes(), "text/plain", extension.unwrap_or("txt"));
    }

    /// Reset identity and empty steps and attachments
    pub fn clear(&mut self) {
        self.name = None;
        self.description = None;
        self.severity = Severity::Normal;
        self.category = DEFAULT_CATEGORY.to_string();
        self.started_at = Utc::now();
        self.steps.clear();
        self.attachments.clear();
        self.generation += 1;
        debug!(context = %self.id, "context cleared");
    }

    /// Metadata for diagnostic snapshots
    #[must_use]
    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            severity: self.severity,
            step_count: self.steps.len(),
            attachment_count: self.attachments.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod test_info_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let info = TestInfo::new("Checkout");
            assert_eq!(info.severity, Severity::Normal);
            assert_eq!(info.category, "General");
            assert!(info.description.is_none());
        }

        #[test]
        fn test_set_test_info_keeps_steps() {
            let mut ctx = ExecutionContext::new();
            ctx.add_step("before", None);
            ctx.set_test_info(
                &TestInfo::new("Login")
                    .with_description("valid user")
                    .with_severity(Severity::Critical)
                    .with_category("Auth"),
            );
            assert_eq!(ctx.name(), Some("Login"));
            assert_eq!(ctx.description(), Some("valid user"));
            assert_eq!(ctx.severity(), Severity::Critical);
            assert_eq!(ctx.category(), "Auth");
            assert_eq!(ctx.steps().len(), 1);
        }
    }

    mod step_tests {
        use super::*;

        #[test]
        fn test_new_step_is_running_and_passed() {
            let mut ctx = ExecutionContext::new();
            let id = ctx.add_step("Open page", Some("home".to_string()));
            let step = ctx.step(id).unwrap();
            assert_eq!(step.status, StepStatus::Passed);
            assert!(step.end_time.is_none());
            assert!(step.duration().is_none());
        }

        #[test]
        fn test_complete_sets_end_and_duration() {
            let mut ctx = ExecutionContext::new();
            let id = ctx.add_step("Place order", None);
            ctx.complete_step(id, StepStatus::Failed, Some("timeout".to_string()));

            let step = ctx.step(id).unwrap();
            assert_eq!(step.status, StepStatus::Failed);
            assert_eq!(step.error_message.as_deref(), Some("timeout"));
            let end = step.end_time.unwrap();
            assert!(end >= step.start_time);
            assert_eq!(step.duration(), Some(end - step.start_time));
        }

        #[test]
        fn test_complete_none_is_noop() {
            let mut ctx = ExecutionContext::new();
            ctx.add_step("a", None);
            let before = ctx.clone();
            ctx.complete_step(None, StepStatus::Failed, None);
            assert_eq!(ctx, before);
        }

        #[test]
        fn test_complete_twice_last_wins() {
            let mut ctx = ExecutionContext::new();
            let id = ctx.add_step("a", None);
            ctx.complete_step(id, StepStatus::Failed, Some("first".to_string()));
            ctx.complete_step(id, StepStatus::Passed, None);
            let step = ctx.step(id).unwrap();
            assert_eq!(step.status, StepStatus::Passed);
            assert!(step.error_message.is_none());
        }

        #[test]
        fn test_stale_id_after_clear_is_ignored() {
            let mut ctx = ExecutionContext::new();
            let stale = ctx.add_step("old", None);
            ctx.clear();
            let fresh = ctx.add_step("new", None);
            ctx.complete_step(stale, StepStatus::Broken, None);

            assert!(ctx.step(stale).is_none());
            assert!(ctx.step(fresh).unwrap().end_time.is_none());
        }
    }

    mod attachment_tests {
        use super::*;

        #[test]
        fn test_attachments_keep_order_and_duplicates() {
            let mut ctx = ExecutionContext::new();
            ctx.add_attachment("shot", vec![1, 2], "image/png", "png");
            ctx.add_text_attachment("note", "hello", None);
            ctx.add_text_attachment("note", "hello", Some("log"));

            let names: Vec<_> = ctx.attachments().iter().map(|a| a.name.as_str()).collect();
            assert_eq!(names, ["shot", "note", "note"]);
            assert_eq!(ctx.attachments()[1].mime_type, "text/plain");
            assert_eq!(ctx.attachments()[1].extension, "txt");
            assert_eq!(ctx.attachments()[2].extension, "log");
            assert_eq!(ctx.attachments()[1].content, b"hello");
        }

        #[test]
        fn test_extension_dot_stripped() {
            let mut ctx = ExecutionContext::new();
            ctx.add_attachment("a", Vec::new(), "application/json", ".json");
            assert_eq!(ctx.attachments()[0].extension, "json");
        }
    }

    mod clear_tests {
        use super::*;

        #[test]
        fn test_clear_resets_everything() {
            let mut ctx = ExecutionContext::new();
            ctx.set_test_info(&TestInfo::new("x").with_severity(Severity::Blocker).with_category("C"));
            ctx.add_step("s", None);
            ctx.add_text_attachment("t", "t", None);
            ctx.clear();

            assert!(ctx.name().is_none());
            assert!(ctx.description().is_none());
            assert_eq!(ctx.severity(), Severity::Normal);
            assert_eq!(ctx.category(), "General");
            assert!(ctx.steps().is_empty());
            assert!(ctx.attachments().is_empty());
        }

        #[test]
        fn test_clear_idempotent() {
            let mut ctx = ExecutionContext::new();
            ctx.add_step("s", None);
            ctx.clear();
            let once = ctx.summary();
            ctx.clear();
            assert_eq!(ctx.summary(), once);
        }
    }

    mod lock_tests {
        use super::*;

        #[test]
        fn test_lock_recovers_from_poison() {
            let ctx = ExecutionContext::shared();
            let poisoner = Arc::clone(&ctx);
            let _ = std::thread::spawn(move || {
                let _guard = poisoner.lock().unwrap();
                panic!("poison");
            })
            .join();

            assert!(ctx.is_poisoned());
            lock(&ctx).add_step("after panic", None);
            assert_eq!(lock(&ctx).steps().len(), 1);
        }
    }

    proptest! {
        #[test]
        fn prop_steps_in_append_order(names in proptest::collection::vec("[a-z]{1,8}", 0..20)) {
            let mut ctx = ExecutionContext::new();
            let ids: Vec<_> = names.iter().map(|n| ctx.add_step(n.clone(), None)).collect();
            for id in ids.iter().rev() {
                ctx.complete_step(*id, StepStatus::Passed, None);
            }
            let recorded: Vec<_> = ctx.steps().iter().map(|s| s.name.clone()).collect();
            prop_assert_eq!(recorded, names);
            for step in ctx.steps() {
                prop_assert!(step.duration().is_some_and(|d| d >= Duration::zero()));
            }
        }
    }
}
