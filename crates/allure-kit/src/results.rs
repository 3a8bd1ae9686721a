//! Per-test Allure result files.
//!
//! At test end the execution context is written as `{uuid}-result.json`,
//! with every attachment stored next to it as `{uuid}-attachment.{ext}` and
//! referenced from the result by file name.

use crate::context::{ExecutionContext, Step, StepStatus, TestOutcome};
use crate::file_store::FileStore;
use crate::result::ReportResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Allure status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Passed
    Passed,
    /// Assertion failure
    Failed,
    /// Unexpected error
    Broken,
    /// Not run
    Skipped,
    /// Undetermined
    Unknown,
}

impl From<TestOutcome> for Status {
    fn from(outcome: TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed | TestOutcome::Warning => Self::Passed,
            TestOutcome::Failed => Self::Failed,
            TestOutcome::Skipped => Self::Skipped,
            TestOutcome::Inconclusive => Self::Unknown,
        }
    }
}

impl From<StepStatus> for Status {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Passed => Self::Passed,
            StepStatus::Failed => Self::Failed,
            StepStatus::Skipped => Self::Skipped,
            StepStatus::Broken => Self::Broken,
        }
    }
}

/// Lifecycle stage of a test or step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Completed normally
    Finished,
    /// Never completed
    Interrupted,
}

/// Failure details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    /// Error message
    pub message: String,
}

/// `name=value` label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name
    pub name: String,
    /// Label value
    pub value: String,
}

impl Label {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Reference from a result to an attachment file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Display name
    pub name: String,
    /// File name inside the results directory
    pub source: String,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Serialized step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Step name
    pub name: String,
    /// Step description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Step status
    pub status: Status,
    /// Stage
    pub stage: Stage,
    /// Start (epoch millis)
    pub start: i64,
    /// Stop (epoch millis), absent for interrupted steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    /// Error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
}

impl From<&Step> for StepResult {
    fn from(step: &Step) -> Self {
        Self {
            name: step.name.clone(),
            description: step.description.clone(),
            status: step.status.into(),
            stage: if step.is_complete() {
                Stage::Finished
            } else {
                Stage::Interrupted
            },
            start: step.start_time.timestamp_millis(),
            stop: step.end_time.map(|t| t.timestamp_millis()),
            status_details: step.error_message.clone().map(|message| StatusDetails { message }),
        }
    }
}

/// Contents of a `{uuid}-result.json` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultFile {
    /// Result id
    pub uuid: Uuid,
    /// Stable id across runs (derived from the test name)
    pub history_id: String,
    /// Test name
    pub name: String,
    /// Full name
    pub full_name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Test status
    pub status: Status,
    /// Failure details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    /// Always finished
    pub stage: Stage,
    /// Start (epoch millis)
    pub start: i64,
    /// Stop (epoch millis)
    pub stop: i64,
    /// Labels (severity, suite, language, framework)
    pub labels: Vec<Label>,
    /// Steps in order
    pub steps: Vec<StepResult>,
    /// Attachments in order
    pub attachments: Vec<AttachmentRef>,
}

impl TestResultFile {
    /// Build a result from a context. Attachment sources are assigned here.
    #[must_use]
    pub fn from_context(
        context: &ExecutionContext,
        test_name: &str,
        outcome: TestOutcome,
        framework: &str,
        stop: DateTime<Utc>,
    ) -> Self {
        let name = context.name().unwrap_or(test_name).to_string();
        let failure = context
            .steps()
            .iter()
            .rev()
            .find_map(|s| s.error_message.clone())
            .filter(|_| outcome.is_failure())
            .map(|message| StatusDetails { message });

        Self {
            uuid: Uuid::new_v4(),
            history_id: history_id(context.category(), &name),
            full_name: format!("{}.{}", context.category(), name),
            name,
            description: context.description().map(str::to_string),
            status: outcome.into(),
            status_details: failure,
            stage: Stage::Finished,
            start: context.started_at().timestamp_millis(),
            stop: stop.timestamp_millis(),
            labels: vec![
                Label::new("severity", context.severity().label()),
                Label::new("suite", context.category()),
                Label::new("language", "rust"),
                Label::new("framework", framework),
            ],
            steps: context.steps().iter().map(StepResult::from).collect(),
            attachments: context
                .attachments()
                .iter()
                .map(|a| AttachmentRef {
                    name: a.name.clone(),
                    source: attachment_file_name(Uuid::new_v4(), &a.extension),
                    mime_type: a.mime_type.clone(),
                })
                .collect(),
        }
    }

    /// File name of the result document
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-result.json", self.uuid)
    }
}

fn attachment_file_name(id: Uuid, extension: &str) -> String {
    if extension.is_empty() {
        format!("{id}-attachment")
    } else {
        format!("{id}-attachment.{extension}")
    }
}

/// Deterministic id for a test across runs (SHA-256 over category and name)
fn history_id(category: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Write a context's result file and attachment files into `results_dir`
pub fn write_result(
    store: &FileStore,
    results_dir: &Path,
    context: &ExecutionContext,
    test_name: &str,
    outcome: TestOutcome,
    framework: &str,
) -> ReportResult<PathBuf> {
    let result = TestResultFile::from_context(context, test_name, outcome, framework, Utc::now());

    for (attachment, reference) in context.attachments().iter().zip(&result.attachments) {
        store.write(&results_dir.join(&reference.source), &attachment.content)?;
    }

    let path = results_dir.join(result.file_name());
    store.write(&path, &serde_json::to_vec_pretty(&result)?)?;
    debug!(
        test = %result.name,
        path = %path.display(),
        steps = result.steps.len(),
        attachments = result.attachments.len(),
        "result file written"
    );
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::{Severity, TestInfo};
    use tempfile::TempDir;

    fn checkout_context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set_test_info(
            &TestInfo::new("Checkout")
                .with_severity(Severity::Critical)
                .with_category("Shop"),
        );
        let add = ctx.add_step("Add to cart", None);
        ctx.complete_step(add, StepStatus::Passed, None);
        let place = ctx.add_step("Place order", None);
        ctx.complete_step(place, StepStatus::Failed, Some("timeout".to_string()));
        ctx.add_step("Never finished", None);
        ctx.add_attachment("Screenshot", vec![1, 2, 3], "image/png", "png");
        ctx
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Status::from(TestOutcome::Passed), Status::Passed);
        assert_eq!(Status::from(TestOutcome::Warning), Status::Passed);
        assert_eq!(Status::from(TestOutcome::Failed), Status::Failed);
        assert_eq!(Status::from(TestOutcome::Skipped), Status::Skipped);
        assert_eq!(Status::from(TestOutcome::Inconclusive), Status::Unknown);
        assert_eq!(Status::from(StepStatus::Broken), Status::Broken);
    }

    #[test]
    fn test_from_context() {
        let ctx = checkout_context();
        let result = TestResultFile::from_context(&ctx, "ignored", TestOutcome::Failed, "libtest", Utc::now());

        assert_eq!(result.name, "Checkout");
        assert_eq!(result.full_name, "Shop.Checkout");
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.status_details.unwrap().message, "timeout");
        assert!(result.labels.contains(&Label::new("severity", "critical")));
        assert!(result.labels.contains(&Label::new("suite", "Shop")));
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.steps[1].status, Status::Failed);
        assert_eq!(result.steps[2].stage, Stage::Interrupted);
        assert!(result.steps[2].stop.is_none());
        assert!(result.attachments[0].source.ends_with("-attachment.png"));
    }

    #[test]
    fn test_passed_has_no_details_and_falls_back_to_name() {
        let ctx = ExecutionContext::new();
        let result = TestResultFile::from_context(&ctx, "Anonymous", TestOutcome::Passed, "libtest", Utc::now());
        assert_eq!(result.name, "Anonymous");
        assert!(result.status_details.is_none());
        assert_eq!(result.full_name, "General.Anonymous");
    }

    #[test]
    fn test_history_id_stable() {
        assert_eq!(history_id("Shop", "Checkout"), history_id("Shop", "Checkout"));
        assert_ne!(history_id("Shop", "Checkout"), history_id("Sho", "pCheckout"));
        let id = history_id("Shop", "Checkout");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_write_result_files() {
        let tmp = TempDir::new().unwrap();
        let ctx = checkout_context();
        let path = write_result(&FileStore::new(), tmp.path(), &ctx, "Checkout", TestOutcome::Failed, "libtest").unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().ends_with("-result.json"));
        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "finished");
        assert_eq!(json["steps"][1]["statusDetails"]["message"], "timeout");

        let source = json["attachments"][0]["source"].as_str().unwrap();
        assert_eq!(json["attachments"][0]["type"], "image/png");
        assert_eq!(std::fs::read(tmp.path().join(source)).unwrap(), [1, 2, 3]);
    }
}
