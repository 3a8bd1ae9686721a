//! allure-kit: test-execution reporting for Allure
//!
//! Tracks what happens inside a single logical test execution (steps,
//! attachments, identity metadata) and persists it as Allure intermediate
//! results under `allure-results/`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        allure-kit                                     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   test runner ──► Reporter hooks ──► ScreenshotService ──► FileStore │
//! │                        │                   │                 │       │
//! │                        ▼                   ▼                 ▼       │
//! │   steps / attachments ─► ContextStore ─► ExecutionContext   allure-  │
//! │   (test body)           (task/thread)    (steps, files)     results/ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`ContextStore`] binds one [`ExecutionContext`] per logical execution:
//!   task-local inside a scope, keyed by task id for unscoped tokio tasks,
//!   and thread-local otherwise. [`Reporter::run_test`] scopes async tests.
//! - [`ScreenshotService`] applies the [`ScreenshotMode`] policy at teardown,
//!   capturing an image from a [`VisualSurface`] or a JSON diagnostic
//!   snapshot when there is none.
//! - [`FileStore`] retries transient filesystem errors on the shared
//!   results directory.

#![warn(missing_docs)]

mod result;

/// Attachment helpers for the current execution
pub mod attachments;
/// Layered settings (JSON files and environment variables)
pub mod config;
/// Per-test execution context
pub mod context;
/// `environment.properties` builder
pub mod environment;
/// Retry-safe filesystem access
pub mod file_store;
/// Subscriber setup
pub mod logging;
/// Extension to MIME type table
pub mod mime;
/// Task/thread-scoped context binding
pub mod propagation;
/// Suite and test lifecycle hooks
pub mod reporter;
/// Allure result files
pub mod results;
/// Screenshot policy and capture
pub mod screenshot;
/// Step helpers for the current execution
pub mod steps;
/// Visual surface seam
pub mod surface;

pub use config::{AppSettings, LoggingSettings, ReportSettings, ScreenshotMode};
pub use context::{
    Attachment, ExecutionContext, Severity, SharedContext, Step, StepId, StepStatus, TestInfo,
    TestOutcome,
};
pub use environment::EnvironmentInfo;
pub use file_store::{FileStore, RetryPolicy};
pub use logging::init_logging;
pub use propagation::ContextStore;
pub use reporter::{Reporter, SuiteSummary, TestReport};
pub use result::{ReportError, ReportResult};
pub use screenshot::{should_capture, ScreenshotService};
pub use surface::{Capabilities, MockSurface, VisualSurface};
