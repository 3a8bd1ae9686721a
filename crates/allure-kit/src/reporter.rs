//! Reporter - suite and test lifecycle hooks.
//!
//! The test runner owns one [`Reporter`] and drives it through fixed hooks:
//!
//! ```text
//! on_suite_start ──► on_test_start ──► (steps, attachments) ──► on_test_end ──► ... ──► on_suite_end
//!       │                                                            │
//!       ├─ recreate allure-results/                                  ├─ screenshot policy
//!       └─ environment.properties                                    ├─ {uuid}-result.json
//!                                                                    └─ clear context
//! ```
//!
//! Hooks take `&self`, so fixtures running on different threads can share
//! one reporter behind an `Arc`. Reporting problems are logged and never
//! change a test's outcome; only lifecycle misuse and bad configuration are
//! returned as errors.
//!
//! # Example
//!
//! ```no_run
//! use allure_kit::{AppSettings, Reporter, TestInfo, TestOutcome};
//! use allure_kit::steps::run_step;
//!
//! # fn main() -> allure_kit::ReportResult<()> {
//! let reporter = Reporter::new(AppSettings::default(), std::env::current_dir()?)?;
//! reporter.on_suite_start()?;
//!
//! reporter.on_test_start(&TestInfo::new("Checkout"))?;
//! let placed: Result<(), String> = run_step("Place order", None, || Err("timeout".into()));
//! let outcome = if placed.is_ok() { TestOutcome::Passed } else { TestOutcome::Failed };
//! reporter.on_test_end("Checkout", outcome, None)?;
//!
//! println!("{}", reporter.on_suite_end().summary());
//! # Ok(())
//! # }
//! ```

use crate::config::AppSettings;
use crate::context::{lock, SharedContext, TestInfo, TestOutcome};
use crate::environment::EnvironmentInfo;
use crate::file_store::FileStore;
use crate::propagation::{Binding, ContextStore};
use crate::result::{ReportError, ReportResult};
use crate::results::write_result;
use crate::screenshot::ScreenshotService;
use crate::surface::VisualSurface;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Counts collected over a suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    /// Passed tests
    pub passed: usize,
    /// Failed tests
    pub failed: usize,
    /// Skipped tests
    pub skipped: usize,
    /// Inconclusive tests
    pub inconclusive: usize,
    /// Tests passed with warnings
    pub warnings: usize,
    /// Screenshot or diagnostic artifacts written
    pub artifacts: usize,
    /// Result files written
    pub result_files: usize,
}

impl SuiteSummary {
    fn record(&mut self, outcome: TestOutcome) {
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::Inconclusive => self.inconclusive += 1,
            TestOutcome::Warning => self.warnings += 1,
        }
    }

    /// Total tests seen
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.inconclusive + self.warnings
    }

    /// Fraction of tests that passed (warnings count as passed)
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            return 1.0;
        }
        (self.passed + self.warnings) as f64 / self.total() as f64
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}/{} passed ({:.1}%), {} failed, {} skipped, {} artifact(s)",
            self.passed + self.warnings,
            self.total(),
            self.pass_rate() * 100.0,
            self.failed,
            self.skipped,
            self.artifacts
        )
    }
}

/// What `on_test_end` produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    /// Screenshot or diagnostic artifact
    pub artifact: Option<PathBuf>,
    /// `{uuid}-result.json`
    pub result_file: Option<PathBuf>,
}

/// Test-execution reporter
#[derive(Debug)]
pub struct Reporter {
    settings: AppSettings,
    results_dir: PathBuf,
    store: Arc<FileStore>,
    screenshots: ScreenshotService,
    started: AtomicBool,
    active: AtomicBool,
    summary: Mutex<SuiteSummary>,
}

impl Reporter {
    /// Create a reporter writing under `working_dir`
    pub fn new(settings: AppSettings, working_dir: impl AsRef<Path>) -> ReportResult<Self> {
        Self::with_file_store(settings, working_dir, FileStore::new())
    }

    /// Create a reporter over a custom file store
    pub fn with_file_store(
        settings: AppSettings,
        working_dir: impl AsRef<Path>,
        store: FileStore,
    ) -> ReportResult<Self> {
        settings.validate()?;
        let working_dir = working_dir.as_ref();
        let store = Arc::new(store);
        let results_dir = settings.report.results_dir_in(working_dir);
        let screenshots =
            ScreenshotService::new(settings.report.clone(), working_dir, Arc::clone(&store));

        Ok(Self {
            settings,
            results_dir,
            store,
            screenshots,
            started: AtomicBool::new(false),
            active: AtomicBool::new(false),
            summary: Mutex::new(SuiteSummary::default()),
        })
    }

    /// Active settings
    #[must_use]
    pub const fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Results directory
    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Screenshot service
    #[must_use]
    pub const fn screenshots(&self) -> &ScreenshotService {
        &self.screenshots
    }

    /// Whether the suite is running
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self, operation: &str) -> ReportResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ReportError::not_initialized(operation))
        }
    }

    /// Suite setup: recreate the results directory and write the environment.
    ///
    /// Runs at most once per reporter.
    pub fn on_suite_start(&self) -> ReportResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ReportError::AlreadyInitialized);
        }

        self.store.recreate_dir(&self.results_dir)?;
        self.active.store(true, Ordering::SeqCst);
        info!(dir = %self.results_dir.display(), "reporting initialized");

        self.write_environment(None)?;
        Ok(())
    }

    /// Build and write `environment.properties`, with browser details when a surface is given
    pub fn write_environment(&self, surface: Option<&dyn VisualSurface>) -> ReportResult<()> {
        let info = EnvironmentInfo::build(&self.settings, surface);
        self.add_environment_info(&info)
    }

    /// Write `environment.properties`. Write failures are logged, not returned.
    pub fn add_environment_info(&self, info: &EnvironmentInfo) -> ReportResult<()> {
        self.ensure_initialized("adding environment info")?;
        if let Err(err) = info.write_to(&self.store, &self.results_dir) {
            warn!(error = %err, "failed to write environment properties");
        }
        Ok(())
    }

    /// Context of the calling execution
    pub fn current_context(&self) -> ReportResult<SharedContext> {
        self.ensure_initialized("getting test context")?;
        Ok(ContextStore::current())
    }

    /// Test setup: start a clean context carrying the test's identity
    pub fn on_test_start(&self, info: &TestInfo) -> ReportResult<SharedContext> {
        self.ensure_initialized("starting a test")?;
        let context = ContextStore::current();
        {
            let mut ctx = lock(&context);
            ctx.clear();
            ctx.set_test_info(info);
        }
        debug!(test = %info.name, "test started");
        Ok(context)
    }

    /// Test teardown: apply the screenshot policy, write the result file,
    /// and clear the context.
    pub fn on_test_end(
        &self,
        test_name: &str,
        outcome: TestOutcome,
        surface: Option<&dyn VisualSurface>,
    ) -> ReportResult<TestReport> {
        self.ensure_initialized("ending a test")?;

        let artifact = self
            .screenshots
            .capture_on_teardown(test_name, outcome, surface);

        let context = ContextStore::current();
        let result_file = if self.settings.report.write_result_files {
            let ctx = lock(&context);
            match write_result(
                &self.store,
                &self.results_dir,
                &ctx,
                test_name,
                outcome,
                &self.settings.report.framework,
            ) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(test = test_name, error = %err, "failed to write result file");
                    None
                }
            }
        } else {
            None
        };

        lock(&context).clear();
        if ContextStore::binding() == Binding::UnscopedTask {
            ContextStore::reset();
        }

        if let Ok(mut summary) = self.summary.lock() {
            summary.record(outcome);
            summary.artifacts += usize::from(artifact.is_some());
            summary.result_files += usize::from(result_file.is_some());
        }

        info!(test = test_name, %outcome, "test finished");
        Ok(TestReport {
            artifact,
            result_file,
        })
    }

    /// Run an async test body as its own logical execution.
    ///
    /// Start and end hooks run inside a fresh [`ContextStore::scope`], so the
    /// body's steps stay apart from every other test regardless of which
    /// worker thread polls it. The body returns the outcome to report.
    pub async fn run_test<F>(
        &self,
        info: &TestInfo,
        surface: Option<&dyn VisualSurface>,
        body: F,
    ) -> ReportResult<TestReport>
    where
        F: Future<Output = TestOutcome>,
    {
        ContextStore::scope(async {
            self.on_test_start(info)?;
            let outcome = body.await;
            self.on_test_end(&info.name, outcome, surface)
        })
        .await
    }

    /// Snapshot of the counts so far
    #[must_use]
    pub fn summary(&self) -> SuiteSummary {
        self.summary
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Suite teardown. Returns the suite summary; the reporter cannot be restarted.
    pub fn on_suite_end(&self) -> SuiteSummary {
        if self.active.swap(false, Ordering::SeqCst) {
            ContextStore::reset();
            let summary = self.summary();
            info!(
                dir = %self.results_dir.display(),
                summary = %summary.summary(),
                "reporting finished"
            );
            summary
        } else {
            debug!("suite end without an active suite");
            self.summary()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{ReportSettings, ScreenshotMode};
    use crate::environment::ENVIRONMENT_FILE;
    use tempfile::TempDir;

    fn reporter(tmp: &TempDir, report: ReportSettings) -> Reporter {
        Reporter::new(AppSettings::default().with_report(report), tmp.path()).unwrap()
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_empty_summary() {
            let summary = SuiteSummary::default();
            assert_eq!(summary.total(), 0);
            assert_eq!(summary.pass_rate(), 1.0);
        }

        #[test]
        fn test_summary_counts() {
            let mut summary = SuiteSummary::default();
            summary.record(TestOutcome::Passed);
            summary.record(TestOutcome::Warning);
            summary.record(TestOutcome::Failed);
            summary.record(TestOutcome::Skipped);
            assert_eq!(summary.total(), 4);
            assert_eq!(summary.pass_rate(), 0.5);
            assert!(summary.summary().starts_with("2/4 passed (50.0%)"));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_hooks_before_start_are_rejected() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            assert!(matches!(
                reporter.current_context(),
                Err(ReportError::NotInitialized { .. })
            ));
            assert!(reporter.on_test_start(&TestInfo::new("x")).is_err());
            assert!(reporter.on_test_end("x", TestOutcome::Passed, None).is_err());
        }

        #[test]
        fn test_second_start_is_rejected() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();
            assert!(matches!(
                reporter.on_suite_start(),
                Err(ReportError::AlreadyInitialized)
            ));
        }

        #[test]
        fn test_start_recreates_results_dir() {
            let tmp = TempDir::new().unwrap();
            let stale = tmp.path().join("allure-results/stale-result.json");
            std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
            std::fs::write(&stale, "{}").unwrap();

            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();

            assert!(!stale.exists());
            let env = std::fs::read_to_string(reporter.results_dir().join(ENVIRONMENT_FILE)).unwrap();
            assert!(env.contains("Language=Rust"));
            assert!(!env.contains("Browser="));
        }

        #[test]
        fn test_end_after_suite_end_is_rejected() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();
            reporter.on_suite_end();
            assert!(!reporter.is_initialized());
            assert!(reporter.on_test_end("x", TestOutcome::Passed, None).is_err());
            assert!(reporter.on_suite_start().is_err());
        }

        #[test]
        fn test_invalid_settings_rejected() {
            let tmp = TempDir::new().unwrap();
            let settings = AppSettings::default()
                .with_report(ReportSettings::default().with_screenshot_format(""));
            assert!(matches!(
                Reporter::new(settings, tmp.path()),
                Err(ReportError::Config { .. })
            ));
        }
    }

    mod test_hook_tests {
        use super::*;

        #[test]
        fn test_full_cycle_writes_result_and_clears() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();

            ContextStore::run_isolated(|| {
                let ctx = reporter.on_test_start(&TestInfo::new("Search")).unwrap();
                lock(&ctx).add_step("Type query", None);

                let report = reporter.on_test_end("Search", TestOutcome::Passed, None).unwrap();
                assert!(report.artifact.is_none());
                let result_file = report.result_file.unwrap();
                let json: serde_json::Value =
                    serde_json::from_slice(&std::fs::read(result_file).unwrap()).unwrap();
                assert_eq!(json["name"], "Search");
                assert_eq!(json["steps"][0]["name"], "Type query");

                assert!(lock(&ctx).steps().is_empty());
                assert!(lock(&ctx).name().is_none());
            });

            let summary = reporter.on_suite_end();
            assert_eq!(summary.passed, 1);
            assert_eq!(summary.result_files, 1);
        }

        #[test]
        fn test_start_discards_stale_state() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();

            ContextStore::run_isolated(|| {
                lock(&ContextStore::current()).add_step("leftover", None);
                let ctx = reporter.on_test_start(&TestInfo::new("Fresh")).unwrap();
                assert!(lock(&ctx).steps().is_empty());
                assert_eq!(lock(&ctx).name(), Some("Fresh"));
            });
        }

        #[test]
        fn test_result_files_can_be_disabled() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(
                &tmp,
                ReportSettings::default()
                    .with_result_files(false)
                    .with_screenshot_mode(ScreenshotMode::Always),
            );
            reporter.on_suite_start().unwrap();

            ContextStore::run_isolated(|| {
                reporter.on_test_start(&TestInfo::new("A")).unwrap();
                let report = reporter.on_test_end("A", TestOutcome::Passed, None).unwrap();
                assert!(report.result_file.is_none());
                assert!(report.artifact.is_some());
            });
            assert_eq!(reporter.summary().artifacts, 1);
        }

        #[tokio::test]
        async fn test_run_test_scopes_the_body() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            reporter.on_suite_start().unwrap();

            let report = reporter
                .run_test(&TestInfo::new("Scoped"), None, async {
                    assert_eq!(ContextStore::binding(), crate::propagation::Binding::Task);
                    lock(&ContextStore::current()).add_step("inside", None);
                    TestOutcome::Failed
                })
                .await
                .unwrap();

            assert!(report.artifact.is_some());
            let json: serde_json::Value =
                serde_json::from_slice(&std::fs::read(report.result_file.unwrap()).unwrap())
                    .unwrap();
            assert_eq!(json["name"], "Scoped");
            assert_eq!(json["steps"][0]["name"], "inside");
            assert_eq!(reporter.summary().failed, 1);
        }

        #[tokio::test]
        async fn test_run_test_requires_started_suite() {
            let tmp = TempDir::new().unwrap();
            let reporter = reporter(&tmp, ReportSettings::default());
            let result = reporter
                .run_test(&TestInfo::new("Early"), None, async { TestOutcome::Passed })
                .await;
            assert!(matches!(result, Err(ReportError::NotInitialized { .. })));
        }
    }
}
