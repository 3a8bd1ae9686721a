//! Init command handler

use super::resolve;
use crate::{CliResult, InitArgs};
use allure_kit::environment::ENVIRONMENT_FILE;
use allure_kit::Reporter;
use tracing::info;

/// Recreate the results directory and write `environment.properties`
pub fn execute_init(args: &InitArgs) -> CliResult<String> {
    let (settings, working_dir) = resolve(&args.location)?;
    let reporter = Reporter::new(settings, &working_dir)?;
    reporter.on_suite_start()?;
    let results_dir = reporter.results_dir().to_path_buf();
    reporter.on_suite_end();

    info!(dir = %results_dir.display(), "results directory prepared");
    Ok(format!(
        "Initialized {}\nWrote {}",
        results_dir.display(),
        results_dir.join(ENVIRONMENT_FILE).display()
    ))
}
