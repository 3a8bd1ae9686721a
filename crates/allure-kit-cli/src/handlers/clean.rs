//! Clean-screenshots command handler

use super::resolve;
use crate::{CleanArgs, CliResult};
use allure_kit::{FileStore, ScreenshotService};
use std::sync::Arc;
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Delete screenshots older than the requested or configured age
pub fn execute_clean_screenshots(args: &CleanArgs) -> CliResult<String> {
    let (settings, working_dir) = resolve(&args.location)?;
    let days = args
        .max_age_days
        .unwrap_or(settings.report.screenshot_retention_days);
    let service = ScreenshotService::new(settings.report, &working_dir, Arc::new(FileStore::new()));

    let deleted =
        service.cleanup_old_screenshots(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY));
    Ok(format!(
        "Deleted {deleted} screenshot(s) older than {days} day(s) from {}",
        service.directory().display()
    ))
}
