//! Command handlers, kept out of main.rs for testability
//!
//! Each handler returns the text to print on stdout; logging goes to stderr.

pub mod clean;
pub mod env;
pub mod init;
pub mod mime;

pub use clean::execute_clean_screenshots;
pub use env::execute_env;
pub use init::execute_init;
pub use mime::execute_mime;

use crate::commands::LocationArgs;
use allure_kit::AppSettings;
use std::path::PathBuf;

/// Load settings from the `--config` directory
pub(crate) fn load_settings(config_dir: &std::path::Path) -> crate::CliResult<AppSettings> {
    Ok(AppSettings::load(config_dir)?)
}

/// Settings plus the working directory they apply to
pub(crate) fn resolve(location: &LocationArgs) -> crate::CliResult<(AppSettings, PathBuf)> {
    let settings = load_settings(&location.config)?;
    Ok((settings, location.working_dir.clone()))
}
