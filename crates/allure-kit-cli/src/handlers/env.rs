//! Env command handler

use super::load_settings;
use crate::commands::EnvFormat;
use crate::{CliResult, EnvArgs};
use allure_kit::EnvironmentInfo;

/// Render the environment description for the configured settings
pub fn execute_env(args: &EnvArgs) -> CliResult<String> {
    let settings = load_settings(&args.config)?;
    let info = EnvironmentInfo::build(&settings, None);
    match args.format {
        EnvFormat::Properties => Ok(info.to_properties().trim_end().to_string()),
        EnvFormat::Json => Ok(serde_json::to_string_pretty(&info)?),
    }
}
