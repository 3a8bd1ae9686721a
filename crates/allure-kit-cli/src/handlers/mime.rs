//! Mime command handler

use crate::{CliError, CliResult, MimeArgs};
use allure_kit::mime::mime_type_for_extension;

/// Look up the MIME type of an extension
pub fn execute_mime(args: &MimeArgs) -> CliResult<String> {
    let extension = args.extension.trim();
    if extension.trim_start_matches('.').is_empty() {
        return Err(CliError::invalid_argument("extension must not be empty"));
    }
    Ok(mime_type_for_extension(extension).to_string())
}
