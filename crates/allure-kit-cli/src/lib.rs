//! allure-kit CLI library
//!
//! Command-line maintenance for Allure results directories: preparing a
//! clean `allure-results/`, inspecting the environment description, and
//! pruning old screenshots.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;

pub use commands::{
    CleanArgs, Cli, Commands, EnvArgs, EnvFormat, InitArgs, LocationArgs, MimeArgs,
};
pub use config::{CliConfig, Verbosity};
pub use error::{CliError, CliResult};
