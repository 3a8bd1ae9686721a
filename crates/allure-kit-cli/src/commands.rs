//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// allure-kit: prepare and maintain Allure results directories
#[derive(Parser, Debug)]
#[command(name = "allure-kit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recreate the results directory and write environment.properties
    Init(InitArgs),

    /// Print the environment properties for the current settings
    Env(EnvArgs),

    /// Delete screenshots older than the retention period
    CleanScreenshots(CleanArgs),

    /// Print the MIME type for a file extension
    Mime(MimeArgs),
}

/// Where settings and output live
#[derive(Args, Debug, Clone)]
pub struct LocationArgs {
    /// Directory containing appsettings.json
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,

    /// Working directory the results directory is resolved against
    #[arg(short, long, default_value = ".")]
    pub working_dir: PathBuf,
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Settings and working directory
    #[command(flatten)]
    pub location: LocationArgs,
}

/// Output format for the env command
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvFormat {
    /// `Key=Value` lines
    #[default]
    Properties,
    /// JSON object
    Json,
}

/// Arguments for the env command
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Directory containing appsettings.json
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = EnvFormat::Properties)]
    pub format: EnvFormat,
}

/// Arguments for the clean-screenshots command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Settings and working directory
    #[command(flatten)]
    pub location: LocationArgs,

    /// Maximum age in days (defaults to the configured retention)
    #[arg(long)]
    pub max_age_days: Option<u32>,
}

/// Arguments for the mime command
#[derive(Args, Debug)]
pub struct MimeArgs {
    /// File extension, with or without the leading dot
    pub extension: String,
}
