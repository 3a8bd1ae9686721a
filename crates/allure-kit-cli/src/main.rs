//! allure-kit: maintain Allure results directories
//!
//! ## Usage
//!
//! ```bash
//! allure-kit init                        # Recreate allure-results/
//! allure-kit env --format json           # Show the environment description
//! allure-kit clean-screenshots --max-age-days 7
//! allure-kit mime png                    # image/png
//! ```

use allure_kit_cli::{handlers, Cli, CliConfig, CliResult, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);

    if let Some(notice) = config.init_logging() {
        eprintln!("{notice}");
    }

    let output = match &cli.command {
        Commands::Init(args) => handlers::execute_init(args)?,
        Commands::Env(args) => handlers::execute_env(args)?,
        Commands::CleanScreenshots(args) => handlers::execute_clean_screenshots(args)?,
        Commands::Mime(args) => handlers::execute_mime(args)?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new().with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
}
