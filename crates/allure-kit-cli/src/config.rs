//! CLI configuration

use allure_kit::{init_logging, LoggingSettings};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Warnings and errors
    #[default]
    Normal,
    /// Informational messages
    Verbose,
    /// Everything
    Debug,
}

impl Verbosity {
    /// Derive from `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Filter directive for this level
    #[must_use]
    pub const fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if `-v` or more was given
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Logging settings for the CLI: console only, level from verbosity
    #[must_use]
    pub fn logging(&self) -> LoggingSettings {
        LoggingSettings {
            minimum_level: self.verbosity.filter().to_string(),
            enable_console_logging: true,
            enable_file_logging: false,
            ..LoggingSettings::default()
        }
    }

    /// Install the subscriber.
    ///
    /// Returns a notice to print when setup failed and the user asked for
    /// verbose output; otherwise the CLI runs without logging.
    #[must_use]
    pub fn init_logging(&self) -> Option<String> {
        match init_logging(&self.logging()) {
            Ok(()) => None,
            Err(err) if self.verbosity.is_verbose() => {
                Some(format!("warning: logging disabled: {err}"))
            }
            Err(_) => None,
        }
    }
}
