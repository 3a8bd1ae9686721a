//! `tracing` subscriber setup from [`LoggingSettings`].

use crate::config::LoggingSettings;
use crate::result::{ReportError, ReportResult};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Full path of the log file
#[must_use]
pub fn log_file_path(settings: &LoggingSettings) -> PathBuf {
    settings.log_file_path.join(&settings.log_file_name)
}

/// Build the filter: `RUST_LOG` when set, else the configured minimum level
pub fn build_filter(settings: &LoggingSettings) -> ReportResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.minimum_level))
        .map_err(|e| {
            ReportError::config(format!(
                "invalid log level '{}': {e}",
                settings.minimum_level
            ))
        })
}

fn open_log_file(settings: &LoggingSettings) -> ReportResult<File> {
    std::fs::create_dir_all(&settings.log_file_path)?;
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(settings))?)
}

/// Install the global subscriber.
///
/// Fails with [`ReportError::Config`] if the level is invalid or a global
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> ReportResult<()> {
    let filter = build_filter(settings)?;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if settings.enable_console_logging {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        layers.push(if settings.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    if settings.enable_file_logging {
        let file = open_log_file(settings)?;
        let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        layers.push(if settings.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ReportError::config(format!("logging already initialized: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_path() {
        let settings = LoggingSettings::default();
        assert_eq!(log_file_path(&settings), PathBuf::from("logs/allure-kit.log"));
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LoggingSettings {
            minimum_level: "not a level[".to_string(),
            ..LoggingSettings::default()
        };
        assert!(matches!(build_filter(&settings), Err(ReportError::Config { .. })));
    }

    #[test]
    fn test_second_init_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let settings = LoggingSettings {
            enable_console_logging: false,
            enable_file_logging: true,
            log_file_path: tmp.path().join("logs"),
            ..LoggingSettings::default()
        };

        let _ = init_logging(&settings);
        assert!(log_file_path(&settings).exists());
        let second = init_logging(&settings);
        assert!(matches!(second, Err(ReportError::Config { .. })));
    }
}
