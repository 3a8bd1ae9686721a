//! Settings for the reporting engine.
//!
//! Settings are layered: built-in defaults, then `appsettings.json`, then
//! `appsettings.{ENV}.json`, then environment variables of the form
//! `ALLURE_KIT__SECTION__KEY` (for example `ALLURE_KIT__REPORT__SCREENSHOT_MODE=Always`).

use crate::result::{ReportError, ReportResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Base settings file name
pub const SETTINGS_FILE: &str = "appsettings.json";
/// Environment variable selecting the overlay file
pub const ENVIRONMENT_VAR: &str = "ALLURE_KIT_ENVIRONMENT";
/// Prefix of per-key override variables
pub const ENV_PREFIX: &str = "ALLURE_KIT__";
/// Environment used when [`ENVIRONMENT_VAR`] is unset
pub const DEFAULT_ENVIRONMENT: &str = "Development";

/// When screenshots are captured at test teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenshotMode {
    /// Never capture automatically
    #[serde(alias = "never")]
    Never,
    /// Capture only for failed tests
    #[default]
    #[serde(alias = "on_failure_only")]
    OnFailureOnly,
    /// Capture for every test
    #[serde(alias = "always")]
    Always,
}

impl fmt::Display for ScreenshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Never => "Never",
            Self::OnFailureOnly => "OnFailureOnly",
            Self::Always => "Always",
        };
        f.write_str(name)
    }
}

impl FromStr for ScreenshotMode {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "never" => Ok(Self::Never),
            "onfailureonly" | "onfailure" => Ok(Self::OnFailureOnly),
            "always" => Ok(Self::Always),
            _ => Err(ReportError::config(format!("unknown screenshot mode '{s}'"))),
        }
    }
}

/// Which environment the run targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Environment name (Development, Test, Production, ...)
    pub environment_name: String,
    /// Development environment flag
    pub is_development: bool,
    /// Test environment flag
    pub is_test: bool,
    /// Production environment flag
    pub is_production: bool,
    /// Debug flag
    pub is_debug: bool,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            environment_name: DEFAULT_ENVIRONMENT.to_string(),
            is_development: true,
            is_test: false,
            is_production: false,
            is_debug: true,
        }
    }
}

/// HTTP API under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the API
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries per request
    pub retry_count: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// API version segment
    pub api_version: String,
    /// Bearer token, normally supplied through the environment
    pub auth_token: String,
    /// Log request/response exchanges
    pub enable_request_logging: bool,
    /// Upper bound on in-flight requests
    pub max_concurrent_requests: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.example.com".to_string(),
            timeout_secs: 30,
            retry_count: 3,
            retry_delay_ms: 500,
            api_version: "v1".to_string(),
            auth_token: String::new(),
            enable_request_logging: false,
            max_concurrent_requests: 5,
        }
    }
}

/// Web application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Application URL; empty when there is no UI
    pub application_url: String,
    /// Browser name
    pub browser: String,
    /// Run headless
    pub headless: bool,
    /// Implicit wait in seconds
    pub implicit_wait_secs: u64,
    /// Page load timeout in seconds
    pub page_load_timeout_secs: u64,
    /// Script timeout in seconds
    pub script_timeout_secs: u64,
    /// Window width (0 = maximize)
    pub window_width: u32,
    /// Window height (0 = maximize)
    pub window_height: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            application_url: "http://localhost:3000".to_string(),
            browser: "Chrome".to_string(),
            headless: false,
            implicit_wait_secs: 10,
            page_load_timeout_secs: 30,
            script_timeout_secs: 30,
            window_width: 0,
            window_height: 0,
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub minimum_level: String,
    /// Write to stderr
    pub enable_console_logging: bool,
    /// Append to a log file
    pub enable_file_logging: bool,
    /// Log file directory
    pub log_file_path: PathBuf,
    /// Log file name
    pub log_file_name: String,
    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            minimum_level: "debug".to_string(),
            enable_console_logging: true,
            enable_file_logging: false,
            log_file_path: PathBuf::from("logs"),
            log_file_name: "allure-kit.log".to_string(),
            json_format: false,
        }
    }
}

/// Report output and screenshot policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Results directory, relative to the working directory
    pub results_directory: PathBuf,
    /// Screenshot capture policy
    pub screenshot_mode: ScreenshotMode,
    /// Artifact directory; defaults to the results directory
    pub screenshot_directory: Option<PathBuf>,
    /// Image format requested from the visual surface
    pub screenshot_format: String,
    /// Attach captured artifacts to the current execution
    pub include_screenshot_in_report: bool,
    /// Size above which a warning is logged (bytes)
    pub max_screenshot_size: usize,
    /// Framework name written to `environment.properties`
    pub framework: String,
    /// Write `{uuid}-result.json` files at test end
    pub write_result_files: bool,
    /// Age after which old screenshots are cleaned up (days)
    pub screenshot_retention_days: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            results_directory: PathBuf::from("allure-results"),
            screenshot_mode: ScreenshotMode::OnFailureOnly,
            screenshot_directory: None,
            screenshot_format: "png".to_string(),
            include_screenshot_in_report: true,
            max_screenshot_size: 5 * 1024 * 1024,
            framework: "libtest".to_string(),
            write_result_files: true,
            screenshot_retention_days: 30,
        }
    }
}

impl ReportSettings {
    /// Create default report settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the screenshot mode
    #[must_use]
    pub const fn with_screenshot_mode(mut self, mode: ScreenshotMode) -> Self {
        self.screenshot_mode = mode;
        self
    }

    /// Set the results directory
    #[must_use]
    pub fn with_results_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_directory = dir.into();
        self
    }

    /// Set a dedicated screenshot directory
    #[must_use]
    pub fn with_screenshot_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_directory = Some(dir.into());
        self
    }

    /// Set the screenshot format
    #[must_use]
    pub fn with_screenshot_format(mut self, format: impl Into<String>) -> Self {
        self.screenshot_format = format.into();
        self
    }

    /// Attach artifacts to the report or not
    #[must_use]
    pub const fn with_include_in_report(mut self, include: bool) -> Self {
        self.include_screenshot_in_report = include;
        self
    }

    /// Set the size warning threshold
    #[must_use]
    pub const fn with_max_screenshot_size(mut self, bytes: usize) -> Self {
        self.max_screenshot_size = bytes;
        self
    }

    /// Write per-test result files or not
    #[must_use]
    pub const fn with_result_files(mut self, enabled: bool) -> Self {
        self.write_result_files = enabled;
        self
    }

    /// Set the framework name
    #[must_use]
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Screenshot directory resolved against a working directory
    #[must_use]
    pub fn screenshot_dir_in(&self, working_dir: &Path) -> PathBuf {
        let dir = self
            .screenshot_directory
            .as_ref()
            .unwrap_or(&self.results_directory);
        working_dir.join(dir)
    }

    /// Results directory resolved against a working directory
    #[must_use]
    pub fn results_dir_in(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.results_directory)
    }
}

/// Root settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Environment section
    pub environment: EnvironmentSettings,
    /// API section
    pub api: ApiSettings,
    /// UI section
    pub ui: UiSettings,
    /// Logging section
    pub logging: LoggingSettings,
    /// Report section
    pub report: ReportSettings,
}

impl AppSettings {
    /// Create default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the report section
    #[must_use]
    pub fn with_report(mut self, report: ReportSettings) -> Self {
        self.report = report;
        self
    }

    /// Load settings from `dir` using the process environment
    pub fn load(dir: impl AsRef<Path>) -> ReportResult<Self> {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        Self::load_with(dir, &environment, std::env::vars())
    }

    /// Load settings from `dir` with an explicit environment name and variable set
    pub fn load_with(
        dir: impl AsRef<Path>,
        environment: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> ReportResult<Self> {
        let dir = dir.as_ref();
        let mut tree = serde_json::to_value(Self::default())?;

        let base = dir.join(SETTINGS_FILE);
        if base.is_file() {
            merge(&mut tree, read_json(&base)?);
            debug!(path = %base.display(), "loaded settings file");
        } else {
            debug!(path = %base.display(), "no settings file, using defaults");
        }

        let overlay = dir.join(format!("appsettings.{environment}.json"));
        if overlay.is_file() {
            merge(&mut tree, read_json(&overlay)?);
            debug!(path = %overlay.display(), environment, "applied environment overlay");
        }

        for (name, value) in vars {
            if let Some(path) = name.strip_prefix(ENV_PREFIX) {
                apply_override(&mut tree, path, &value)?;
            }
        }

        let settings: Self = serde_json::from_value(tree)
            .map_err(|e| ReportError::config(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a JSON document layered over the defaults
    pub fn from_json_str(json: &str) -> ReportResult<Self> {
        let mut tree = serde_json::to_value(Self::default())?;
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| ReportError::config(format!("invalid settings JSON: {e}")))?;
        merge(&mut tree, doc);
        serde_json::from_value(tree).map_err(|e| ReportError::config(format!("invalid settings: {e}")))
    }

    /// Reject settings the reporter cannot run with
    pub fn validate(&self) -> ReportResult<()> {
        let report = &self.report;
        if report.results_directory.as_os_str().is_empty() {
            return Err(ReportError::config("report.results_directory must not be empty"));
        }
        if report.screenshot_format.trim().is_empty() {
            return Err(ReportError::config("report.screenshot_format must not be empty"));
        }
        if report.max_screenshot_size == 0 {
            return Err(ReportError::config("report.max_screenshot_size must be positive"));
        }
        Ok(())
    }

    /// URL reported as the run's base URL: the UI application, else the API
    #[must_use]
    pub fn base_url(&self) -> &str {
        if self.ui.application_url.trim().is_empty() {
            &self.api.api_url
        } else {
            &self.ui.application_url
        }
    }
}

fn read_json(path: &Path) -> ReportResult<Value> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| ReportError::config(format!("{}: {e}", path.display())))
}

/// Deep-merge `overlay` into `base`; objects merge by key, everything else replaces
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply `SECTION__KEY=value`, typed by the value currently at that path
fn apply_override(tree: &mut Value, path: &str, raw: &str) -> ReportResult<()> {
    let segments: Vec<String> = path
        .split("__")
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    let mut node = tree;
    for segment in parents {
        let Value::Object(map) = node else {
            return Err(ReportError::config(format!("cannot override '{path}'")));
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Value::Object(map) = node else {
        return Err(ReportError::config(format!("cannot override '{path}'")));
    };

    let typed = match map.get(last) {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        Some(Value::Bool(_)) => Value::Bool(raw.trim().parse().map_err(|_| {
            ReportError::config(format!("{ENV_PREFIX}{path} expects true/false, got '{raw}'"))
        })?),
        Some(Value::Number(_)) => {
            let number: serde_json::Number = raw.trim().parse().map_err(|_| {
                ReportError::config(format!("{ENV_PREFIX}{path} expects a number, got '{raw}'"))
            })?;
            Value::Number(number)
        }
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    };
    debug!(key = %path, "applied environment override");
    map.insert(last.clone(), typed);
    Ok(())
}
