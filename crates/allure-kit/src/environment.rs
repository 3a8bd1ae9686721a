//! Run environment metadata written to `environment.properties`.

use crate::config::AppSettings;
use crate::file_store::FileStore;
use crate::result::ReportResult;
use crate::surface::VisualSurface;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name inside the results directory
pub const ENVIRONMENT_FILE: &str = "environment.properties";

/// Flat key/value description of the environment a suite ran in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// `{OS} {ARCH}`
    pub operating_system: String,
    /// Browser name, only when a visual surface exists
    pub browser: Option<String>,
    /// Browser version, only when a visual surface exists
    pub browser_version: Option<String>,
    /// Application or API base URL
    pub base_url: String,
    /// Test framework name
    pub framework: String,
    /// Implementation language
    pub language: String,
    /// Environment name (Development, Staging, ...)
    pub test_environment: Option<String>,
}

impl EnvironmentInfo {
    /// Describe the current run. Browser keys are filled only from a surface.
    #[must_use]
    pub fn build(settings: &AppSettings, surface: Option<&dyn VisualSurface>) -> Self {
        let (browser, browser_version) = match surface {
            Some(surface) => {
                let caps = surface.capabilities();
                (Some(caps.browser_name()), Some(caps.browser_version()))
            }
            None => (None, None),
        };

        let environment_name = settings.environment.environment_name.trim();

        Self {
            operating_system: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            browser,
            browser_version,
            base_url: settings.base_url().to_string(),
            framework: settings.report.framework.clone(),
            language: "Rust".to_string(),
            test_environment: (!environment_name.is_empty()).then(|| environment_name.to_string()),
        }
    }

    /// Render as `Key=Value` lines; absent optional keys are omitted
    #[must_use]
    pub fn to_properties(&self) -> String {
        let entries = [
            ("Operating.System", Some(&self.operating_system)),
            ("Browser", self.browser.as_ref()),
            ("Browser.Version", self.browser_version.as_ref()),
            ("Base.URL", Some(&self.base_url)),
            ("Framework", Some(&self.framework)),
            ("Language", Some(&self.language)),
            ("Test.Environment", self.test_environment.as_ref()),
        ];

        entries
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}={}\n", escape_value(v))))
            .collect()
    }

    /// Write `environment.properties` into `results_dir`, overwriting
    pub fn write_to(&self, store: &FileStore, results_dir: &Path) -> ReportResult<PathBuf> {
        let path = results_dir.join(ENVIRONMENT_FILE);
        store.write(&path, self.to_properties().as_bytes())?;
        info!(path = %path.display(), "environment properties written");
        Ok(path)
    }
}

/// Keep each entry on one line
fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n").replace('\r', "\\r")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::surface::{Capabilities, MockSurface};
    use tempfile::TempDir;

    #[test]
    fn test_headless_omits_browser_keys() {
        let info = EnvironmentInfo::build(&AppSettings::default(), None);
        assert!(info.browser.is_none());
        assert!(info.browser_version.is_none());

        let props = info.to_properties();
        assert!(!props.contains("Browser"));
        assert!(props.contains("Operating.System="));
        assert!(props.contains("Language=Rust\n"));
        assert!(props.contains("Framework=libtest\n"));
        assert!(props.contains("Base.URL=http://localhost:3000\n"));
        assert!(props.contains("Test.Environment=Development\n"));
    }

    #[test]
    fn test_surface_supplies_browser() {
        let surface = MockSurface::new(Vec::new()).with_capabilities(
            Capabilities::new()
                .with("browserName", "firefox")
                .with("version", "115"),
        );
        let info = EnvironmentInfo::build(&AppSettings::default(), Some(&surface));
        let props = info.to_properties();
        assert!(props.contains("Browser=firefox\n"));
        assert!(props.contains("Browser.Version=115\n"));
    }

    #[test]
    fn test_key_order() {
        let surface = MockSurface::new(Vec::new());
        let props = EnvironmentInfo::build(&AppSettings::default(), Some(&surface)).to_properties();
        let keys: Vec<&str> = props
            .lines()
            .map(|l| l.split('=').next().unwrap())
            .collect();
        assert_eq!(
            keys,
            [
                "Operating.System",
                "Browser",
                "Browser.Version",
                "Base.URL",
                "Framework",
                "Language",
                "Test.Environment"
            ]
        );
    }

    #[test]
    fn test_api_url_when_no_ui() {
        let mut settings = AppSettings::default();
        settings.ui.application_url = String::new();
        settings.api.api_url = "https://api.shop.test".to_string();
        let info = EnvironmentInfo::build(&settings, None);
        assert_eq!(info.base_url, "https://api.shop.test");
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new();
        std::fs::write(tmp.path().join(ENVIRONMENT_FILE), "stale=1\n").unwrap();

        let info = EnvironmentInfo::build(&AppSettings::default(), None);
        let path = info.write_to(&store, tmp.path()).unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert!(!written.contains("stale"));
        assert_eq!(written, info.to_properties());
    }

    #[test]
    fn test_multiline_values_escaped() {
        let mut info = EnvironmentInfo::build(&AppSettings::default(), None);
        info.framework = "lib\ntest".to_string();
        assert!(info.to_properties().contains("Framework=lib\\ntest\n"));
    }
}
