//! Visual surface seam.
//!
//! A visual surface is anything that can render the application under test
//! to an image, typically a browser session. The reporting engine only needs
//! two things from it: a screenshot and the session capabilities used for
//! `environment.properties`. Headless API tests simply have no surface.

use crate::result::{ReportError, ReportResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Session capabilities reported by a surface (`browserName`, `browserVersion`, ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    entries: HashMap<String, Value>,
}

impl Capabilities {
    /// Create an empty capability set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Raw capability value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Capability rendered as a non-empty string
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Browser name, or "Unknown"
    #[must_use]
    pub fn browser_name(&self) -> String {
        self.get_str("browserName")
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Browser version (`browserVersion`, else legacy `version`), or "Unknown"
    #[must_use]
    pub fn browser_version(&self) -> String {
        self.get_str("browserVersion")
            .or_else(|| self.get_str("version"))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// A handle that can produce screenshots of the application under test
pub trait VisualSurface: Send + Sync {
    /// Capture the current view as encoded image bytes
    fn screenshot(&self) -> ReportResult<Vec<u8>>;

    /// Session capabilities
    fn capabilities(&self) -> Capabilities;
}

/// In-memory surface for tests
#[derive(Debug, Default)]
pub struct MockSurface {
    /// Bytes returned by `screenshot`; `None` makes capture fail
    pub screenshot_data: Option<Vec<u8>>,
    /// Capabilities returned by `capabilities`
    pub caps: Capabilities,
    call_history: Mutex<Vec<String>>,
}

impl MockSurface {
    /// Create a mock that returns the given screenshot bytes
    #[must_use]
    pub fn new(screenshot: impl Into<Vec<u8>>) -> Self {
        Self {
            screenshot_data: Some(screenshot.into()),
            ..Self::default()
        }
    }

    /// Create a mock whose capture always fails
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Set capabilities
    #[must_use]
    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Calls received so far
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c == method)
    }

    fn record(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl VisualSurface for MockSurface {
    fn screenshot(&self) -> ReportResult<Vec<u8>> {
        self.record("screenshot");
        self.screenshot_data
            .clone()
            .ok_or_else(|| ReportError::screenshot("mock surface has no screenshot"))
    }

    fn capabilities(&self) -> Capabilities {
        self.record("capabilities");
        self.caps.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod capabilities_tests {
        use super::*;

        #[test]
        fn test_browser_fields() {
            let caps = Capabilities::new()
                .with("browserName", "chrome")
                .with("browserVersion", "126.0");
            assert_eq!(caps.browser_name(), "chrome");
            assert_eq!(caps.browser_version(), "126.0");
        }

        #[test]
        fn test_legacy_version_fallback() {
            let caps = Capabilities::new().with("version", "11");
            assert_eq!(caps.browser_name(), "Unknown");
            assert_eq!(caps.browser_version(), "11");
        }

        #[test]
        fn test_empty_values_are_unknown() {
            let caps = Capabilities::new()
                .with("browserName", "")
                .with("browserVersion", Value::Null);
            assert_eq!(caps.browser_name(), "Unknown");
            assert_eq!(caps.browser_version(), "Unknown");
        }

        #[test]
        fn test_non_string_values_rendered() {
            let caps = Capabilities::new().with("browserVersion", 99);
            assert_eq!(caps.browser_version(), "99");
        }
    }

    mod mock_surface_tests {
        use super::*;

        #[test]
        fn test_screenshot_recorded() {
            let surface = MockSurface::new(vec![0x89, b'P', b'N', b'G']);
            assert_eq!(surface.screenshot().unwrap().len(), 4);
            assert!(surface.was_called("screenshot"));
            assert!(!surface.was_called("capabilities"));
        }

        #[test]
        fn test_failing_surface() {
            let surface = MockSurface::failing();
            assert!(matches!(
                surface.screenshot(),
                Err(ReportError::Screenshot { .. })
            ));
        }
    }
}
