//! Attachment helpers over the current execution context.
//!
//! These never fail the caller: anything that goes wrong (unreadable file,
//! unserializable value) is logged and the attachment is skipped.

use crate::context::{lock, SharedContext};
use crate::mime::{extension_of, guess_mime_type};
use crate::propagation::ContextStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

fn attach(context: &SharedContext, name: &str, content: Vec<u8>, mime_type: &str, extension: &str) {
    lock(context).add_attachment(name, content, mime_type, extension);
}

/// Attach PNG screenshot bytes
pub fn attach_screenshot(bytes: impl Into<Vec<u8>>, name: &str) {
    attach(&ContextStore::current(), name, bytes.into(), "image/png", "png");
}

/// Attach a file, MIME type chosen from its extension. Missing files are skipped.
pub fn attach_file(path: impl AsRef<Path>, name: &str) {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => {
            let extension = extension_of(path).unwrap_or_default();
            attach(
                &ContextStore::current(),
                name,
                bytes,
                guess_mime_type(path),
                &extension,
            );
        }
        Err(err) => debug!(path = %path.display(), error = %err, "file not attached"),
    }
}

/// Attach a value as pretty-printed JSON
pub fn attach_json<T: Serialize + ?Sized>(value: &T, name: &str) {
    match serde_json::to_vec_pretty(value) {
        Ok(json) => attach(&ContextStore::current(), name, json, "application/json", "json"),
        Err(err) => debug!(attachment = name, error = %err, "JSON attachment skipped"),
    }
}

/// Attach an HTML document
pub fn attach_html(html: &str, name: &str) {
    attach(
        &ContextStore::current(),
        name,
        html.as_bytes().to_vec(),
        "text/html",
        "html",
    );
}

/// Attach log text
pub fn attach_log(text: &str, name: &str) {
    lock(&ContextStore::current()).add_text_attachment(name, text, Some("log"));
}

/// Attach the contents of a text file; extension defaults to `txt`
pub fn attach_text_file(path: impl AsRef<Path>, name: &str) {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let extension = extension_of(path).unwrap_or_else(|| "txt".to_string());
            lock(&ContextStore::current()).add_text_attachment(name, &text, Some(extension.as_str()));
        }
        Err(err) => debug!(path = %path.display(), error = %err, "text file not attached"),
    }
}

/// Request half of an [`ApiExchange`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Option<serde_json::Value>,
    /// Request body
    pub body: Option<String>,
}

/// Response half of an [`ApiExchange`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: Option<serde_json::Value>,
    /// Response body
    pub body: Option<String>,
}

/// An HTTP request/response pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExchange {
    /// Request
    pub request: ApiRequest,
    /// Response
    pub response: ApiResponse,
    /// When the exchange was recorded
    pub timestamp: DateTime<Utc>,
}

impl ApiExchange {
    /// Create an exchange with empty bodies
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>, status_code: u16) -> Self {
        Self {
            request: ApiRequest {
                method: method.into(),
                url: url.into(),
                ..ApiRequest::default()
            },
            response: ApiResponse {
                status_code,
                ..ApiResponse::default()
            },
            timestamp: Utc::now(),
        }
    }

    /// Set the request body
    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Set the response body
    #[must_use]
    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response.body = Some(body.into());
        self
    }

    /// Set headers on both halves
    #[must_use]
    pub fn with_headers(mut self, headers: serde_json::Value) -> Self {
        self.request.headers = Some(headers.clone());
        self.response.headers = Some(headers);
        self
    }

    /// Attachment name: "API Request-Response ({method} {url})"
    #[must_use]
    pub fn attachment_name(&self) -> String {
        format!(
            "API Request-Response ({} {})",
            self.request.method, self.request.url
        )
    }
}

/// Attach an API request/response pair as JSON
pub fn attach_api_exchange(exchange: &ApiExchange) {
    attach_json(exchange, &exchange.attachment_name());
}

/// Attach test input data as JSON
pub fn attach_test_data<T: Serialize + ?Sized>(data: &T, name: Option<&str>) {
    attach_json(data, name.unwrap_or("Test Data"));
}

/// Attach performance measurements as JSON
pub fn attach_performance_metrics<T: Serialize + ?Sized>(metrics: &T, name: Option<&str>) {
    attach_json(metrics, name.unwrap_or("Performance Metrics"));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::Attachment;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn attachments() -> Vec<Attachment> {
        lock(&ContextStore::current()).attachments().to_vec()
    }

    #[test]
    fn test_screenshot_and_html() {
        ContextStore::run_isolated(|| {
            attach_screenshot(vec![1, 2, 3], "Cart page");
            attach_html("<p>ok</p>", "Page");
            let all = attachments();
            assert_eq!(all[0].mime_type, "image/png");
            assert_eq!(all[0].extension, "png");
            assert_eq!(all[1].mime_type, "text/html");
            assert_eq!(all[1].content, b"<p>ok</p>");
        });
    }

    #[test]
    fn test_file_mime_from_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.CSV");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        ContextStore::run_isolated(|| {
            attach_file(&path, "Export");
            attach_file(tmp.path().join("missing.png"), "Missing");
            let all = attachments();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].mime_type, "text/csv");
            assert_eq!(all[0].extension, "CSV");
        });
    }

    #[test]
    fn test_json_is_pretty() {
        ContextStore::run_isolated(|| {
            let mut data = BTreeMap::new();
            data.insert("sku", "A-100");
            attach_json(&data, "Order");
            let all = attachments();
            let text = String::from_utf8(all[0].content.clone()).unwrap();
            assert!(text.contains('\n'));
            assert_eq!(all[0].mime_type, "application/json");
        });
    }

    #[test]
    fn test_log_and_text_file() {
        let tmp = TempDir::new().unwrap();
        let plain = tmp.path().join("notes");
        std::fs::write(&plain, "hello").unwrap();

        ContextStore::run_isolated(|| {
            attach_log("line 1\nline 2", "Test Log");
            attach_text_file(&plain, "Notes");
            let all = attachments();
            assert_eq!(all[0].extension, "log");
            assert_eq!(all[0].mime_type, "text/plain");
            assert_eq!(all[1].extension, "txt");
            assert_eq!(all[1].content, b"hello");
        });
    }

    #[test]
    fn test_api_exchange_name_and_shape() {
        ContextStore::run_isolated(|| {
            let exchange = ApiExchange::new("POST", "/orders", 201)
                .with_request_body(r#"{"sku":"A-100"}"#)
                .with_response_body(r#"{"id":7}"#);
            attach_api_exchange(&exchange);

            let all = attachments();
            assert_eq!(all[0].name, "API Request-Response (POST /orders)");
            let json: serde_json::Value = serde_json::from_slice(&all[0].content).unwrap();
            assert_eq!(json["request"]["method"], "POST");
            assert_eq!(json["response"]["statusCode"], 201);
        });
    }

    #[test]
    fn test_default_names() {
        ContextStore::run_isolated(|| {
            attach_test_data(&vec![1, 2], None);
            attach_performance_metrics(&serde_json::json!({"p95_ms": 120}), None);
            let names: Vec<_> = attachments().into_iter().map(|a| a.name).collect();
            assert_eq!(names, ["Test Data", "Performance Metrics"]);
        });
    }
}
