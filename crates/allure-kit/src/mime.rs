//! Extension to MIME type mapping for report attachments.

use std::path::Path;

/// MIME type used when an extension is not recognised
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Look up the MIME type for a file extension (case-insensitive, leading dot optional)
#[must_use]
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// Guess the MIME type of a path from its extension
#[must_use]
pub fn guess_mime_type(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map_or(OCTET_STREAM, mime_type_for_extension)
}

/// Extension of a path without the dot, or `None` if it has none
#[must_use]
pub fn extension_of(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

/// MIME type for a captured screenshot artifact.
///
/// Diagnostic dumps are JSON; image formats map to `image/<ext>`.
#[must_use]
pub fn screenshot_mime_type(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "json" => "application/json".to_string(),
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => format!("image/{ext}"),
        _ => OCTET_STREAM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        let table = [
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("bmp", "image/bmp"),
            ("svg", "image/svg+xml"),
            ("html", "text/html"),
            ("htm", "text/html"),
            ("css", "text/css"),
            ("js", "application/javascript"),
            ("json", "application/json"),
            ("xml", "application/xml"),
            ("txt", "text/plain"),
            ("csv", "text/csv"),
            ("pdf", "application/pdf"),
        ];
        for (ext, mime) in table {
            assert_eq!(mime_type_for_extension(ext), mime, "extension {ext}");
        }
    }

    #[test]
    fn test_case_and_dot_insensitive() {
        assert_eq!(mime_type_for_extension("PNG"), "image/png");
        assert_eq!(mime_type_for_extension(".Json"), "application/json");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(mime_type_for_extension("log"), OCTET_STREAM);
        assert_eq!(mime_type_for_extension(""), OCTET_STREAM);
    }

    #[test]
    fn test_guess_from_path() {
        assert_eq!(guess_mime_type("shots/home.PNG"), "image/png");
        assert_eq!(guess_mime_type("README"), OCTET_STREAM);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a/b.txt").as_deref(), Some("txt"));
        assert_eq!(extension_of("a/b"), None);
    }

    #[test]
    fn test_screenshot_mime_type() {
        assert_eq!(screenshot_mime_type("json"), "application/json");
        assert_eq!(screenshot_mime_type("png"), "image/png");
        assert_eq!(screenshot_mime_type("jpg"), "image/jpg");
        assert_eq!(screenshot_mime_type("tiff"), OCTET_STREAM);
    }
}
