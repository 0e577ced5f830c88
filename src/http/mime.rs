//! Content-Type detection module
//!
//! Two strategies: by file extension (static files) and by sniffing the
//! first bytes of a rendered body when the handler did not set one.

use std::path::Path;

pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Get MIME Content-Type based on a file's extension
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => TEXT_HTML,
        Some("css") => "text/css; charset=utf-8",
        Some("txt" | "md") => TEXT_PLAIN,
        Some("xml") => "text/xml; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("wasm") => "application/wasm",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",
        _ => OCTET_STREAM,
    }
}

/// Guess a Content-Type from body bytes
///
/// HTML if the body opens with an HTML-looking tag, plain text if it is
/// UTF-8 without control bytes, octet-stream otherwise.
pub fn sniff_content_type(body: &[u8]) -> &'static str {
    let Ok(text) = std::str::from_utf8(body) else {
        return OCTET_STREAM;
    };

    let head = text.trim_start().get(..14).unwrap_or_else(|| text.trim_start());
    let head = head.to_ascii_lowercase();
    if ["<!doctype html", "<html", "<head", "<body", "<h1", "<p>", "<a ", "<div"]
        .iter()
        .any(|tag| head.starts_with(tag))
    {
        return TEXT_HTML;
    }

    if text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
    {
        return OCTET_STREAM;
    }

    TEXT_PLAIN
}
