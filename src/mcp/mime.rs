//! MIME type detection for file-backed resources.
//!
//! Two sources: a fixed extension table, and a content sniffer that looks at
//! the leading bytes of a file when the extension is unknown.

use std::path::Path;

/// Number of leading bytes the content sniffer considers.
pub const SNIFF_LEN: usize = 512;

/// Fallback type for content that is neither recognised nor plain text.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Look up a MIME type from a path's extension (case-insensitive).
pub fn from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "ts" => "application/typescript",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "xml" => "application/xml",
        "plist" | "mobileconfig" => "application/x-plist",
        "sh" | "bash" | "zsh" => "application/x-sh",
        "py" => "text/x-python",
        "rb" => "text/x-ruby",
        "swift" => "text/x-swift",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "pkg" => "application/x-newton-compatible-pkg",
        "dmg" => "application/x-apple-diskimage",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(mime)
}

/// Sniff a MIME type from the leading bytes of some content.
///
/// Only the first [`SNIFF_LEN`] bytes are inspected. Always returns a value;
/// unrecognised binary content yields [`OCTET_STREAM`].
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(mime) = sniff_magic(data) {
        return mime;
    }

    let trimmed = trim_leading_whitespace(data);
    if let Some(mime) = sniff_markup(trimmed) {
        return mime;
    }

    if data.is_empty() || !data.iter().any(|&b| is_binary_byte(b)) {
        return TEXT_PLAIN;
    }

    OCTET_STREAM
}

fn sniff_magic(data: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"%!PS-Adobe-", "application/postscript"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b\x08", "application/x-gzip"),
        (b"\x00asm", "application/wasm"),
        (b"\xef\xbb\xbf", TEXT_PLAIN),
        (b"\xfe\xff", "text/plain; charset=utf-16be"),
        (b"\xff\xfe", "text/plain; charset=utf-16le"),
    ];

    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    SIGNATURES
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, mime)| *mime)
}

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    const HTML_TAGS: &[&[u8]] = &[
        b"<!DOCTYPE HTML",
        b"<HTML",
        b"<HEAD",
        b"<SCRIPT",
        b"<IFRAME",
        b"<H1",
        b"<DIV",
        b"<FONT",
        b"<TABLE",
        b"<A",
        b"<STYLE",
        b"<TITLE",
        b"<B",
        b"<BODY",
        b"<BR",
        b"<P",
        b"<!--",
    ];

    HTML_TAGS
        .iter()
        .any(|tag| starts_with_tag(data, tag))
        .then_some("text/html; charset=utf-8")
}

/// Case-insensitive tag prefix match, requiring a tag-terminating byte after it.
fn starts_with_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);
    matches && (data[tag.len()] == b' ' || data[tag.len()] == b'>')
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

/// Control bytes that never appear in plain text.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
