//! Path, encoding and media-type helpers shared by the container and the pipeline.

use std::borrow::Cow;

use crate::import::ResourceKind;

// ============================================================================
// Path Utilities
// ============================================================================

/// Strip every leading path segment, keeping the bare file name.
///
/// Both `/` and `\` count as separators, so archive keys and sloppy
/// Windows-style hrefs flatten the same way.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_file_name("OEBPS/images/cover.jpg"), "cover.jpg");
/// assert_eq!(strip_file_name("..\\fonts\\serif.otf"), "serif.otf");
/// assert_eq!(strip_file_name("plain.css"), "plain.css");
/// ```
pub fn strip_file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(split) => &path[split + 1..],
        None => path,
    }
}

/// Directory part of an archive key, including the trailing slash.
///
/// Returns an empty string for keys at the archive root.
pub fn parent_dir(key: &str) -> &str {
    match key.rfind('/') {
        Some(split) => &key[..=split],
        None => "",
    }
}

/// Resolve an href found inside `base_dir` to a normalized archive key.
///
/// The fragment is dropped, `.` and `..` segments are folded, and
/// percent-escapes are decoded so the result matches zip entry names.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = percent_encoding::percent_decode_str(href).decode_utf8_lossy();

    let joined = if decoded.starts_with('/') {
        decoded.trim_start_matches('/').to_string()
    } else {
        format!("{base_dir}{decoded}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Whether an attribute or `url()` value points inside the book.
///
/// Data URIs and absolute URLs (anything with a scheme) are external and must
/// not be flattened.
pub fn is_internal_reference(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || value.starts_with("//") {
        return false;
    }
    match value.find(':') {
        Some(colon) => {
            let scheme = &value[..colon];
            // A single letter before the colon is a Windows drive, not a scheme.
            scheme.len() == 1
                || !scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => true,
    }
}

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252 (common in old ebooks)
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

// ============================================================================
// Resource Classification
// ============================================================================

/// Classify a manifest entry by its declared media type.
///
/// Falls back to the file extension when the media type is missing or one of
/// the vague values old packaging tools emit (`application/octet-stream`).
pub fn resource_kind(media_type: &str, path: &str) -> ResourceKind {
    let media_type = media_type.trim().to_ascii_lowercase();

    match media_type.as_str() {
        "application/xhtml+xml" | "text/html" => return ResourceKind::Document,
        "text/css" => return ResourceKind::Stylesheet,
        "application/vnd.ms-opentype"
        | "application/font-sfnt"
        | "application/x-font-ttf"
        | "application/x-font-truetype"
        | "application/x-font-opentype"
        | "application/x-font-otf"
        | "application/font-woff"
        | "application/font-woff2" => return ResourceKind::Font,
        m if m.starts_with("image/") => return ResourceKind::Image,
        m if m.starts_with("font/") => return ResourceKind::Font,
        "" | "application/octet-stream" => {}
        _ => return ResourceKind::Other,
    }

    let path_lower = path.to_ascii_lowercase();
    let extension = path_lower.rsplit('.').next().unwrap_or("");
    match extension {
        "xhtml" | "html" | "htm" => ResourceKind::Document,
        "css" => ResourceKind::Stylesheet,
        "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" => ResourceKind::Image,
        "ttf" | "otf" | "woff" | "woff2" => ResourceKind::Font,
        _ => ResourceKind::Other,
    }
}

// ============================================================================
// Tests
// ============================================================================
