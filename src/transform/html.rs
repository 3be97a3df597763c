//! Body extraction and image reference rewriting on the arena DOM
//!
//! Provides utilities for:
//! - Locating a document's renderable body (structural parse first, then a
//!   textual slice between the body tags)
//! - Rewriting image references inside the extracted subtree

use memchr::memmem;

use crate::dom::{Dom, NodeData, NodeId, inner_html, parse_document};

/// Which strategy produced an [`ExtractedBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    /// First `body` element of the parsed document.
    Parsed,
    /// Raw text between the body tags, parsed on its own.
    Sliced,
}

/// A document's renderable content: an owned DOM and the node whose
/// children are the content.
pub struct ExtractedBody {
    pub dom: Dom,
    pub root: NodeId,
    pub source: BodySource,
}

impl ExtractedBody {
    /// Serialized children of the content root.
    pub fn inner_html(&self) -> std::io::Result<String> {
        inner_html(&self.dom, self.root)
    }
}

/// Extract the body of a document, trying the structural parse first.
pub fn extract_body(markup: &str) -> Option<ExtractedBody> {
    extract_body_parsed(markup).or_else(|| extract_body_sliced(markup))
}

/// Primary strategy: the first `body` element of the parsed document.
///
/// Gives up when there is no body (framesets) or when the parsed body is
/// blank although the raw text between the body tags is not. The latter
/// happens with XHTML self-closing `<title/>` or `<script/>`, which an HTML
/// parser reads as an open element that swallows the rest of the file.
pub fn extract_body_parsed(markup: &str) -> Option<ExtractedBody> {
    let dom = parse_document(markup);
    let body = dom.find_by_tag(dom.document(), "body")?;

    if is_blank(&dom, body) && slice_body(markup).is_some_and(|raw| !raw.trim().is_empty()) {
        return None;
    }

    Some(ExtractedBody {
        dom,
        root: body,
        source: BodySource::Parsed,
    })
}

/// Fallback strategy: slice the raw text between the body tags and parse
/// the slice as a document of its own.
pub fn extract_body_sliced(markup: &str) -> Option<ExtractedBody> {
    let slice = slice_body(markup)?;
    let dom = parse_document(slice);
    let root = dom.find_by_tag(dom.document(), "body").unwrap_or(dom.document());

    Some(ExtractedBody {
        dom,
        root,
        source: BodySource::Sliced,
    })
}

/// Raw text between the first opening body tag and the last `</body`.
///
/// The exact `<body>` tag is preferred; otherwise the first `<body`
/// followed by whitespace, `/` or `>` is cut after its closing `>`. A
/// missing closing tag keeps the rest of the text. Matching ignores ASCII
/// case.
///
/// The cut is at the last `</body`, so a stray closer inside the body
/// (duplicated, or inside a script string) keeps the content after it.
fn slice_body(markup: &str) -> Option<&str> {
    let lower = markup.to_ascii_lowercase();
    let haystack = lower.as_bytes();

    let start = match memmem::find(haystack, b"<body>") {
        Some(i) => i + "<body>".len(),
        None => {
            let open = memmem::find_iter(haystack, b"<body").find(|&i| {
                haystack
                    .get(i + "<body".len())
                    .is_some_and(|&b| b.is_ascii_whitespace() || b == b'/' || b == b'>')
            })?;
            let close = memchr::memchr(b'>', &haystack[open..])?;
            open + close + 1
        }
    };

    let end = memmem::rfind(haystack, b"</body")
        .filter(|&end| end >= start)
        .unwrap_or(markup.len());

    markup.get(start..end)
}

/// True when a node has no element children and no visible text.
fn is_blank(dom: &Dom, node: NodeId) -> bool {
    dom.children(node).all(|child| match dom.get(child).map(|n| &n.data) {
        Some(NodeData::Text(text)) => text.trim().is_empty(),
        Some(NodeData::Comment(_)) => true,
        _ => false,
    })
}

/// Rewrite image references under `root`.
///
/// Visits `img[src]` and SVG `image[href]` / `image[xlink:href]` among the
/// descendants of `root`. `rewrite` receives the current value and returns
/// the replacement, or `None` to leave it. Elements without the attribute
/// are skipped. Returns the number of rewritten references.
pub fn rewrite_image_references<F>(dom: &mut Dom, root: NodeId, rewrite: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut updates = Vec::new();

    for id in dom.descendants(root) {
        let attr = match dom.element_name(id).map(|n| n.as_ref()) {
            Some("img") => "src",
            Some("image") => "href",
            _ => continue,
        };
        let Some(value) = dom.get_attr(id, attr) else {
            continue;
        };
        if let Some(new_value) = rewrite(value) {
            updates.push((id, attr, new_value));
        }
    }

    let count = updates.len();
    for (id, attr, value) in updates {
        dom.set_attr(id, attr, value);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_html(body: &ExtractedBody) -> String {
        body.inner_html().unwrap()
    }

    #[test]
    fn test_parsed_body() {
        let body = extract_body("<html><head><title>T</title></head><body><p>One</p></body></html>").unwrap();
        assert_eq!(body.source, BodySource::Parsed);
        assert_eq!(body_html(&body), "<p>One</p>");
    }

    #[test]
    fn test_sliced_body_keeps_text() {
        let body = extract_body_sliced(r#"<html><body class="x">TEXT</body></html>"#).unwrap();
        assert_eq!(body.source, BodySource::Sliced);
        assert_eq!(body_html(&body), "TEXT");
    }

    #[test]
    fn test_self_closing_title_falls_back_to_slice() {
        let xhtml = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title/></head>
<body><p>Chapter text</p></body></html>"#;

        assert!(extract_body_parsed(xhtml).is_none());
        let body = extract_body(xhtml).unwrap();
        assert_eq!(body.source, BodySource::Sliced);
        assert_eq!(body_html(&body), "<p>Chapter text</p>");
    }

    #[test]
    fn test_empty_body_is_still_parsed() {
        let body = extract_body("<html><body>  </body></html>").unwrap();
        assert_eq!(body.source, BodySource::Parsed);
        assert_eq!(body_html(&body).trim(), "");
    }

    #[test]
    fn test_frameset_has_no_body() {
        let html = r#"<html><frameset cols="50%,50%"><frame src="a.html"></frameset></html>"#;
        assert!(extract_body(html).is_none());
    }

    #[test]
    fn test_slice_body_variants() {
        assert_eq!(slice_body("<BODY>a</BODY>"), Some("a"));
        assert_eq!(slice_body("<body\n id=\"b\">a</body>"), Some("a"));
        assert_eq!(slice_body("<bodyx>no</bodyx><body/>tail"), Some("tail"));
        assert_eq!(slice_body("<body>open"), Some("open"));
        assert_eq!(slice_body("<p>none</p>"), None);
    }

    #[test]
    fn test_slice_body_ends_at_last_closing_tag() {
        assert_eq!(slice_body("<body>a</body>b</body>"), Some("a</body>b"));
        assert_eq!(slice_body("<body>a</body>\n<!-- x --></BODY >"), Some("a</body>\n<!-- x -->"));
    }

    #[test]
    fn test_rewrite_images_in_subtree() {
        let mut body = extract_body(
            r#"<body><p><img src="../images/cover.jpg" alt="c"/><img alt="no src"/>
<svg xmlns:xlink="http://www.w3.org/1999/xlink"><image xlink:href="../images/map.png"/></svg></p></body>"#,
        )
        .unwrap();

        let root = body.root;
        let count = rewrite_image_references(&mut body.dom, root, |src| {
            Some(format!("http://h/id/{}", src.rsplit('/').next().unwrap_or(src)))
        });

        assert_eq!(count, 2);
        let html = body_html(&body);
        assert!(html.contains(r#"<img src="http://h/id/cover.jpg" alt="c">"#));
        assert!(html.contains(r#"<img alt="no src">"#));
        assert!(html.contains(r#"xlink:href="http://h/id/map.png""#));
    }

    #[test]
    fn test_rewrite_images_declined_values_untouched() {
        let mut body = extract_body(r#"<body><img src="data:image/png;base64,AAAA"></body>"#).unwrap();
        let root = body.root;

        assert_eq!(rewrite_image_references(&mut body.dom, root, |_| None), 0);
        assert!(body_html(&body).contains("data:image/png;base64,AAAA"));
    }
}
