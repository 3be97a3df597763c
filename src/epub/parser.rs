//! EPUB parsing utilities (container.xml, OPF, NCX, XHTML nav)

use std::io;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::import::NavNode;

/// Parsed OPF package data.
#[derive(Debug, Default)]
pub struct OpfData {
    pub title: Option<String>,
    /// Manifest items in document order.
    pub manifest: Vec<OpfItem>,
    pub spine_ids: Vec<String>,
    /// Manifest id named by `<spine toc="...">`.
    pub toc_id: Option<String>,
}

/// A manifest `<item>` as written in the OPF (href relative to the OPF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpfItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl OpfItem {
    /// Whether the item carries the given space-separated property.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == property))
    }
}

impl OpfData {
    pub fn item(&self, id: &str) -> Option<&OpfItem> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> io::Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attribute(&e, b"full-path")? {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "No rootfile found in container.xml",
    ))
}

/// Parse OPF package document.
pub fn parse_opf(content: &str) -> io::Result<OpfData> {
    let mut reader = Reader::from_str(content);

    let mut opf = OpfData::default();
    let mut in_metadata = false;
    let mut in_title = false;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata && opf.title.is_none() => {
                    in_title = true;
                    buf_text.clear();
                }
                b"spine" => opf.toc_id = attribute(&e, b"toc")?,
                b"item" => push_manifest_item(&mut opf, &e)?,
                _ => {}
            },
            Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"item" => push_manifest_item(&mut opf, &e)?,
                b"itemref" => {
                    if let Some(idref) = attribute(&e, b"idref")? {
                        opf.spine_ids.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_title {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_title && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e)) {
                    buf_text.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"metadata" => in_metadata = false,
                b"title" if in_title => {
                    opf.title = Some(collapse_whitespace(&buf_text));
                    in_title = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Ok(opf)
}

fn push_manifest_item(opf: &mut OpfData, e: &BytesStart<'_>) -> io::Result<()> {
    let id = attribute(e, b"id")?.unwrap_or_default();
    if id.is_empty() {
        return Ok(());
    }
    opf.manifest.push(OpfItem {
        id,
        href: attribute(e, b"href")?.unwrap_or_default(),
        media_type: attribute(e, b"media-type")?.unwrap_or_default(),
        properties: attribute(e, b"properties")?,
    });
    Ok(())
}

/// Parse NCX table of contents.
///
/// Every `navPoint` becomes a node; `link` holds the raw `content/@src`.
pub fn parse_ncx(content: &str) -> io::Result<Vec<NavNode>> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<NavNode> = vec![NavNode::default()];
    let mut in_text = false;
    let mut in_nav_map = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => stack.push(NavNode::default()),
                b"text" => in_text = true,
                b"content" => set_ncx_link(&mut stack, &e)?,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"content" {
                    set_ncx_link(&mut stack, &e)?;
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(node) = stack.last_mut() {
                    node.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text
                    && let Some(node) = stack.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e))
                {
                    node.label.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navMap" => in_nav_map = false,
                b"navPoint" if stack.len() > 1 => {
                    if let Some(mut node) = stack.pop()
                        && let Some(parent) = stack.last_mut()
                    {
                        node.label = collapse_whitespace(&node.label);
                        parent.children.push(node);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Ok(stack.swap_remove(0).children)
}

fn set_ncx_link(stack: &mut [NavNode], e: &BytesStart<'_>) -> io::Result<()> {
    if stack.len() > 1
        && let Some(src) = attribute(e, b"src")?
        && let Some(node) = stack.last_mut()
    {
        node.link = Some(src);
    }
    Ok(())
}

/// Which `<nav>` of an XHTML navigation document is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavSection {
    Toc,
    Other,
}

/// Parse an EPUB 3 XHTML navigation document.
///
/// Returns the `epub:type="toc"` list, or the first `<nav>` when none is
/// typed. List items without an `<a href>` (section headings written as
/// `<span>`) are kept with no link.
pub fn parse_nav_xhtml(content: &str) -> io::Result<Vec<NavNode>> {
    let mut reader = Reader::from_str(content);

    let mut section: Option<NavSection> = None;
    let mut toc: Option<Vec<NavNode>> = None;
    let mut first_untyped: Option<Vec<NavNode>> = None;

    let mut items: Vec<NavNode> = Vec::new();
    let mut results: Vec<NavNode> = Vec::new();
    let mut label_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    let is_toc = nav_type(&e)?
                        .is_some_and(|t| t.split_ascii_whitespace().any(|v| v == "toc"));
                    section = Some(if is_toc { NavSection::Toc } else { NavSection::Other });
                    items.clear();
                    results.clear();
                }
                b"li" if section.is_some() => items.push(NavNode::default()),
                b"a" if section.is_some() => {
                    label_depth += 1;
                    if let Some(item) = items.last_mut()
                        && let Some(href) = attribute(&e, b"href")?
                    {
                        item.link = Some(href);
                    }
                }
                b"span" if section.is_some() && !items.is_empty() => label_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if section.is_some()
                    && local_name(e.name().as_ref()) == b"a"
                    && let Some(item) = items.last_mut()
                    && let Some(href) = attribute(&e, b"href")?
                {
                    item.link = Some(href);
                }
            }
            Ok(Event::Text(e)) => {
                if label_depth > 0 && let Some(item) = items.last_mut() {
                    item.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if label_depth > 0
                    && let Some(item) = items.last_mut()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(&e))
                {
                    item.label.push_str(&resolved);
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"a" | b"span" if label_depth > 0 => label_depth -= 1,
                b"li" if section.is_some() => {
                    if let Some(mut item) = items.pop() {
                        item.label = collapse_whitespace(&item.label);
                        match items.last_mut() {
                            Some(parent) => parent.children.push(item),
                            None => results.push(item),
                        }
                    }
                }
                b"nav" => {
                    let completed = std::mem::take(&mut results);
                    match section.take() {
                        Some(NavSection::Toc) if toc.is_none() => toc = Some(completed),
                        Some(_) if first_untyped.is_none() => first_untyped = Some(completed),
                        _ => {}
                    }
                    items.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(io::Error::other(e)),
            _ => {}
        }
    }

    Ok(toc.or(first_untyped).unwrap_or_default())
}

/// Trim label text and fold its whitespace runs (line breaks included) to
/// single spaces. Text is read untrimmed so entity references keep their
/// neighbouring spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Value of `epub:type` (any prefix) on a `<nav>` element.
fn nav_type(e: &BytesStart<'_>) -> io::Result<Option<String>> {
    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        if key != b"type" && local_name(key) == b"type" {
            return String::from_utf8(attr.value.to_vec())
                .map(Some)
                .map_err(io::Error::other);
        }
    }
    Ok(None)
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Read an attribute by exact (qualified) name.
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> io::Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8(attr.value.to_vec()).map_err(io::Error::other)?;
            return Ok(Some(unescape_attribute(&raw)));
        }
    }
    Ok(None)
}

/// Resolve the handful of entities that show up in hrefs and labels.
fn unescape_attribute(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';').and_then(|semi| Some((resolve_entity(&after[..semi])?, semi))) {
            Some((resolved, semi)) => {
                out.push_str(&resolved);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}
