//! Read-only access to an unpacked e-book container.
//!
//! The pipeline never touches the archive format directly. It asks a
//! [`Container`] for the manifest, the spine, the optional navigation tree and
//! the raw bytes behind a key. [`EpubContainer`] reads real EPUB files;
//! [`MemoryContainer`] holds everything in memory for tests and embedders.

mod epub;

pub use epub::EpubContainer;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, resource_kind};

/// Broad category of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// XHTML/HTML content document.
    Document,
    /// Raster or vector image.
    Image,
    /// Embedded font file.
    Font,
    /// CSS stylesheet.
    Stylesheet,
    /// Anything else (NCX, nav documents declared oddly, audio, ...).
    Other,
}

impl ResourceKind {
    /// Plural noun used in log messages ("No fonts found").
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Document => "documents",
            ResourceKind::Image => "images",
            ResourceKind::Font => "fonts",
            ResourceKind::Stylesheet => "style files",
            ResourceKind::Other => "resources",
        }
    }
}

/// One item of the package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Manifest id.
    pub id: String,
    /// Full archive path (e.g., "OEBPS/Images/cover.jpg").
    pub key: String,
    /// Declared media type.
    pub media_type: String,
    /// Category derived from the media type.
    pub kind: ResourceKind,
}

impl ManifestEntry {
    pub fn new(id: impl Into<String>, key: impl Into<String>, media_type: impl Into<String>) -> Self {
        let key = key.into();
        let media_type = media_type.into();
        let kind = resource_kind(&media_type, &key);
        Self {
            id: id.into(),
            key,
            media_type,
            kind,
        }
    }
}

/// A node of the navigation (table of contents) tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavNode {
    /// Display label.
    pub label: String,
    /// Container key of the linked document, without fragment.
    /// `None` for pure section headers.
    pub link: Option<String>,
    /// Nested entries.
    pub children: Vec<NavNode>,
}

impl NavNode {
    pub fn new(label: impl Into<String>, link: Option<&str>) -> Self {
        Self {
            label: label.into(),
            link: link.map(str::to_string),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NavNode>) -> Self {
        self.children = children;
        self
    }
}

/// Read-only capability over a parsed e-book package.
pub trait Container {
    /// Manifest entries in package order.
    fn manifest(&self) -> &[ManifestEntry];

    /// Spine keys in reading order.
    fn spine(&self) -> &[String];

    /// Navigation tree, if the package has one.
    fn navigation(&self) -> Option<&[NavNode]>;

    /// Title declared in the package metadata.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Raw bytes of an entry.
    fn read_bytes(&mut self, key: &str) -> Result<Vec<u8>>;

    /// Entry decoded as text, honouring an XML encoding declaration.
    fn read_text(&mut self, key: &str) -> Result<String> {
        let bytes = self.read_bytes(key)?;
        let hint = extract_xml_encoding(&bytes);
        Ok(decode_text(&bytes, hint).into_owned())
    }

    /// Manifest entries of one kind, in package order.
    fn resources(&self, kind: ResourceKind) -> Vec<&ManifestEntry> {
        self.manifest().iter().filter(|e| e.kind == kind).collect()
    }

    /// Problems found while opening that did not prevent opening
    /// (e.g. an unreadable navigation document).
    fn diagnostics(&self) -> &[String] {
        &[]
    }
}

/// Container backed by in-memory buffers.
///
/// ```
/// use unbind::{Container, MemoryContainer, NavNode};
///
/// let mut book = MemoryContainer::new()
///     .with_resource("Text/ch1.xhtml", "application/xhtml+xml", b"<html><body>Hi</body></html>".to_vec())
///     .with_spine("Text/ch1.xhtml")
///     .with_navigation(vec![NavNode::new("One", Some("Text/ch1.xhtml"))]);
///
/// assert_eq!(book.spine(), ["Text/ch1.xhtml"]);
/// assert!(book.read_text("Text/ch1.xhtml").unwrap().contains("Hi"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryContainer {
    manifest: Vec<ManifestEntry>,
    data: HashMap<String, Vec<u8>>,
    spine: Vec<String>,
    navigation: Option<Vec<NavNode>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manifest entry and its content. The key doubles as manifest id.
    pub fn with_resource(
        mut self,
        key: impl Into<String>,
        media_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let key = key.into();
        self.data.insert(key.clone(), data);
        self.manifest.push(ManifestEntry::new(key.clone(), key, media_type));
        self
    }

    /// Append a key to the spine.
    pub fn with_spine(mut self, key: impl Into<String>) -> Self {
        self.spine.push(key.into());
        self
    }

    /// Set the navigation tree.
    pub fn with_navigation(mut self, navigation: Vec<NavNode>) -> Self {
        self.navigation = Some(navigation);
        self
    }
}

impl Container for MemoryContainer {
    fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    fn spine(&self) -> &[String] {
        &self.spine
    }

    fn navigation(&self) -> Option<&[NavNode]> {
        self.navigation.as_deref()
    }

    fn read_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        self.data
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingEntry(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_filters_by_kind_in_manifest_order() {
        let book = MemoryContainer::new()
            .with_resource("b.png", "image/png", vec![1])
            .with_resource("style.css", "text/css", vec![])
            .with_resource("a.jpg", "image/jpeg", vec![2]);

        let images: Vec<_> = book
            .resources(ResourceKind::Image)
            .into_iter()
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(images, ["b.png", "a.jpg"]);
        assert!(book.resources(ResourceKind::Font).is_empty());
    }

    #[test]
    fn test_missing_entry() {
        let mut book = MemoryContainer::new();
        assert!(matches!(
            book.read_bytes("nope.xhtml"),
            Err(Error::MissingEntry(key)) if key == "nope.xhtml"
        ));
    }

    #[test]
    fn test_read_text_uses_declared_encoding() {
        let mut book = MemoryContainer::new().with_resource(
            "latin.xhtml",
            "application/xhtml+xml",
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-2\"?><p>\xb1</p>".to_vec(),
        );
        // 0xB1 is "a with ogonek" in ISO-8859-2, "plus-minus" in Windows-1252.
        assert!(book.read_text("latin.xhtml").unwrap().contains('\u{105}'));
    }
}
