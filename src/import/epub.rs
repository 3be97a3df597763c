//! EPUB container - handles all archive IO.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::epub::{OpfData, parse_container_xml, parse_nav_xhtml, parse_ncx, parse_opf};
use crate::error::{Error, Result};
use crate::import::{Container, ManifestEntry, NavNode};
use crate::util::{is_internal_reference, parent_dir, resolve_href};

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Upper bound on the buffer reserved up front when reading an entry.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// EPUB file opened for reading.
pub struct EpubContainer<R = File> {
    archive: ZipArchive<R>,

    /// Normalized key -> raw ZIP entry name.
    entries: HashMap<String, String>,

    /// Book title from the OPF, when present.
    title: Option<String>,

    /// Manifest in package order, hrefs resolved to archive keys.
    manifest: Vec<ManifestEntry>,

    /// Spine as archive keys.
    spine: Vec<String>,

    /// Navigation tree (EPUB 3 nav document, else NCX).
    navigation: Option<Vec<NavNode>>,

    diagnostics: Vec<String>,
}

impl EpubContainer<File> {
    /// Open an EPUB file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> EpubContainer<R> {
    /// Open an EPUB from any seekable reader.
    pub fn from_reader(reader: R) -> Result<Self> {
        // 1. Index ZIP entries
        let archive = ZipArchive::new(reader)?;
        let entries = archive
            .file_names()
            .map(|name| (normalize_entry_name(name), name.to_string()))
            .collect();

        let mut container = Self {
            archive,
            entries,
            title: None,
            manifest: Vec::new(),
            spine: Vec::new(),
            navigation: None,
            diagnostics: Vec::new(),
        };

        // 2. Find OPF path from container.xml
        let container_bytes = container
            .read_bytes("META-INF/container.xml")
            .map_err(|e| Error::InvalidEpub(format!("META-INF/container.xml: {e}")))?;
        let opf_path = parse_container_xml(&container_bytes)
            .map_err(|e| Error::InvalidEpub(format!("META-INF/container.xml: {e}")))?;

        // 3. Parse OPF
        let opf_text = container
            .read_text(&opf_path)
            .map_err(|e| Error::InvalidEpub(format!("{opf_path}: {e}")))?;
        let opf = parse_opf(&opf_text).map_err(|e| Error::InvalidEpub(format!("{opf_path}: {e}")))?;
        let opf_dir = parent_dir(&opf_path).to_string();

        // 4. Manifest and spine
        container.title = opf.title.clone().filter(|t| !t.is_empty());
        container.manifest = opf
            .manifest
            .iter()
            .map(|item| ManifestEntry::new(&item.id, resolve_href(&opf_dir, &item.href), &item.media_type))
            .collect();

        for idref in &opf.spine_ids {
            match container.manifest.iter().find(|entry| &entry.id == idref) {
                Some(entry) => container.spine.push(entry.key.clone()),
                None => container
                    .diagnostics
                    .push(format!("Spine references unknown manifest id {idref:?}")),
            }
        }

        // 5. Navigation
        container.navigation = container.load_navigation(&opf, &opf_dir);

        Ok(container)
    }

    /// Parse the EPUB 3 nav document, falling back to the NCX.
    ///
    /// Failures are recorded as diagnostics; the book stays usable through
    /// its spine.
    fn load_navigation(&mut self, opf: &OpfData, opf_dir: &str) -> Option<Vec<NavNode>> {
        let nav_item = opf.manifest.iter().find(|item| item.has_property("nav"));
        let ncx_item = opf
            .toc_id
            .as_deref()
            .and_then(|id| opf.item(id))
            .or_else(|| opf.manifest.iter().find(|item| item.media_type == NCX_MEDIA_TYPE));

        if let Some(item) = nav_item {
            let key = resolve_href(opf_dir, &item.href);
            match self.read_text(&key).and_then(|text| Ok(parse_nav_xhtml(&text)?)) {
                Ok(nodes) if !nodes.is_empty() => return Some(resolve_links(nodes, parent_dir(&key))),
                Ok(_) => self
                    .diagnostics
                    .push(format!("Navigation document {key} has no entries")),
                Err(e) => self
                    .diagnostics
                    .push(format!("Navigation document {key} could not be read: {e}")),
            }
        }

        if let Some(item) = ncx_item {
            let key = resolve_href(opf_dir, &item.href);
            match self.read_text(&key).and_then(|text| Ok(parse_ncx(&text)?)) {
                Ok(nodes) => return Some(resolve_links(nodes, parent_dir(&key))),
                Err(e) => self
                    .diagnostics
                    .push(format!("NCX {key} could not be read: {e}")),
            }
        }

        None
    }
}

impl<R: Read + Seek> Container for EpubContainer<R> {
    fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    fn spine(&self) -> &[String] {
        &self.spine
    }

    fn navigation(&self) -> Option<&[NavNode]> {
        self.navigation.as_deref()
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn read_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        let name = self
            .entries
            .get(key)
            .or_else(|| self.entries.get(&normalize_entry_name(key)))
            .ok_or_else(|| Error::MissingEntry(key.to_string()))?;

        let mut file = self.archive.by_name(name)?;
        let mut out = Vec::with_capacity(initial_capacity(file.size()));
        file.read_to_end(&mut out)?;
        Ok(out)
    }

    fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Buffer size to reserve for an entry. The declared size comes from the
/// archive and is not trusted beyond [`MAX_PREALLOCATION`].
fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

/// ZIP names may be percent-encoded or use backslashes; manifest keys never are.
fn normalize_entry_name(name: &str) -> String {
    resolve_href("", &name.replace('\\', "/"))
}

/// Turn nav-relative hrefs into archive keys.
///
/// External links and bare fragments carry no document and become `None`.
fn resolve_links(nodes: Vec<NavNode>, base_dir: &str) -> Vec<NavNode> {
    nodes
        .into_iter()
        .map(|node| NavNode {
            label: node.label.trim().to_string(),
            link: node
                .link
                .filter(|href| is_internal_reference(href))
                .map(|href| resolve_href(base_dir, &href))
                .filter(|key| !key.is_empty()),
            children: resolve_links(node.children, base_dir),
        })
        .collect()
}
