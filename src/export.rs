//! Resource exporters: images, fonts, stylesheets and content documents.
//!
//! Each exporter walks its items independently. A failing item is logged and
//! counted; the loop always continues.

use serde::Serialize;

use crate::config::{BookId, ResourceServerBase};
use crate::error::{Error, Result};
use crate::import::{Container, ResourceKind};
use crate::log::ProcessLog;
use crate::processor::Step;
use crate::transform::css::rewrite_stylesheet;
use crate::transform::html::{extract_body, rewrite_image_references};
use crate::transform::minify::{minify_css, minify_html};
use crate::util::strip_file_name;
use crate::workdir::WorkingDirectory;

/// Outcome of one exporter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportCounts {
    pub written: usize,
    pub failed: usize,
}

impl ExportCounts {
    fn record<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => self.written += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Everything an exporter writes with.
pub struct ExportContext<'a, L: ProcessLog> {
    pub dir: &'a WorkingDirectory,
    pub server: &'a ResourceServerBase,
    pub book_id: &'a BookId,
    pub log: &'a L,
}

impl<L: ProcessLog> ExportContext<'_, L> {
    fn rewrite_reference(&self, reference: &str) -> Option<String> {
        self.server.asset_url(self.book_id, reference)
    }
}

/// Copy every image, byte for byte.
pub fn export_images<C, L>(container: &mut C, ctx: &ExportContext<'_, L>) -> ExportCounts
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    export_raw(container, ctx, ResourceKind::Image, Step::ExportImages, "image")
}

/// Copy every font, byte for byte.
pub fn export_fonts<C, L>(container: &mut C, ctx: &ExportContext<'_, L>) -> ExportCounts
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    export_raw(container, ctx, ResourceKind::Font, Step::ExportFonts, "font")
}

fn export_raw<C, L>(
    container: &mut C,
    ctx: &ExportContext<'_, L>,
    kind: ResourceKind,
    step: Step,
    noun: &str,
) -> ExportCounts
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    let keys = resource_keys(container, kind);
    let mut counts = ExportCounts::default();

    if keys.is_empty() {
        ctx.log.message(&format!("No {} found, skipping...", kind.plural()));
        return counts;
    }

    for key in keys {
        let result = container
            .read_bytes(&key)
            .and_then(|bytes| ctx.dir.write(strip_file_name(&key), &bytes));

        match &result {
            Ok(path) => ctx.log.message(&format!("Saved {noun}: {}.", path.display())),
            Err(e) => ctx.log.failure(step, e),
        }
        counts.record(&result);
    }

    counts
}

/// Rewrite, minify and write every stylesheet.
///
/// A stylesheet that cannot be parsed is written as an empty file so links
/// to it still resolve.
pub fn export_styles<C, L>(container: &mut C, ctx: &ExportContext<'_, L>) -> ExportCounts
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    let keys = resource_keys(container, ResourceKind::Stylesheet);
    let mut counts = ExportCounts::default();

    if keys.is_empty() {
        ctx.log.message("No style files found, skipping...");
        return counts;
    }

    for key in keys {
        let result = export_style(container, ctx, &key);
        match &result {
            Ok(path) => ctx.log.message(&format!("Saved style file: {}.", path.display())),
            Err(e) => ctx.log.failure(Step::ExportStyles, e),
        }
        counts.record(&result);
    }

    counts
}

fn export_style<C, L>(container: &mut C, ctx: &ExportContext<'_, L>, key: &str) -> Result<std::path::PathBuf>
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    let name = strip_file_name(key);
    let css = container.read_text(key)?;

    match rewrite_stylesheet(&css, |url| ctx.rewrite_reference(url)) {
        Ok(rewritten) => {
            if rewritten.dropped > 0 {
                ctx.log.message(&format!(
                    "Dropped {} unsupported at-rule(s) from {key}",
                    rewritten.dropped
                ));
            }
            ctx.dir.write(name, minify_css(&rewritten.css).as_bytes())
        }
        Err(e) => {
            ctx.dir.write(name, b"")?;
            Err(Error::Stylesheet(e))
        }
    }
}

/// Stylesheet URLs on the asset server, in manifest order.
pub fn style_list<C: Container + ?Sized>(container: &C, server: &ResourceServerBase, book_id: &BookId) -> Vec<String> {
    container
        .resources(ResourceKind::Stylesheet)
        .into_iter()
        .map(|entry| server.url_for_key(book_id, &entry.key))
        .collect()
}

/// Extract, rewrite, minify and write one content document.
pub fn export_document<C, L>(container: &mut C, ctx: &ExportContext<'_, L>, key: &str) -> Result<std::path::PathBuf>
where
    C: Container + ?Sized,
    L: ProcessLog,
{
    let markup = container.read_text(key)?;
    let mut body = extract_body(&markup).ok_or_else(|| Error::NoBody(key.to_string()))?;

    let root = body.root;
    rewrite_image_references(&mut body.dom, root, |src| ctx.rewrite_reference(src));

    let html = minify_html(&body.inner_html()?);
    ctx.dir.write(strip_file_name(key), html.as_bytes())
}

fn resource_keys<C: Container + ?Sized>(container: &C, kind: ResourceKind) -> Vec<String> {
    container
        .resources(kind)
        .into_iter()
        .map(|entry| entry.key.clone())
        .collect()
}
