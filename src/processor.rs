//! The processing pipeline: one container in, one working directory out.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::ProcessorConfig;
use crate::error::{Error, Result};
use crate::export::{ExportContext, ExportCounts, export_document, export_fonts, export_images, export_styles, style_list};
use crate::import::{Container, EpubContainer};
use crate::log::ProcessLog;
use crate::reading_order::ReadingOrder;
use crate::workdir::WorkingDirectory;

/// File name of the persisted reading order.
pub const READING_ORDER_FILE: &str = "readingOrder.json";
/// File name of the persisted stylesheet URL list.
pub const STYLE_LIST_FILE: &str = "styleList.json";

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    AllocateDirectory,
    OpenContainer,
    ExtractReadingOrder,
    ExportImages,
    ExportFonts,
    ExportStyles,
    /// Extract, rewrite, minify and persist one content document.
    Document,
    WriteReadingOrderManifest,
    WriteStyleListManifest,
}

impl Step {
    /// A failure in a fatal step ends the run.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Step::AllocateDirectory | Step::OpenContainer | Step::ExtractReadingOrder
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::AllocateDirectory => "allocate-directory",
            Step::OpenContainer => "open-container",
            Step::ExtractReadingOrder => "extract-reading-order",
            Step::ExportImages => "export-images",
            Step::ExportFonts => "export-fonts",
            Step::ExportStyles => "export-styles",
            Step::Document => "document",
            Step::WriteReadingOrderManifest => "write-reading-order",
            Step::WriteStyleListManifest => "write-style-list",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a completed run produced.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub documents: ExportCounts,
    pub images: ExportCounts,
    pub fonts: ExportCounts,
    pub styles: ExportCounts,
    pub reading_order_len: usize,
    /// Manifest files that could not be written.
    pub manifests_failed: usize,
}

impl ProcessSummary {
    /// Total number of recoverable failures.
    pub fn failures(&self) -> usize {
        self.documents.failed + self.images.failed + self.fonts.failed + self.styles.failed + self.manifests_failed
    }
}

/// Runs the pipeline for one configured book.
pub struct Processor<L: ProcessLog> {
    config: ProcessorConfig,
    log: L,
}

impl<L: ProcessLog> Processor<L> {
    pub fn new(config: ProcessorConfig, log: L) -> Self {
        Self { config, log }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Process the EPUB at the configured path.
    pub fn process(&self) -> Result<ProcessSummary> {
        let dir = self.allocate()?;
        let mut container = self.fatal(Step::OpenContainer, EpubContainer::open(&self.config.container_path))?;
        self.run(&dir, &mut container)
    }

    /// Process an already opened container.
    pub fn process_container<C: Container + ?Sized>(&self, container: &mut C) -> Result<ProcessSummary> {
        let dir = self.allocate()?;
        self.run(&dir, container)
    }

    fn allocate(&self) -> Result<WorkingDirectory> {
        let dir = self.fatal(
            Step::AllocateDirectory,
            WorkingDirectory::allocate(&self.config.output_base, &self.config.book_id),
        )?;
        self.log
            .message(&format!("Working directory: {}", dir.path().display()));
        Ok(dir)
    }

    fn run<C: Container + ?Sized>(&self, dir: &WorkingDirectory, container: &mut C) -> Result<ProcessSummary> {
        if let Some(title) = container.title() {
            self.log.message(&format!("Title: {title}"));
        }
        for diagnostic in container.diagnostics() {
            self.log.message(diagnostic);
        }

        let order = self.fatal(Step::ExtractReadingOrder, ReadingOrder::from_container(&*container))?;

        let ctx = ExportContext {
            dir,
            server: &self.config.resource_server,
            book_id: &self.config.book_id,
            log: &self.log,
        };

        let mut summary = ProcessSummary {
            images: export_images(container, &ctx),
            fonts: export_fonts(container, &ctx),
            styles: export_styles(container, &ctx),
            reading_order_len: order.len(),
            ..ProcessSummary::default()
        };

        let mut seen = HashSet::new();
        for key in &order.keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match export_document(container, &ctx, key) {
                Ok(path) => {
                    self.log.message(&format!("Saved file: {}", path.display()));
                    summary.documents.written += 1;
                }
                Err(e) => {
                    self.log.failure(Step::Document, &e);
                    summary.documents.failed += 1;
                }
            }
        }

        match dir.write_json(READING_ORDER_FILE, &order.file_names()) {
            Ok(path) => self.log.message(&format!(
                "Saved file: {} containing {} entries.",
                path.display(),
                order.len()
            )),
            Err(e) => {
                self.log.failure(Step::WriteReadingOrderManifest, &e);
                summary.manifests_failed += 1;
            }
        }

        let styles = style_list(&*container, &self.config.resource_server, &self.config.book_id);
        match dir.write_json(STYLE_LIST_FILE, &styles) {
            Ok(path) => self.log.message(&format!(
                "Saved file: {} containing {} entries.",
                path.display(),
                styles.len()
            )),
            Err(e) => {
                self.log.failure(Step::WriteStyleListManifest, &e);
                summary.manifests_failed += 1;
            }
        }

        Ok(summary)
    }

    /// Log a failed fatal step and pass the error on.
    fn fatal<T>(&self, step: Step, result: Result<T>) -> Result<T> {
        result.inspect_err(|e: &Error| self.log.failure(step, e))
    }
}
