//! # unbind
//!
//! Unpacks EPUB books into assets a web reader can serve directly.
//!
//! ## Features
//!
//! - Reading order from the EPUB 3 nav document or EPUB 2 NCX, spine as fallback
//! - Body extraction with html5ever, with a textual fallback for broken XHTML
//! - Image and `@font-face` references rewritten to an asset server
//! - Minified HTML fragments and stylesheets, one file per resource
//! - `readingOrder.json` and `styleList.json` manifests
//!
//! ## Quick Start
//!
//! ```no_run
//! use unbind::{Processor, ProcessorConfig, TracingLog};
//!
//! let config = ProcessorConfig::new(
//!     "4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3",
//!     "book.epub",
//!     "/srv/books",
//!     "http://localhost:8000/",
//! )?;
//! let log = TracingLog::new(config.book_id);
//! let summary = Processor::new(config, log).process()?;
//! println!("{} documents written", summary.documents.written);
//! # Ok::<(), unbind::Error>(())
//! ```
//!
//! ## Custom containers
//!
//! The pipeline reads through the [`Container`] trait, so books that are
//! already in memory can be processed without an archive:
//!
//! ```
//! use unbind::{MemoryContainer, MemoryLog, Processor, ProcessorConfig};
//!
//! let out = tempfile::tempdir()?;
//! let mut book = MemoryContainer::new()
//!     .with_resource("Text/ch1.xhtml", "application/xhtml+xml", b"<html><body><p>Hi</p></body></html>".to_vec())
//!     .with_spine("Text/ch1.xhtml");
//!
//! let config = ProcessorConfig::new("4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3", "-", out.path(), "/assets/")?;
//! let summary = Processor::new(config, MemoryLog::new()).process_container(&mut book)?;
//! assert_eq!(summary.documents.written, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dom;
pub mod epub;
pub mod error;
pub mod export;
pub mod import;
pub mod log;
pub mod processor;
pub mod reading_order;
pub mod transform;
pub(crate) mod util;
pub mod workdir;

pub use config::{BookId, ProcessorConfig, ResourceServerBase};
pub use error::{Error, Result};
pub use export::ExportCounts;
pub use import::{Container, EpubContainer, ManifestEntry, MemoryContainer, NavNode, ResourceKind};
pub use log::{LogEntry, MemoryLog, ProcessLog, TracingLog};
pub use processor::{ProcessSummary, Processor, READING_ORDER_FILE, STYLE_LIST_FILE, Step};
pub use reading_order::{OrderSource, ReadingOrder};
pub use transform::html::BodySource;
pub use util::strip_file_name;
pub use workdir::WorkingDirectory;
