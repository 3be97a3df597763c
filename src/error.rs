//! Error types for unbind operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::transform::css::StylesheetError;

/// Errors that can occur while unpacking a book.
///
/// Whether an error aborts the run is decided by the pipeline step that
/// produced it (see [`Step::is_fatal`](crate::Step::is_fatal)), not by the
/// variant.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Entry not found in container: {0}")]
    MissingEntry(String),

    #[error("Invalid book identifier {value:?}: {source}")]
    InvalidBookId {
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Directory: {} exists!", .0.display())]
    WorkingDirectoryExists(PathBuf),

    #[error("Reading order not detected: container has neither navigation nor spine")]
    NoReadingOrder,

    #[error("No body section found in {0}")]
    NoBody(String),

    #[error("Stylesheet could not be parsed: {0}")]
    Stylesheet(#[from] StylesheetError),

    #[error("Cannot derive a file name from {0:?}")]
    InvalidFileName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
