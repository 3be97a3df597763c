//! Per-book output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{BookId, working_dir_path};
use crate::error::{Error, Result};

/// Handle to `{output_base}/{book_id}`, created by this run.
///
/// Every artifact of a run is written through the handle.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create the directory for `book_id` under `output_base`.
    ///
    /// `output_base` is created if needed; the book directory itself must
    /// not exist yet, and an existing one is left untouched.
    pub fn allocate(output_base: &Path, book_id: &BookId) -> Result<Self> {
        fs::create_dir_all(output_base)?;

        let path = working_dir_path(output_base, book_id);
        match fs::create_dir(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::WorkingDirectoryExists(path)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` to `name` inside the directory, replacing any earlier file.
    ///
    /// `name` must be a bare file name.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::InvalidFileName(name.to_string()));
        }

        let path = self.path.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Serialize `value` as JSON into `name`.
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_vec(value)?;
        self.write(name, &json)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn book_id() -> BookId {
        BookId::parse("4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3").unwrap()
    }

    #[test]
    fn test_allocate_creates_nested_base() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("a").join("b");

        let dir = WorkingDirectory::allocate(&base, &book_id()).unwrap();

        assert!(dir.path().is_dir());
        assert_eq!(dir.path(), base.join("4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3"));
    }

    #[test]
    fn test_second_allocation_fails_and_keeps_files() {
        let tmp = TempDir::new().unwrap();
        let first = WorkingDirectory::allocate(tmp.path(), &book_id()).unwrap();
        let written = first.write("a.xhtml", b"<p>first</p>").unwrap();

        let err = WorkingDirectory::allocate(tmp.path(), &book_id()).unwrap_err();

        assert!(matches!(&err, Error::WorkingDirectoryExists(path) if path == first.path()));
        assert_eq!(err.to_string(), format!("Directory: {} exists!", first.path().display()));
        assert_eq!(fs::read(written).unwrap(), b"<p>first</p>");
    }

    #[test]
    fn test_write_rejects_paths() {
        let tmp = TempDir::new().unwrap();
        let dir = WorkingDirectory::allocate(tmp.path(), &book_id()).unwrap();

        for name in ["", "..", "../escape.txt", "sub\\x.css"] {
            assert!(matches!(dir.write(name, b"x"), Err(Error::InvalidFileName(_))), "{name:?}");
        }
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let dir = WorkingDirectory::allocate(tmp.path(), &book_id()).unwrap();

        dir.write("cover.jpg", b"one").unwrap();
        let path = dir.write("cover.jpg", b"two").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"two");
    }

    #[test]
    fn test_write_json() {
        let tmp = TempDir::new().unwrap();
        let dir = WorkingDirectory::allocate(tmp.path(), &book_id()).unwrap();

        let path = dir.write_json("readingOrder.json", &["a.xhtml", "b.xhtml"]).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), r#"["a.xhtml","b.xhtml"]"#);
    }
}
