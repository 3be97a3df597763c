//! Run configuration: book identity, output location and asset server.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::{is_internal_reference, strip_file_name};

/// Characters escaped when a file name becomes a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Identifier of one processed book; names its working directory and its
/// URL prefix on the asset server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookId(Uuid);

impl BookId {
    /// Fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|source| Error::InvalidBookId {
                value: value.to_string(),
                source,
            })
    }
}

impl FromStr for BookId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Base URL of the asset server, always ending with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResourceServerBase(String);

impl ResourceServerBase {
    pub fn new(base: &str) -> Result<Self> {
        let base = base.trim();
        if base.is_empty() {
            return Err(Error::InvalidConfig("resource server base is empty".into()));
        }
        if base.ends_with('/') {
            Ok(Self(base.to_string()))
        } else {
            Ok(Self(format!("{base}/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{base}{bookId}/{fileName}`; `file_name` is used verbatim.
    pub fn url_for(&self, book_id: &BookId, file_name: &str) -> String {
        format!("{}{}/{}", self.0, book_id, file_name)
    }

    /// URL under which the resource stored at `key` is served.
    ///
    /// The bare file name is percent-encoded, since keys are decoded paths.
    pub fn url_for_key(&self, book_id: &BookId, key: &str) -> String {
        let name = utf8_percent_encode(strip_file_name(key), PATH_SEGMENT).to_string();
        self.url_for(book_id, &name)
    }

    /// Canonical URL for a reference found in markup or CSS.
    ///
    /// `None` for references that must stay as they are: external URLs,
    /// `data:` URIs, fragments, values already under this base, and values
    /// without a file name. Applying this to its own output is a no-op.
    pub fn asset_url(&self, book_id: &BookId, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if !is_internal_reference(reference) || reference.starts_with(self.0.as_str()) {
            return None;
        }
        let name = strip_file_name(reference);
        if name.is_empty() {
            return None;
        }
        Some(self.url_for(book_id, name))
    }
}

impl fmt::Display for ResourceServerBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one run needs, validated up front.
///
/// The container path is not checked here; a missing file surfaces when the
/// container is opened.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub book_id: BookId,
    pub container_path: PathBuf,
    pub output_base: PathBuf,
    pub resource_server: ResourceServerBase,
}

impl ProcessorConfig {
    pub fn new(
        book_id: &str,
        container_path: impl Into<PathBuf>,
        output_base: impl Into<PathBuf>,
        resource_server: &str,
    ) -> Result<Self> {
        let container_path = container_path.into();
        let output_base = output_base.into();

        if container_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("container path is empty".into()));
        }
        if output_base.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("output directory is empty".into()));
        }

        Ok(Self {
            book_id: BookId::parse(book_id)?,
            container_path,
            output_base,
            resource_server: ResourceServerBase::new(resource_server)?,
        })
    }

    /// `{output_base}/{book_id}`.
    pub fn working_dir_path(&self) -> PathBuf {
        working_dir_path(&self.output_base, &self.book_id)
    }
}

pub(crate) fn working_dir_path(output_base: &Path, book_id: &BookId) -> PathBuf {
    output_base.join(book_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3";

    #[test]
    fn test_book_id_round_trip() {
        let id = BookId::parse(ID).unwrap();
        assert_eq!(id.to_string(), ID);
        assert_eq!("4AC4613C-BE9C-4F4C-A2B1-01B9FC0B4AA3".parse::<BookId>().unwrap(), id);
    }

    #[test]
    fn test_book_id_rejects_garbage() {
        let err = BookId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, Error::InvalidBookId { value, .. } if value == "not-a-uuid"));
    }

    #[test]
    fn test_server_base_normalized() {
        assert_eq!(ResourceServerBase::new(" http://h:8000 ").unwrap().as_str(), "http://h:8000/");
        assert_eq!(ResourceServerBase::new("http://h/").unwrap().as_str(), "http://h/");
        assert!(matches!(ResourceServerBase::new("  "), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_asset_url_reference_example() {
        let base = ResourceServerBase::new("http://localhost:8000/").unwrap();
        let id = BookId::parse(ID).unwrap();

        assert_eq!(
            base.asset_url(&id, "images/cover.jpg").as_deref(),
            Some("http://localhost:8000/4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3/cover.jpg")
        );
    }

    #[test]
    fn test_asset_url_is_idempotent() {
        let id = BookId::parse(ID).unwrap();
        for server in ["http://localhost:8000/", "/assets/"] {
            let base = ResourceServerBase::new(server).unwrap();
            let once = base.asset_url(&id, "../Images/a.png").unwrap();
            assert_eq!(base.asset_url(&id, &once), None);
        }
    }

    #[test]
    fn test_asset_url_leaves_external_references() {
        let base = ResourceServerBase::new("http://localhost:8000/").unwrap();
        let id = BookId::parse(ID).unwrap();

        assert_eq!(base.asset_url(&id, "data:image/png;base64,AAAA"), None);
        assert_eq!(base.asset_url(&id, "https://example.com/a.png"), None);
        assert_eq!(base.asset_url(&id, "images/"), None);
    }

    #[test]
    fn test_url_for_key_encodes_name() {
        let base = ResourceServerBase::new("http://h/").unwrap();
        let id = BookId::parse(ID).unwrap();
        assert_eq!(
            base.url_for_key(&id, "OEBPS/Styles/main style.css"),
            format!("http://h/{ID}/main%20style.css")
        );
    }

    #[test]
    fn test_config_validation() {
        let config = ProcessorConfig::new(ID, "book.epub", "/tmp/out", "http://h").unwrap();
        assert_eq!(config.working_dir_path(), Path::new("/tmp/out").join(ID));
        assert_eq!(config.resource_server.as_str(), "http://h/");

        assert!(matches!(
            ProcessorConfig::new(ID, "book.epub", "", "http://h"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ProcessorConfig::new("nope", "book.epub", "/tmp/out", "http://h"),
            Err(Error::InvalidBookId { .. })
        ));
    }
}
