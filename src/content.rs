//! Content references and the resolver that turns them into bytes
//!
//! A [`ContentUri`] is an opaque handle to a file-like resource. The host supplies a
//! [`ContentResolver`] that can report the size and type of a handle and open it for
//! reading. [`FileContentResolver`] is a directory-backed implementation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncRead;
use url::Url;

use crate::{Error, Result};

/// Scheme used by content providers
pub const SCHEME_CONTENT: &str = "content";

/// Scheme used for plain files
pub const SCHEME_FILE: &str = "file";

/// Readable stream over a resolved content reference
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

/// Opaque handle identifying a resource resolvable to a stream and byte length
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentUri(Url);

impl ContentUri {
    /// Parse a URI such as `content://media/external/images/42` or `file:///tmp/a.jpg`
    pub fn parse(uri: &str) -> Result<Self> {
        Ok(Self(Url::parse(uri)?))
    }

    /// Build a `file://` URI from an absolute path
    pub fn from_file_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Url::from_file_path(path)
            .map(Self)
            .map_err(|_| Error::InvalidUrl(path.display().to_string()))
    }

    /// URI scheme
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Authority of a content URI (`media` in `content://media/...`)
    pub fn authority(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Whether this handle points at a content provider
    pub fn is_content(&self) -> bool {
        self.scheme() == SCHEME_CONTENT
    }

    /// Local path for `file://` URIs
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.scheme() == SCHEME_FILE {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    /// Decoded path segments after the authority
    pub fn path_segments(&self) -> Vec<String> {
        self.0
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        urlencoding::decode(s)
                            .map(|s| s.into_owned())
                            .unwrap_or_else(|_| s.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The URI as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Access to the platform's content-resolution subsystem.
///
/// All methods are blocking; they are called from the task that is building the request.
pub trait ContentResolver: Send + Sync {
    /// Query the size column of a content reference.
    ///
    /// Returns `Ok(None)` when the provider has no row for the reference.
    fn query_size(&self, uri: &ContentUri) -> io::Result<Option<u64>>;

    /// MIME type of the referenced content, if the provider knows it
    fn get_type(&self, uri: &ContentUri) -> Option<String>;

    /// Open the referenced content for reading
    fn open_input_stream(&self, uri: &ContentUri) -> io::Result<ContentStream>;
}

/// Directory-backed resolver.
///
/// `content://<authority>/<path>` resolves to `<root>/<authority>/<path>` and
/// `file://` URIs are served directly from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileContentResolver {
    root: PathBuf,
}

impl FileContentResolver {
    /// Create a resolver that serves content URIs from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory for content URIs
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a handle to a local path
    pub fn resolve_path(&self, uri: &ContentUri) -> io::Result<PathBuf> {
        if let Some(path) = uri.to_file_path() {
            return Ok(path);
        }

        if !uri.is_content() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported scheme: {}", uri.scheme()),
            ));
        }

        let authority = uri.authority().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("missing authority: {uri}"))
        })?;

        let mut path = self.root.join(authority);
        for segment in uri.path_segments() {
            // Keep lookups inside the root
            if segment == ".." || segment.contains('/') || segment.contains('\\') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid path segment in {uri}"),
                ));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ContentResolver for FileContentResolver {
    fn query_size(&self, uri: &ContentUri) -> io::Result<Option<u64>> {
        let path = self.resolve_path(uri)?;
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get_type(&self, uri: &ContentUri) -> Option<String> {
        let path = self.resolve_path(uri).ok()?;
        mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
    }

    fn open_input_stream(&self, uri: &ContentUri) -> io::Result<ContentStream> {
        let path = self.resolve_path(uri)?;
        let file = std::fs::File::open(path)?;
        Ok(Box::pin(tokio::fs::File::from_std(file)))
    }
}
