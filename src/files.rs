//! File naming and size helpers

use std::io;

use uuid::Uuid;

use crate::content::{ContentResolver, ContentUri};

/// Generate a unique file name
pub fn new_unique_file_name() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a unique file name for a camera capture.
///
/// Cameras hand back JPEGs, so the name carries a `.jpg` extension.
pub fn new_unique_file_name_for_camera() -> String {
    format!("{}.jpg", new_unique_file_name())
}

/// Size in bytes of the resource behind `uri`.
///
/// Content URIs are answered by the resolver's size query; a reference the provider
/// has no row for counts as 0 bytes. Any other scheme is treated as a local file path.
pub fn file_size(resolver: &dyn ContentResolver, uri: &ContentUri) -> io::Result<u64> {
    if uri.is_content() {
        return Ok(resolver.query_size(uri)?.unwrap_or(0));
    }

    let path = uri.to_file_path().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file or content URI: {uri}"),
        )
    })?;
    Ok(std::fs::metadata(path)?.len())
}
