//! `multipart/form-data` request body
//!
//! The transport is told the body length before the first byte is streamed, so the
//! body is built in two passes over the same precomputed parts. `setup` generates the
//! boundary, renders every part header and measures every file. `content_length` sums
//! those measurements. `write_to` streams the parts in the same order:
//!
//! ```text
//! each field:  \r\n--<boundary>\r\n
//!               Content-Disposition: form-data; name="<name>"\r\n\r\n<value>
//! each file:    \r\n--<boundary>\r\n
//!               Content-Disposition: form-data; name="<field>"; filename="<random>"\r\n
//!               Content-Type: <type>\r\n\r\n<file bytes>
//! once:         \r\n--<boundary>--\r\n
//! ```

use std::sync::Arc;

use http::{HeaderValue, Method};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::body::{Progress, RequestBody, RequestSetup};
use crate::content::{ContentResolver, ContentUri};
use crate::{Error, Result, files};

const NEW_LINE: &str = "\r\n";
const TWO_HYPHENS: &str = "--";

/// Size of each chunk copied from an upload source
pub const BUFFER_LENGTH: usize = 4096;

/// Content type used when the resolver does not know one or reports one that is not a
/// valid header value
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// A file registered for upload under a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Form field name
    pub field: String,
    /// Content to upload
    pub uri: ContentUri,
}

/// Multipart form body made of the request parameters plus file uploads.
///
/// Uploads are kept in registration order. Several files may share a field name and
/// the same content may be registered more than once; every registration is sent.
pub struct MultiPart {
    resolver: Arc<dyn ContentResolver>,
    uploads: Vec<FileUpload>,
    prepared: Option<PreparedBody>,
}

struct PreparedBody {
    boundary: String,
    boundary_bytes: Vec<u8>,
    final_boundary_bytes: Vec<u8>,
    fields: Vec<Vec<u8>>,
    total_field_bytes: u64,
    files: Vec<PreparedFile>,
    total_file_bytes: u64,
}

struct PreparedFile {
    uri: ContentUri,
    header: Vec<u8>,
    size: u64,
}

impl MultiPart {
    /// Create an empty multipart body resolving uploads through `resolver`
    pub fn new(resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            resolver,
            uploads: Vec::new(),
            prepared: None,
        }
    }

    /// Register a file upload for `field`
    pub fn add_file_upload(&mut self, field: impl Into<String>, uri: ContentUri) {
        self.uploads.push(FileUpload {
            field: field.into(),
            uri,
        });
    }

    /// Registered uploads in registration order
    pub fn uploads(&self) -> &[FileUpload] {
        &self.uploads
    }

    /// Boundary token, available after setup
    pub fn boundary(&self) -> Option<&str> {
        self.prepared.as_ref().map(|p| p.boundary.as_str())
    }

    fn prepared(&self) -> Result<&PreparedBody> {
        self.prepared
            .as_ref()
            .ok_or_else(|| Error::Internal("multipart body used before setup".to_string()))
    }

    fn prepare_file(&self, upload: &FileUpload) -> Result<PreparedFile> {
        let content_type = self
            .resolver
            .get_type(&upload.uri)
            .filter(|t| HeaderValue::from_str(t).is_ok())
            .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string());
        let header = file_header(&upload.field, &files::new_unique_file_name(), &content_type);
        let size = files::file_size(self.resolver.as_ref(), &upload.uri)?;

        Ok(PreparedFile {
            uri: upload.uri.clone(),
            header,
            size,
        })
    }
}

impl RequestBody for MultiPart {
    fn setup(&mut self, setup: &mut RequestSetup<'_>) -> Result<()> {
        setup.set_method(Method::POST);
        setup.add_header("Cache-Control", "no-cache");
        setup.add_header("Connection", "Keep-Alive");

        let boundary = generate_boundary();
        setup.add_header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        );

        let fields: Vec<Vec<u8>> = setup
            .parameters()
            .iter()
            .map(|(name, value)| field_part(name, value))
            .collect();
        let total_field_bytes = fields.iter().map(|f| f.len() as u64).sum();

        let files = self
            .uploads
            .iter()
            .map(|upload| self.prepare_file(upload))
            .collect::<Result<Vec<_>>>()?;
        let total_file_bytes = files
            .iter()
            .map(|f| f.header.len() as u64 + f.size)
            .sum();

        tracing::debug!(
            %boundary,
            fields = fields.len(),
            files = files.len(),
            "prepared multipart body"
        );

        self.prepared = Some(PreparedBody {
            boundary_bytes: boundary_delimiter(&boundary),
            final_boundary_bytes: final_boundary_delimiter(&boundary),
            boundary,
            fields,
            total_field_bytes,
            files,
            total_file_bytes,
        });
        Ok(())
    }

    fn content_length(&self) -> Result<u64> {
        let prepared = self.prepared()?;
        let boundary_len = prepared.boundary_bytes.len() as u64;

        let field_boundaries = boundary_len * prepared.fields.len() as u64;
        let file_boundaries = boundary_len * prepared.files.len() as u64;

        Ok(prepared.total_field_bytes
            + field_boundaries
            + prepared.total_file_bytes
            + file_boundaries
            + prepared.final_boundary_bytes.len() as u64)
    }

    async fn write_to<W>(&mut self, out: &mut W, progress: &Progress) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let prepared = self.prepared()?;
        let boundary = &prepared.boundary_bytes;

        for field in &prepared.fields {
            out.write_all(boundary).await?;
            out.write_all(field).await?;
            progress.notify((boundary.len() + field.len()) as u64);
        }

        let mut buffer = vec![0u8; BUFFER_LENGTH];
        for file in &prepared.files {
            out.write_all(boundary).await?;
            out.write_all(&file.header).await?;
            progress.notify((boundary.len() + file.header.len()) as u64);

            let mut input = self.resolver.open_input_stream(&file.uri)?;
            let mut copied: u64 = 0;
            loop {
                let read = input.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                copied += read as u64;
                if copied > file.size {
                    return Err(Error::ContentLengthMismatch {
                        expected: file.size,
                        actual: copied,
                    });
                }
                out.write_all(&buffer[..read]).await?;
                progress.notify(read as u64);
            }

            if copied != file.size {
                return Err(Error::ContentLengthMismatch {
                    expected: file.size,
                    actual: copied,
                });
            }
        }

        out.write_all(&prepared.final_boundary_bytes).await?;
        progress.notify(prepared.final_boundary_bytes.len() as u64);
        out.flush().await?;
        Ok(())
    }
}

fn generate_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

fn boundary_delimiter(boundary: &str) -> Vec<u8> {
    format!("{NEW_LINE}{TWO_HYPHENS}{boundary}{NEW_LINE}").into_bytes()
}

fn final_boundary_delimiter(boundary: &str) -> Vec<u8> {
    format!("{NEW_LINE}{TWO_HYPHENS}{boundary}{TWO_HYPHENS}{NEW_LINE}").into_bytes()
}

fn field_part(name: &str, value: &str) -> Vec<u8> {
    format!("Content-Disposition: form-data; name=\"{name}\"{NEW_LINE}{NEW_LINE}{value}")
        .into_bytes()
}

fn file_header(field: &str, filename: &str, content_type: &str) -> Vec<u8> {
    format!(
        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"{NEW_LINE}\
         Content-Type: {content_type}{NEW_LINE}{NEW_LINE}"
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::ProgressCallback;
    use crate::content::{ContentStream, FileContentResolver};
    use crate::params::Parameters;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fixture(files: &[(&str, Vec<u8>)]) -> (tempfile::TempDir, Arc<dyn ContentResolver>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join("files").join(name), contents).unwrap();
        }
        let resolver: Arc<dyn ContentResolver> = Arc::new(FileContentResolver::new(dir.path()));
        (dir, resolver)
    }

    fn uri(name: &str) -> ContentUri {
        ContentUri::parse(&format!("content://files/{name}")).unwrap()
    }

    fn setup_body(body: &mut MultiPart, params: &Parameters) -> Parameters {
        let mut headers = Parameters::new();
        let mut setup = RequestSetup::new(&mut headers, params);
        body.setup(&mut setup).unwrap();
        assert_eq!(*setup.method(), Method::POST);
        headers
    }

    #[tokio::test]
    async fn test_single_field_body() {
        let (_dir, resolver) = fixture(&[]);
        let mut body = MultiPart::new(resolver);
        let params: Parameters = [("title", "hello")].into_iter().collect();

        let headers = setup_body(&mut body, &params);
        let boundary = body.boundary().unwrap().to_string();

        let content_type = headers
            .iter()
            .find(|(k, _)| *k == "Content-Type")
            .map(|(_, v)| v.to_string())
            .unwrap();
        assert_eq!(
            content_type,
            format!("multipart/form-data; boundary={}", boundary)
        );

        let expected = format!(
            "\r\n--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n\
             hello\r\n--{b}--\r\n",
            b = boundary
        );

        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &Progress::default()).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), expected);
        assert_eq!(body.content_length().unwrap(), expected.len() as u64);
    }

    #[tokio::test]
    async fn test_length_matches_written_bytes() {
        let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let (_dir, resolver) = fixture(&[
            ("photo.jpg", vec![0xFF; 4096]),
            ("big.bin", big),
            ("empty.txt", Vec::new()),
        ]);

        let uploads = [
            ("photo", "photo.jpg"),
            ("attachments", "big.bin"),
            ("attachments", "empty.txt"),
        ];

        for file_count in 0..=uploads.len() {
            for field_count in 0..3 {
                check_declared_length(&resolver, &uploads[..file_count], field_count).await;
            }
        }
    }

    async fn check_declared_length(
        resolver: &Arc<dyn ContentResolver>,
        uploads: &[(&str, &str)],
        field_count: usize,
    ) {
        let mut body = MultiPart::new(resolver.clone());
        for (field, name) in uploads {
            body.add_file_upload(*field, uri(name));
        }

        let params: Parameters = (0..field_count)
            .map(|i| (format!("field{i}"), format!("välue {i}")))
            .collect();
        setup_body(&mut body, &params);

        let declared = body.content_length().unwrap();
        let total_notified = Arc::new(AtomicU64::new(0));
        let counter = total_notified.clone();
        let callback: ProgressCallback = Arc::new(move |sent, total| {
            assert_eq!(total, declared);
            counter.fetch_add(sent, Ordering::SeqCst);
        });

        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &Progress::new(Some(callback), declared))
            .await
            .unwrap();

        assert_eq!(out.len() as u64, declared);
        assert_eq!(total_notified.load(Ordering::SeqCst), declared);
    }

    #[tokio::test]
    async fn test_file_part_layout_and_chunked_progress() {
        let contents = vec![b'x'; BUFFER_LENGTH * 2 + 10];
        let (_dir, resolver) = fixture(&[("notes.txt", contents.clone())]);

        let mut body = MultiPart::new(resolver);
        body.add_file_upload("doc", uri("notes.txt"));
        setup_body(&mut body, &Parameters::new());
        let boundary = body.boundary().unwrap().to_string();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let callback: ProgressCallback = Arc::new(move |sent, _| sink.lock().unwrap().push(sent));

        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &Progress::new(Some(callback), 0))
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let prefix = format!(
            "\r\n--{}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"",
            boundary
        );
        assert!(text.starts_with(&prefix));
        assert!(text.contains("\"\r\nContent-Type: text/plain\r\n\r\nxxxx"));
        assert!(text.ends_with(&format!("x\r\n--{}--\r\n", boundary)));

        // header, file chunks, final boundary
        let calls = calls.lock().unwrap();
        let chunk_sum: u64 = calls[1..calls.len() - 1].iter().sum();
        assert_eq!(chunk_sum, contents.len() as u64);
        assert!(calls[1..calls.len() - 1].iter().all(|&n| n <= BUFFER_LENGTH as u64));
        assert_eq!(*calls.last().unwrap(), (boundary.len() + 8) as u64);
    }

    #[tokio::test]
    async fn test_duplicate_uploads_are_all_sent() {
        let (_dir, resolver) = fixture(&[("a.txt", b"AAA".to_vec())]);

        let mut body = MultiPart::new(resolver);
        body.add_file_upload("files", uri("a.txt"));
        body.add_file_upload("files", uri("a.txt"));
        setup_body(&mut body, &Parameters::new());

        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &Progress::default()).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("name=\"files\"").count(), 2);
        assert_eq!(text.matches("\r\n\r\nAAA").count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_type_and_fresh_boundaries() {
        let (_dir, resolver) = fixture(&[("blob", b"123".to_vec())]);

        let mut first = MultiPart::new(resolver.clone());
        first.add_file_upload("data", uri("blob"));
        setup_body(&mut first, &Parameters::new());

        let mut second = MultiPart::new(resolver);
        setup_body(&mut second, &Parameters::new());
        assert_ne!(first.boundary(), second.boundary());

        let mut out: Vec<u8> = Vec::new();
        first.write_to(&mut out, &Progress::default()).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("Content-Type: {}\r\n\r\n123", DEFAULT_FILE_CONTENT_TYPE)));
    }

    struct ForcedTypeResolver {
        inner: FileContentResolver,
        content_type: &'static str,
    }

    impl ContentResolver for ForcedTypeResolver {
        fn query_size(&self, uri: &ContentUri) -> std::io::Result<Option<u64>> {
            self.inner.query_size(uri)
        }

        fn get_type(&self, _uri: &ContentUri) -> Option<String> {
            Some(self.content_type.to_string())
        }

        fn open_input_stream(&self, uri: &ContentUri) -> std::io::Result<ContentStream> {
            self.inner.open_input_stream(uri)
        }
    }

    #[tokio::test]
    async fn test_header_breaking_type_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        std::fs::write(dir.path().join("files/data.txt"), b"payload").unwrap();

        let resolver: Arc<dyn ContentResolver> = Arc::new(ForcedTypeResolver {
            inner: FileContentResolver::new(dir.path()),
            content_type: "text/plain\r\nX-Injected: 1",
        });
        let mut body = MultiPart::new(resolver);
        body.add_file_upload("doc", uri("data.txt"));
        setup_body(&mut body, &Parameters::new());

        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &Progress::default()).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!(
            "Content-Type: {}\r\n\r\npayload",
            DEFAULT_FILE_CONTENT_TYPE
        )));
        assert!(!text.contains("X-Injected"));
        assert_eq!(body.content_length().unwrap(), text.len() as u64);
    }

    #[tokio::test]
    async fn test_file_changed_after_measuring() {
        let (dir, resolver) = fixture(&[("grow.txt", b"short".to_vec())]);

        let mut body = MultiPart::new(resolver);
        body.add_file_upload("doc", uri("grow.txt"));
        setup_body(&mut body, &Parameters::new());

        std::fs::write(dir.path().join("files/grow.txt"), b"much longer now").unwrap();

        let mut out: Vec<u8> = Vec::new();
        let error = body
            .write_to(&mut out, &Progress::default())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            Error::ContentLengthMismatch { expected: 5, .. }
        ));
    }

    #[test]
    fn test_length_requires_setup() {
        let (_dir, resolver) = fixture(&[]);
        let body = MultiPart::new(resolver);
        assert!(matches!(body.content_length(), Err(Error::Internal(_))));
    }
}
