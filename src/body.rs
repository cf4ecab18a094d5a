//! Request body strategies
//!
//! A request body goes through three steps, always in this order: [`RequestBody::setup`]
//! picks the method and headers and precomputes whatever must be measured,
//! [`RequestBody::content_length`] reports the exact byte count, and
//! [`RequestBody::write_to`] writes exactly that many bytes.

use std::future::Future;

use http::Method;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::backend::types::ProgressCallback;
use crate::params::{Parameters, url_encode_parameters};
use crate::{Error, Result};

/// Content type sent with URL-encoded form bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Mutable view of a request handed to [`RequestBody::setup`]
pub struct RequestSetup<'a> {
    method: Method,
    headers: &'a mut Parameters,
    parameters: &'a Parameters,
}

impl<'a> RequestSetup<'a> {
    /// Create a setup view over a request's headers and body parameters
    pub fn new(headers: &'a mut Parameters, parameters: &'a Parameters) -> Self {
        Self {
            method: Method::GET,
            headers,
            parameters,
        }
    }

    /// Set the request method
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The request method chosen so far
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Append a request header; later headers replace earlier ones with the same name
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(name, value);
    }

    /// Body parameters registered on the request
    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    pub(crate) fn into_method(self) -> Method {
        self.method
    }
}

/// Upload progress reporter bound to a declared body length
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<ProgressCallback>,
    total: u64,
}

impl Progress {
    /// Create a reporter for a body of `total` bytes
    pub fn new(callback: Option<ProgressCallback>, total: u64) -> Self {
        Self { callback, total }
    }

    /// Report that `bytes_sent` more bytes were written
    pub fn notify(&self, bytes_sent: u64) {
        if let Some(callback) = &self.callback {
            callback(bytes_sent, self.total);
        }
    }
}

/// Method-specific part of a request.
pub trait RequestBody: Send {
    /// Set the method and content headers and precompute the body
    fn setup(&mut self, setup: &mut RequestSetup<'_>) -> Result<()>;

    /// Exact number of bytes [`RequestBody::write_to`] will produce
    fn content_length(&self) -> Result<u64>;

    /// Write the body, reporting progress per chunk
    fn write_to<W>(
        &mut self,
        out: &mut W,
        progress: &Progress,
    ) -> impl Future<Output = Result<()>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

/// GET request: no body
#[derive(Debug, Clone, Copy, Default)]
pub struct Get;

impl RequestBody for Get {
    fn setup(&mut self, setup: &mut RequestSetup<'_>) -> Result<()> {
        setup.set_method(Method::GET);
        Ok(())
    }

    fn content_length(&self) -> Result<u64> {
        Ok(0)
    }

    async fn write_to<W>(&mut self, _out: &mut W, _progress: &Progress) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Err(Error::UnsupportedOperation("GET requests have no body"))
    }
}

/// DELETE request: no body.
///
/// HTTP allows a DELETE body, but this request kind does not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delete;

impl RequestBody for Delete {
    fn setup(&mut self, setup: &mut RequestSetup<'_>) -> Result<()> {
        setup.set_method(Method::DELETE);
        Ok(())
    }

    fn content_length(&self) -> Result<u64> {
        Ok(0)
    }

    async fn write_to<W>(&mut self, _out: &mut W, _progress: &Progress) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Err(Error::UnsupportedOperation("DELETE request bodies"))
    }
}

/// `application/x-www-form-urlencoded` POST body built from the request parameters
#[derive(Debug, Clone, Default)]
pub struct WwwForm {
    encoded: Option<Vec<u8>>,
}

impl WwwForm {
    /// Encoded body, available after setup
    pub fn encoded(&self) -> Option<&[u8]> {
        self.encoded.as_deref()
    }
}

impl RequestBody for WwwForm {
    fn setup(&mut self, setup: &mut RequestSetup<'_>) -> Result<()> {
        setup.set_method(Method::POST);
        setup.add_header("Content-Type", FORM_CONTENT_TYPE);
        self.encoded = Some(url_encode_parameters(setup.parameters()).into_bytes());
        Ok(())
    }

    fn content_length(&self) -> Result<u64> {
        self.encoded
            .as_ref()
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| Error::Internal("form body measured before setup".to_string()))
    }

    async fn write_to<W>(&mut self, out: &mut W, progress: &Progress) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let encoded = self
            .encoded
            .as_ref()
            .ok_or_else(|| Error::Internal("form body written before setup".to_string()))?;

        out.write_all(encoded).await?;
        progress.notify(encoded.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_progress(total: u64) -> (Progress, Arc<Mutex<Vec<(u64, u64)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let callback: ProgressCallback = Arc::new(move |sent, total| {
            sink.lock().unwrap().push((sent, total));
        });
        (Progress::new(Some(callback), total), calls)
    }

    #[tokio::test]
    async fn test_get_has_no_body() {
        let mut headers = Parameters::new();
        let params = Parameters::new();
        let mut setup = RequestSetup::new(&mut headers, &params);

        let mut body = Get;
        body.setup(&mut setup).unwrap();
        assert_eq!(*setup.method(), Method::GET);
        assert_eq!(body.content_length().unwrap(), 0);

        let mut out: Vec<u8> = Vec::new();
        let error = body.write_to(&mut out, &Progress::default()).await.unwrap_err();
        assert!(matches!(error, Error::UnsupportedOperation(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_delete_body_write_is_unsupported() {
        let mut headers = Parameters::new();
        let params = Parameters::new();
        let mut setup = RequestSetup::new(&mut headers, &params);

        let mut body = Delete;
        body.setup(&mut setup).unwrap();
        assert_eq!(*setup.method(), Method::DELETE);
        assert_eq!(body.content_length().unwrap(), 0);

        let mut out: Vec<u8> = Vec::new();
        let error = body.write_to(&mut out, &Progress::default()).await.unwrap_err();
        assert!(matches!(error, Error::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn test_form_body_and_progress() {
        let mut headers = Parameters::new();
        let params: Parameters = [("name", "Jane Doe"), ("city", "Zürich")].into_iter().collect();
        let mut setup = RequestSetup::new(&mut headers, &params);

        let mut body = WwwForm::default();
        body.setup(&mut setup).unwrap();
        assert_eq!(*setup.method(), Method::POST);
        drop(setup);

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Content-Type", FORM_CONTENT_TYPE)]
        );

        let expected = b"name=Jane%20Doe&city=Z%C3%BCrich";
        let length = body.content_length().unwrap();
        assert_eq!(length, expected.len() as u64);

        let (progress, calls) = recording_progress(length);
        let mut out: Vec<u8> = Vec::new();
        body.write_to(&mut out, &progress).await.unwrap();

        assert_eq!(out, expected);
        assert_eq!(*calls.lock().unwrap(), vec![(length, length)]);
    }

    #[test]
    fn test_form_length_requires_setup() {
        assert!(matches!(
            WwwForm::default().content_length(),
            Err(Error::Internal(_))
        ));
    }
}
