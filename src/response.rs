//! Response handling

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::sync::mpsc;

use crate::backend::types::BackendResponse;
use crate::{Error, Result};

/// Band a status code falls into; exactly one applies to any code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 200..=299
    Success,
    /// 400..=499
    ClientError,
    /// 500..=599
    ServerError,
    /// Anything else, including 1xx and 3xx
    Other,
}

/// Classification of a raw status code.
///
/// Defined for every `i32`, including values no server would send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseStatus(pub i32);

impl ResponseStatus {
    /// The raw code
    pub fn code(&self) -> i32 {
        self.0
    }

    /// Check if the status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if the status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if the status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Client or server error
    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// The band this code falls into
    pub fn class(&self) -> StatusClass {
        if self.is_success() {
            StatusClass::Success
        } else if self.is_client_error() {
            StatusClass::ClientError
        } else if self.is_server_error() {
            StatusClass::ServerError
        } else {
            StatusClass::Other
        }
    }
}

impl From<StatusCode> for ResponseStatus {
    fn from(status: StatusCode) -> Self {
        ResponseStatus(i32::from(status.as_u16()))
    }
}

impl From<i32> for ResponseStatus {
    fn from(code: i32) -> Self {
        ResponseStatus(code)
    }
}

/// A fully read HTTP response.
///
/// 4xx and 5xx responses are still responses; the body holds whatever the server
/// sent on the error stream.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: String) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get the response status code
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        self.classification().is_success()
    }

    /// Check if the response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.classification().is_client_error()
    }

    /// Check if the response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.classification().is_server_error()
    }

    /// Client or server error
    pub fn is_error(&self) -> bool {
        self.classification().is_error()
    }

    /// Status classification
    pub fn classification(&self) -> ResponseStatus {
        ResponseStatus::from(self.status)
    }

    /// Get all headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the response and return the body
    pub fn into_body(self) -> String {
        self.body
    }
}

/// A response whose body is still arriving.
///
/// The body is delivered in chunks as the transport reads them. Dropping this value
/// stops reading. Once the request that produced it is closed, reads fail with
/// [`Error::Closed`], even for chunks that had already arrived.
pub struct StreamingResponse {
    status: StatusCode,
    headers: HeaderMap,
    body_receiver: mpsc::Receiver<Result<Bytes>>,
    released: Arc<AtomicBool>,
}

impl StreamingResponse {
    pub(crate) fn new(response: BackendResponse, released: Arc<AtomicBool>) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body_receiver: response.body_receiver,
            released,
        }
    }

    /// Get the response status code
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        self.classification().is_success()
    }

    /// Status classification
    pub fn classification(&self) -> ResponseStatus {
        ResponseStatus::from(self.status)
    }

    /// Get all headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Next body chunk, or `None` once the body is complete
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if self.released.load(Ordering::Acquire) {
            self.body_receiver.close();
            return Err(Error::Closed);
        }
        self.body_receiver.recv().await.transpose()
    }

    /// Consume the response and return the body as bytes
    pub async fn bytes(mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Consume the response and return the body as text
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes).map_err(Error::from)
    }

    /// Read the rest of the body and return a buffered [`Response`]
    pub async fn into_response(mut self) -> Result<Response> {
        let status = self.status;
        let headers = std::mem::take(&mut self.headers);
        let body = self.text().await?;
        Ok(Response::new(status, headers, body))
    }
}
