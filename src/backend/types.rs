//! Shared types between backend implementations

use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Platform-agnostic HTTP response head plus a streamed body
pub struct BackendResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Stream of response body bytes
    pub body_receiver: mpsc::Receiver<Result<bytes::Bytes, crate::Error>>,
}

/// Callback type for upload progress reporting.
///
/// Invoked with `(bytes_sent, total_bytes)` where `bytes_sent` is the size of the chunk
/// that was just written and `total_bytes` is the declared body length.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync + 'static>;
