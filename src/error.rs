//! Error types and transport error mapping

use thiserror::Error;

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for request building, transport and content access
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Header name or value that cannot be sent on the wire
    #[error("Invalid header: {name}")]
    InvalidHeader {
        /// Offending header name
        name: String,
    },

    /// Network error from the connection backend
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// Timeout error
    #[error("Request timed out")]
    Timeout,

    /// The credential provider could not produce a token
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// The request body did not match its declared length
    #[error("Content length mismatch: declared {expected} bytes, wrote {actual}")]
    ContentLengthMismatch {
        /// Declared content length
        expected: u64,
        /// Bytes actually produced
        actual: u64,
    },

    /// The operation is not supported by this request kind
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// `send` or `connect` was invoked on a request that was already sent
    #[error("Request was already sent")]
    AlreadySent,

    /// The response body was read after its request was closed
    #[error("Request was closed")]
    Closed,

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert a reqwest error to our Error type
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else if error.is_builder() {
            Error::InvalidUrl(error.to_string())
        } else {
            Error::Network {
                message: error.to_string(),
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        // Errors raised by our own streams travel through io::Error; unwrap them
        if error.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            let kind = error.kind();
            return match error.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => Error::Io(std::io::Error::new(kind, other)),
                None => Error::Io(kind.into()),
            };
        }
        Error::Io(error)
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::InvalidUrl(error.to_string())
    }
}
