//! Backend abstraction for the low-level connection layer

pub mod reqwest;
pub mod stream;
pub mod types;

use crate::Result;
use http::Method;
use std::time::Duration;
use types::BackendResponse;
use url::Url;

pub use stream::RequestStream;

/// Configuration for backend creation
#[derive(Clone, Debug, Default)]
pub struct BackendConfig {
    /// Total request timeout
    pub timeout: Option<Duration>,
    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,
}

/// HTTP connection backend implementations
#[derive(Clone)]
pub enum Backend {
    /// Cross-platform implementation using reqwest
    Reqwest(reqwest::ReqwestBackend),
}

impl Backend {
    /// Auto-select best backend for platform
    pub fn default_for_platform() -> Result<Self> {
        Self::with_config(BackendConfig::default())
    }

    /// Create the platform backend with configuration
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        Ok(Backend::Reqwest(reqwest::ReqwestBackend::with_config(config)?))
    }

    /// Open a connection to `url`
    pub fn open_connection(&self, url: Url) -> Connection {
        match self {
            Backend::Reqwest(backend) => Connection::Reqwest(backend.open_connection(url)),
        }
    }
}

/// A connection opened by a [`Backend`].
///
/// Configure the method and headers, optionally declare a fixed body length and write
/// the body, then read the response. Dropping the connection aborts the exchange.
pub enum Connection {
    /// Reqwest exchange
    Reqwest(reqwest::ReqwestConnection),
}

impl Connection {
    /// Target URL
    pub fn url(&self) -> &Url {
        match self {
            Connection::Reqwest(conn) => conn.url(),
        }
    }

    /// Set the request method
    pub fn set_request_method(&mut self, method: Method) {
        match self {
            Connection::Reqwest(conn) => conn.set_request_method(method),
        }
    }

    /// Current request method
    pub fn request_method(&self) -> &Method {
        match self {
            Connection::Reqwest(conn) => conn.request_method(),
        }
    }

    /// Whether the current method carries a request body
    pub fn supports_request_body(&self) -> bool {
        *self.request_method() == Method::POST
    }

    /// Set a request header, replacing any earlier value for the same name
    pub fn set_request_property(&mut self, name: &str, value: &str) -> Result<()> {
        match self {
            Connection::Reqwest(conn) => conn.set_request_property(name, value),
        }
    }

    /// Declare the exact body length
    pub fn set_fixed_length_streaming_mode(&mut self, content_length: u64) {
        match self {
            Connection::Reqwest(conn) => conn.set_fixed_length_streaming_mode(content_length),
        }
    }

    /// Start the exchange and return the body stream
    pub fn output_stream(&mut self) -> Result<RequestStream> {
        match self {
            Connection::Reqwest(conn) => conn.output_stream(),
        }
    }

    /// Wait for the response
    pub async fn response(&mut self) -> Result<BackendResponse> {
        match self {
            Connection::Reqwest(conn) => conn.response().await,
        }
    }

    /// Abort any exchange still in flight and stop reading the response body
    pub fn disconnect(&mut self) {
        match self {
            Connection::Reqwest(conn) => conn.disconnect(),
        }
    }
}
