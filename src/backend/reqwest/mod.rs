//! Reqwest backend for cross-platform HTTP support

use crate::backend::stream::RequestStream;
use crate::backend::types::BackendResponse;
use crate::{Error, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CONTENT_LENGTH, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Capacity of the in-memory pipe between the body writer and the transport
const PIPE_CAPACITY: usize = 16 * 1024;

/// Size of each chunk handed from the pipe to the transport
const READ_CHUNK: usize = 4096;

/// Reqwest backend for cross-platform HTTP
#[derive(Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a new Reqwest backend with configuration
    pub fn with_config(config: crate::backend::BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        // Apply timeout configuration
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create reqwest client: {}", e)))?;

        Ok(Self { client })
    }

    /// Open a connection to `url`; nothing is sent until a body stream or the response
    /// is requested
    pub fn open_connection(&self, url: Url) -> ReqwestConnection {
        ReqwestConnection {
            client: self.client.clone(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            fixed_length: None,
            exchange: None,
            body_pump: None,
        }
    }
}

/// A single request/response exchange over reqwest.
///
/// The body, when there is one, is streamed through an in-memory pipe while the
/// exchange runs on a spawned task, so the declared length is sent before any body
/// byte exists.
pub struct ReqwestConnection {
    client: reqwest::Client,
    url: Url,
    method: Method,
    headers: HeaderMap,
    fixed_length: Option<u64>,
    exchange: Option<JoinHandle<Result<reqwest::Response>>>,
    body_pump: Option<JoinHandle<()>>,
}

impl ReqwestConnection {
    /// Target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Set the request method
    pub fn set_request_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Current request method
    pub fn request_method(&self) -> &Method {
        &self.method
    }

    /// Set a request header, replacing any earlier value for the same name
    pub fn set_request_property(&mut self, name: &str, value: &str) -> Result<()> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            Error::InvalidHeader {
                name: name.to_string(),
            }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader {
            name: name.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Declare the exact body length
    pub fn set_fixed_length_streaming_mode(&mut self, content_length: u64) {
        self.fixed_length = Some(content_length);
    }

    /// Start the exchange and return the stream the body must be written to
    pub fn output_stream(&mut self) -> Result<RequestStream> {
        if self.exchange.is_some() {
            return Err(Error::Internal("Request already started".to_string()));
        }
        let content_length = self.fixed_length.ok_or_else(|| {
            Error::Internal("Fixed length streaming mode was not set".to_string())
        })?;

        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);

        let mut headers = self.headers.clone();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

        let request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
            .body(reqwest::Body::wrap_stream(pipe_chunks(reader)));

        tracing::debug!(method = %self.method, url = %self.url, content_length, "starting upload");
        self.exchange = Some(tokio::spawn(async move {
            request.send().await.map_err(Error::from_reqwest)
        }));

        Ok(RequestStream::new(writer, content_length))
    }

    /// Wait for the response head; the body arrives through the returned receiver
    pub async fn response(&mut self) -> Result<BackendResponse> {
        let exchange = match self.exchange.take() {
            Some(exchange) => exchange,
            None => {
                let request = self
                    .client
                    .request(self.method.clone(), self.url.clone())
                    .headers(self.headers.clone());
                tracing::debug!(method = %self.method, url = %self.url, "sending request");
                tokio::spawn(async move { request.send().await.map_err(Error::from_reqwest) })
            }
        };

        let response = exchange
            .await
            .map_err(|e| Error::Internal(format!("Request task failed: {}", e)))??;

        let status = response.status();
        let headers = response.headers().clone();

        // Create channel for streaming body
        let (tx, rx) = mpsc::channel(32);

        // Stream response body
        self.body_pump = Some(tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        if tx.send(Ok(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(Error::from_reqwest(e))).await;
                        break;
                    }
                }
            }
        }));

        Ok(BackendResponse {
            status,
            headers,
            body_receiver: rx,
        })
    }

    /// Abort any exchange still in flight and stop reading the response body
    pub fn disconnect(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.abort();
        }
        if let Some(body_pump) = self.body_pump.take() {
            body_pump.abort();
        }
    }
}

impl Drop for ReqwestConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Turn the read half of the body pipe into a chunk stream for the transport
fn pipe_chunks(
    reader: DuplexStream,
) -> impl futures_util::Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    futures_util::stream::unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; READ_CHUNK];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), reader))
            }
            Err(e) => Some((Err(e), reader)),
        }
    })
}
