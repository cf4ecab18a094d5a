//! HTTP request lifecycle
//!
//! An [`HttpRequest`] collects query parameters, headers and body parameters, then
//! hands the method-specific work to its [`RequestBody`]. Sending always runs the same
//! steps: build the URL, open the connection, let the body pick the method and content
//! headers, push every header, stream the body with its declared length, and read the
//! response.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::header::{HeaderName, HeaderValue};
use url::Url;

use crate::auth::{AUTH_HEADER, Auth};
use crate::backend::types::ProgressCallback;
use crate::backend::{Backend, Connection};
use crate::body::{Progress, RequestBody, RequestSetup};
use crate::content::ContentUri;
use crate::multipart::MultiPart;
use crate::params::{Parameters, RequestParameters, url_encode_parameters};
use crate::response::{Response, StreamingResponse};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Configuring,
    Sent,
    Closed,
}

/// A single-use HTTP request.
///
/// `B` decides the method and the body: [`crate::Get`], [`crate::Delete`],
/// [`crate::WwwForm`] or [`MultiPart`]. Headers are sent in this order: client
/// defaults, `Authorization`, headers added with
/// [`add_request_header`](Self::add_request_header), then headers added by the body.
/// A later header replaces an earlier one with the same name.
pub struct HttpRequest<B: RequestBody> {
    backend: Backend,
    url: String,
    default_headers: Parameters,
    auth_header: Option<String>,
    query_parameters: Parameters,
    request_headers: Parameters,
    request_parameters: Parameters,
    listener: Option<ProgressCallback>,
    body: B,
    connection: Option<Connection>,
    request_body_length: u64,
    state: RequestState,
    released: Arc<AtomicBool>,
}

impl<B: RequestBody> HttpRequest<B> {
    /// Create a request for `url` sent through `backend`
    pub fn new(backend: Backend, url: impl Into<String>, body: B) -> Self {
        Self {
            backend,
            url: url.into(),
            default_headers: Parameters::new(),
            auth_header: None,
            query_parameters: Parameters::new(),
            request_headers: Parameters::new(),
            request_parameters: Parameters::new(),
            listener: None,
            body,
            connection: None,
            request_body_length: 0,
            state: RequestState::Configuring,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn with_default_headers(mut self, headers: Parameters) -> Self {
        self.default_headers = headers;
        self
    }

    /// Authenticate the request
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth_header = Some(auth.to_header_value());
        self
    }

    /// Report upload progress as `(bytes_sent, total_bytes)` per written chunk
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
    }

    /// Add a query parameter
    pub fn add_query_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query_parameters.push(name, value);
    }

    /// Add every pair from `parameters` as query parameters
    pub fn add_all_query_parameters(&mut self, parameters: &impl RequestParameters) {
        self.query_parameters.extend_from(parameters);
    }

    /// Add a request header.
    ///
    /// Names and values that cannot be sent on the wire are rejected here, before any
    /// network activity.
    pub fn add_request_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let (name, value) = (name.into(), value.into());
        validate_header(&name, &value)?;
        self.request_headers.push(name, value);
        Ok(())
    }

    /// Add every pair from `headers` as request headers
    pub fn add_all_request_headers(&mut self, headers: &impl RequestParameters) -> Result<()> {
        for (name, value) in headers.to_pairs() {
            self.add_request_header(name, value)?;
        }
        Ok(())
    }

    /// Add a body parameter
    pub fn add_request_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.request_parameters.push(name, value);
    }

    /// Add every pair from `parameters` as body parameters
    pub fn add_all_request_parameters(&mut self, parameters: &impl RequestParameters) {
        self.request_parameters.extend_from(parameters);
    }

    /// Target URL without the query parameters
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters in insertion order
    pub fn query_parameters(&self) -> &Parameters {
        &self.query_parameters
    }

    /// Headers added with [`add_request_header`](Self::add_request_header)
    pub fn request_headers(&self) -> &Parameters {
        &self.request_headers
    }

    /// Body parameters in insertion order
    pub fn request_parameters(&self) -> &Parameters {
        &self.request_parameters
    }

    /// Declared body length of the last send; 0 for requests without a body
    pub fn request_body_length(&self) -> u64 {
        self.request_body_length
    }

    /// The body strategy
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Mutable access to the body strategy
    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    /// Send the request and read the whole response body.
    ///
    /// The connection is closed afterwards, also when reading fails. A 4xx or 5xx
    /// status is a successful send; check [`Response::is_success`].
    pub async fn send(&mut self) -> Result<Response> {
        let result = match self.connect().await {
            Ok(streaming) => streaming.into_response().await,
            Err(e) => Err(e),
        };
        self.close();

        let response = result?;
        tracing::debug!(url = %self.url, status = response.status(), "request completed");
        Ok(response)
    }

    /// Send the request and return once the response head has arrived.
    ///
    /// The body is read through the returned [`StreamingResponse`]. Call
    /// [`close`](Self::close) when done; the response cannot be read after that.
    pub async fn connect(&mut self) -> Result<StreamingResponse> {
        if self.state != RequestState::Configuring {
            return Err(Error::AlreadySent);
        }
        self.state = RequestState::Sent;

        let url = self.request_url()?;
        let mut connection = self.backend.open_connection(url);

        let mut body_headers = Parameters::new();
        let method = {
            let mut setup = RequestSetup::new(&mut body_headers, &self.request_parameters);
            self.body.setup(&mut setup)?;
            setup.into_method()
        };
        connection.set_request_method(method);

        let auth = self
            .auth_header
            .as_deref()
            .map(|value| (AUTH_HEADER, value));
        let headers = self
            .default_headers
            .iter()
            .chain(auth)
            .chain(self.request_headers.iter())
            .chain(body_headers.iter());
        for (name, value) in headers {
            connection.set_request_property(name, value)?;
        }

        tracing::debug!(
            method = %connection.request_method(),
            url = %connection.url(),
            "connecting"
        );

        if connection.supports_request_body() {
            self.write_body(&mut connection).await?;
        }

        let response = connection.response().await?;
        tracing::debug!(status = %response.status, "received response head");

        self.connection = Some(connection);
        Ok(StreamingResponse::new(response, self.released.clone()))
    }

    /// Release the connection and abort any exchange still in flight.
    ///
    /// A [`StreamingResponse`] returned by [`connect`](Self::connect) stops yielding
    /// body chunks. Safe to call more than once and on a request that never
    /// connected. A closed request cannot be sent.
    pub fn close(&mut self) {
        self.released.store(true, Ordering::Release);
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
        self.state = RequestState::Closed;
    }

    async fn write_body(&mut self, connection: &mut Connection) -> Result<()> {
        let length = self.body.content_length()?;
        self.request_body_length = length;
        connection.set_fixed_length_streaming_mode(length);

        let mut stream = connection.output_stream()?;
        let progress = Progress::new(self.listener.clone(), length);

        let written = match self.body.write_to(&mut stream, &progress).await {
            Ok(()) => stream.finish().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => Ok(()),
            // The transport dropped the pipe; its own error explains why
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                match connection.response().await {
                    Err(transport) => Err(transport),
                    Ok(_) => Err(Error::Io(e)),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "request body failed, aborting exchange");
                connection.disconnect();
                Err(e)
            }
        }
    }

    fn request_url(&self) -> Result<Url> {
        let mut url = self.url.clone();
        if !self.query_parameters.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&url_encode_parameters(&self.query_parameters));
        }
        Ok(Url::parse(&url)?)
    }
}

impl HttpRequest<MultiPart> {
    /// Upload the content behind `uri` as a file part named `field`
    pub fn add_file_upload_content_uri(&mut self, field: impl Into<String>, uri: ContentUri) {
        self.body.add_file_upload(field, uri);
    }
}

impl<B: RequestBody> Drop for HttpRequest<B> {
    fn drop(&mut self) {
        self.close();
    }
}

pub(crate) fn validate_header(name: &str, value: &str) -> Result<()> {
    let valid =
        HeaderName::from_bytes(name.as_bytes()).is_ok() && HeaderValue::from_str(value).is_ok();
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHeader {
            name: name.to_string(),
        })
    }
}
