//! HTTP client implementation

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, BackendConfig};
use crate::body::{Delete, Get, RequestBody, WwwForm};
use crate::content::{ContentResolver, FileContentResolver};
use crate::multipart::MultiPart;
use crate::params::Parameters;
use crate::request::{HttpRequest, validate_header};
use crate::Result;

/// User agent sent unless the builder overrides it
pub const DEFAULT_USER_AGENT: &str = "uplink (rust)";

/// HTTP client creating requests that share a backend and default headers
#[derive(Clone)]
pub struct Client {
    backend: Backend,
    base_url: Option<String>,
    default_headers: Parameters,
    resolver: Arc<dyn ContentResolver>,
}

impl Client {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a GET request
    pub fn get(&self, url: &str) -> HttpRequest<Get> {
        self.request(url, Get)
    }

    /// Create a DELETE request
    pub fn delete(&self, url: &str) -> HttpRequest<Delete> {
        self.request(url, Delete)
    }

    /// Create a URL-encoded form POST
    pub fn form(&self, url: &str) -> HttpRequest<WwwForm> {
        self.request(url, WwwForm::default())
    }

    /// Create a multipart POST whose uploads are read through the client's resolver
    pub fn multipart(&self, url: &str) -> HttpRequest<MultiPart> {
        self.request(url, MultiPart::new(self.resolver.clone()))
    }

    /// Create a request with a custom body strategy
    pub fn request<B: RequestBody>(&self, url: &str, body: B) -> HttpRequest<B> {
        HttpRequest::new(self.backend.clone(), self.resolve_url(url), body)
            .with_default_headers(self.default_headers.clone())
    }

    /// Resolver used for multipart uploads
    pub fn content_resolver(&self) -> &Arc<dyn ContentResolver> {
        &self.resolver
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    url.to_string()
                } else {
                    format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
                }
            }
            None => url.to_string(),
        }
    }
}

/// Builder for creating HTTP clients
pub struct ClientBuilder {
    config: BackendConfig,
    user_agent: String,
    headers: Parameters,
    base_url: Option<String>,
    resolver: Option<Arc<dyn ContentResolver>>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            config: BackendConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Parameters::new(),
            base_url: None,
            resolver: None,
        }
    }

    /// Set the base URL for relative request URLs
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set connection establishment timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header sent with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Resolver used to read multipart uploads.
    ///
    /// Defaults to a [`FileContentResolver`] rooted at the system temp directory.
    pub fn content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Client> {
        let mut default_headers = Parameters::new();
        default_headers.push("User-Agent", self.user_agent);
        default_headers.extend_from(&self.headers);

        for (name, value) in default_headers.iter() {
            validate_header(name, value)?;
        }

        let backend = Backend::with_config(self.config)?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(FileContentResolver::new(std::env::temp_dir())));

        Ok(Client {
            backend,
            base_url: self.base_url,
            default_headers,
            resolver,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
