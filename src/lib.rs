//! Async HTTP request helpers with streamed uploads
//!
//! This crate builds GET, DELETE, URL-encoded form and `multipart/form-data`
//! requests on top of tokio. Request bodies are measured before they are written,
//! so uploads are streamed with a fixed `Content-Length` and report progress per
//! chunk. File uploads are read through a [`ContentResolver`], which maps opaque
//! content URIs to byte streams.
//!
//! ```no_run
//! # async fn run() -> uplink::Result<()> {
//! use uplink::{Auth, Client, ContentUri};
//!
//! let client = Client::builder().base_url("https://api.example.com").build()?;
//!
//! let mut search = client.get("/search");
//! search.add_query_parameter("q", "a b");
//! let response = search.send().await?;
//! println!("{} {}", response.status(), response.body());
//!
//! let mut upload = client.multipart("/photos").with_auth(Auth::token("secret"));
//! upload.add_request_parameter("title", "Sunset");
//! upload.add_file_upload_content_uri("photo", ContentUri::parse("file:///tmp/sunset.jpg")?);
//! upload.set_listener(|sent, total| println!("{sent} of {total}"));
//! upload.send().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The crate also carries a few helpers used around uploads: [`task`] keeps
//! long-running operations apart from the components observing them, [`images`]
//! computes display sizes and [`intents`] describes image pick and capture intents.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub use auth::{Account, Auth, CredentialProvider};
pub use backend::{Backend, BackendConfig};
pub use body::{Delete, Get, Progress, RequestBody, RequestSetup, WwwForm};
pub use client::{Client, ClientBuilder, DEFAULT_USER_AGENT};
pub use content::{ContentResolver, ContentUri, FileContentResolver};
pub use error::{Error, Result};
pub use multipart::MultiPart;
pub use params::{Parameters, RequestParameters};
pub use request::HttpRequest;
pub use response::{Response, ResponseStatus, StatusClass, StreamingResponse};

pub mod auth;
pub mod backend;
pub mod body;
pub mod content;
pub mod files;
pub mod images;
pub mod intents;
pub mod multipart;
pub mod params;
pub mod task;

mod client;
mod error;
mod request;
mod response;
