//! In-process HTTP server capturing the requests it receives

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers.get_all(name).iter().count()
    }
}

struct Reply {
    status: StatusCode,
    body: String,
    requests: mpsc::UnboundedSender<CapturedRequest>,
}

pub struct MockServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<CapturedRequest>,
    server: JoinHandle<()>,
}

impl MockServer {
    /// Answer every request with `status` and `body`
    pub async fn start(status: u16, body: &str) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, requests) = mpsc::unbounded_channel();

        let reply = Arc::new(Reply {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            requests: tx,
        });
        let app = Router::new().fallback(capture).with_state(reply);

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockServer {
            addr,
            requests,
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn next_request(&mut self) -> CapturedRequest {
        self.requests.recv().await.unwrap()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn capture(
    State(reply): State<Arc<Reply>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let _ = reply.requests.send(CapturedRequest {
        method: method.to_string(),
        target,
        headers,
        body: body.to_vec(),
    });

    (
        reply.status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        reply.body.clone(),
    )
}
