//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different
//! implementations (reqwest, ureq, a loopback test server) can back
//! the same transport.

use crate::error::{SyncError, SyncResult};
use crate::transport::{AccessToken, SyncTransport};
use rolodex_sync_protocol::{PullResponse, PushRequest, PushResponse};
use serde::de::DeserializeOwned;

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// An OK response with the given body.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP stack. An `Err`
/// means the request never produced a response (DNS, connect, timeout);
/// application failures arrive as non-2xx statuses.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body and a bearer token.
    fn post(&self, url: &str, bearer: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Sends a GET with a bearer token.
    fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Uses JSON encoding for request and response bodies.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn decode<T: DeserializeOwned>(&self, response: HttpResponse) -> SyncResult<T> {
        match response.status {
            200..=299 => serde_json::from_slice(&response.body)
                .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}"))),
            429 | 500..=599 => Err(SyncError::ServerError(format!(
                "status {}",
                response.status
            ))),
            status => Err(SyncError::transport_fatal(format!(
                "unexpected status {status}"
            ))),
        }
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn push(&self, token: &AccessToken, request: &PushRequest) -> SyncResult<PushResponse> {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;
        let url = format!("{}/sync/push", self.base_url);
        let response = self
            .client
            .post(&url, token.as_str(), body)
            .map_err(SyncError::transport_retryable)?;
        self.decode(response)
    }

    fn pull(&self, token: &AccessToken, since: Option<&str>) -> SyncResult<PullResponse> {
        let url = match since {
            Some(watermark) => format!(
                "{}/sync/pull?since={}",
                self.base_url,
                encode_query(watermark)
            ),
            None => format!("{}/sync/pull", self.base_url),
        };
        let response = self
            .client
            .get(&url, token.as_str())
            .map_err(SyncError::transport_retryable)?;
        self.decode(response)
    }
}

/// Percent-encodes the characters an RFC 3339 timestamp can carry
/// that are not safe in a query value.
fn encode_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            ':' => out.push_str("%3A"),
            '+' => out.push_str("%2B"),
            _ => out.push(ch),
        }
    }
    out
}

/// A loopback HTTP client that routes requests directly to a handler.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request and returns the response.
    fn handle(&self, method: &str, path_and_query: &str, body: &[u8]) -> Result<HttpResponse, String>;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for std::sync::Arc<S> {
    fn handle(
        &self,
        method: &str,
        path_and_query: &str,
        body: &[u8],
    ) -> Result<HttpResponse, String> {
        (**self).handle(method, path_and_query, body)
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, _bearer: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        self.server.handle("POST", strip_origin(url), &body)
    }

    fn get(&self, url: &str, _bearer: &str) -> Result<HttpResponse, String> {
        self.server.handle("GET", strip_origin(url), &[])
    }
}

fn strip_origin(url: &str) -> &str {
    url.find("/sync/").map(|i| &url[i..]).unwrap_or(url)
}
