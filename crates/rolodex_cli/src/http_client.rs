//! Blocking reqwest implementation of the engine's HTTP abstraction.

use rolodex_sync_engine::{HttpClient, HttpResponse};
use std::time::Duration;

/// HTTP client backed by `reqwest::blocking`.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn finish(response: reqwest::blocking::Response) -> Result<HttpResponse, String> {
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn post(&self, url: &str, bearer: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| e.to_string())?;
        Self::finish(response)
    }

    fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .send()
            .map_err(|e| e.to_string())?;
        Self::finish(response)
    }
}
