//! Executes `HttpRequest` values over the network.
//!
//! The session only sees the `Transport` trait, so tests can swap in a
//! scripted transport and production code uses ureq. Non-2xx statuses are
//! returned as data, never as `Err`; status interpretation belongs to
//! `ApiClient::parse*`.

use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies headers and the per-request timeout to a builder.
fn prepare<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    builder.config().timeout_global(Some(request.timeout)).build()
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();

        let result = match request.method {
            HttpMethod::Get => prepare(self.agent.get(url), request).call(),
            HttpMethod::Delete => prepare(self.agent.delete(url), request).call(),
            HttpMethod::Post => prepare(self.agent.post(url), request).send(body),
            HttpMethod::Put => prepare(self.agent.put(url), request).send(body),
        };
        let mut response = result.map_err(|e| {
            tracing::warn!(method = %request.method, url = %request.url, error = %e, "transport failed");
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        tracing::debug!(method = %request.method, url = %request.url, status, "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
