//! Transports that carry an `HttpRequest` over the wire.
//!
//! # Design
//! `IntercomClient` talks to the network only through `Transport`, so tests
//! and embedders can swap the HTTP stack without touching request building or
//! status classification. Every status code is returned as data; deciding
//! what a 404 or 429 means is the executor's job.

use std::time::Duration;

use crate::error::{IntercomError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP exchange.
///
/// Implementations must be safe to share across threads and must return the
/// response with its body fully read, so the underlying connection is released
/// before `send` returns. Errors are limited to `IntercomError::Transport`.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse>;
}

/// `Transport` backed by a pooled `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // 4xx/5xx are returned as responses, not errors.
        let agent = ureq::Agent::config_builder()
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

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse> {
        let result = match request.method {
            HttpMethod::Get => prepare(self.agent.get(&request.url), &request, timeout).call(),
            HttpMethod::Post => {
                let builder = prepare(self.agent.post(&request.url), &request, timeout);
                match &request.body {
                    Some(body) => builder.send(body.as_slice()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| IntercomError::Transport(e.to_string()))?;
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
            .read_to_vec()
            .map_err(|e| IntercomError::Transport(format!("reading response body: {e}")))?;

        Ok(HttpResponse { status, headers, body })
    }
}

/// Apply the request headers and the per-call timeout.
fn prepare<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    builder.config().timeout_global(timeout).build()
}
