//! Transport seam between the API client and the network.

use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client, Method,
    header::{AUTHORIZATION, HeaderValue},
};
use serde_json::Value;

use crate::error::HttpFailure;

/// Response header carrying the server-side correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// One HTTP attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends a single request. Implementations never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the decoded body on 2xx, otherwise a failure descriptor.
    async fn execute(&self, request: &ApiRequest) -> Result<Value, HttpFailure>;
}

/// [`Transport`] backed by a reqwest [`Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, HttpFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        for (name, value) in &request.headers {
            let mut header_value = HeaderValue::from_str(value)
                .map_err(|e| HttpFailure::local(format!("invalid header {}: {}", name, e)))?;
            if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                header_value.set_sensitive(true);
            }
            builder = builder.header(name.as_str(), header_value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &ApiRequest) -> Result<Value, HttpFailure> {
        debug!("{} {}...", request.method, request.url);

        let response = self.build(request)?.send().await.map_err(|e| {
            if e.is_builder() {
                HttpFailure::local(describe(&e))
            } else {
                HttpFailure::network(describe(&e))
            }
        })?;

        let status = response.status();
        let mut failure = HttpFailure {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            request_id: response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            ..HttpFailure::default()
        };

        // An error status already arrived; a broken body keeps it
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!("{} {}: failed to read body: {}", request.method, request.url, e);
                if status.is_success() {
                    return Err(HttpFailure::network(describe(&e)));
                }
                failure.cause = Some(describe(&e));
                return Err(failure);
            }
        };
        let body = decode_body(&text);

        if status.is_success() {
            return Ok(body.unwrap_or(Value::Null));
        }

        debug!("{} {} returned {}", request.method, request.url, status);
        failure.body = body;
        Err(failure)
    }
}

/// Parses a response body as JSON, keeping non-JSON text as a string.
fn decode_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Flattens a reqwest error and its sources into one line.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
