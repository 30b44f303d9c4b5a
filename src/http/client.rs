//! API client with retry for reads and error normalization for everything.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryConfig, RetryDecision, RetryOverrides, RetryState};
use super::transport::{ApiRequest, Transport};
use crate::config::ApiConfig;
use crate::error::{ApiError, Cancelled};

/// Options for GET and HEAD requests.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Overrides merged over the client's retry policy.
    pub retry: Option<RetryOverrides>,
    pub cancel: Option<CancellationToken>,
}

impl ReadOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn params(mut self, params: &Map<String, Value>) -> Self {
        self.query.extend(query_pairs(params));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn retry(mut self, overrides: RetryOverrides) -> Self {
        self.retry = Some(overrides);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for POST, PUT, PATCH and DELETE requests. Writes never retry.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cancel: Option<CancellationToken>,
}

impl WriteOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn params(mut self, params: &Map<String, Value>) -> Self {
        self.query.extend(query_pairs(params));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Flattens a JSON object into query pairs.
///
/// Top-level nulls are skipped. Arrays add one pair per element, with null
/// elements sent as `"null"`. Strings are used verbatim and other values use
/// their JSON text.
pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|v| (key.clone(), text(v))));
            }
            other => pairs.push((key.clone(), text(other))),
        }
    }
    pairs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Api,
    Members,
}

/// HTTP client for the admin backend.
///
/// Reads retry with exponential backoff; writes are sent once. Failures
/// come back as [`ApiError`] inside `anyhow::Error`, cancellations as
/// [`Cancelled`].
pub struct ApiClient<T: Transport> {
    transport: Arc<T>,
    config: Arc<ApiConfig>,
    retry: RetryConfig,
    target: Target,
}

impl<T: Transport> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            retry: self.retry.clone(),
            target: self.target,
        }
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, config: ApiConfig, retry: RetryConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
            retry,
            target: Target::Api,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn api_config(&self) -> &ApiConfig {
        &self.config
    }

    /// Default retry policy for reads.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns a copy of this client using `retry` as its default policy.
    pub fn with_retry_config(&self, retry: RetryConfig) -> Self {
        Self {
            retry,
            ..self.clone()
        }
    }

    /// Returns a client bound to the members API.
    pub fn members(&self) -> Result<Self> {
        if self.config.members_api_url.is_none() {
            anyhow::bail!("Members API URL is not configured. Use --members-url or ADMINAPI_MEMBERS_URL.");
        }
        Ok(Self {
            target: Target::Members,
            ..self.clone()
        })
    }

    /// Resolves an endpoint to the absolute URL this client would request.
    pub fn resolve(&self, endpoint: &str) -> Result<String> {
        match self.target {
            Target::Api => Ok(self.config.build_api_url(endpoint)),
            Target::Members => self
                .config
                .build_members_api_url(endpoint)
                .ok_or_else(|| anyhow!("Members API URL is not configured")),
        }
    }

    /// GET with retry. Returns the decoded body untouched.
    #[tracing::instrument(skip(self, options))]
    pub async fn get(&self, endpoint: &str, options: ReadOptions) -> Result<Value> {
        self.read(Method::GET, endpoint, options).await
    }

    /// HEAD with retry.
    #[tracing::instrument(skip(self, options))]
    pub async fn head(&self, endpoint: &str, options: ReadOptions) -> Result<Value> {
        self.read(Method::HEAD, endpoint, options).await
    }

    /// GET with retry, decoding the body into `D`.
    pub async fn get_json<D: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: ReadOptions,
    ) -> Result<D> {
        let body = self.get(endpoint, options).await?;
        serde_json::from_value(body)
            .with_context(|| format!("Failed to parse JSON response from {}", endpoint))
    }

    #[tracing::instrument(skip(self, body, options))]
    pub async fn post(&self, endpoint: &str, body: Value, options: WriteOptions) -> Result<Value> {
        self.write(Method::POST, endpoint, Some(body), options).await
    }

    #[tracing::instrument(skip(self, body, options))]
    pub async fn put(&self, endpoint: &str, body: Value, options: WriteOptions) -> Result<Value> {
        self.write(Method::PUT, endpoint, Some(body), options).await
    }

    #[tracing::instrument(skip(self, body, options))]
    pub async fn patch(&self, endpoint: &str, body: Value, options: WriteOptions) -> Result<Value> {
        self.write(Method::PATCH, endpoint, Some(body), options).await
    }

    #[tracing::instrument(skip(self, options))]
    pub async fn delete(&self, endpoint: &str, options: WriteOptions) -> Result<Value> {
        self.write(Method::DELETE, endpoint, None, options).await
    }

    async fn read(&self, method: Method, endpoint: &str, options: ReadOptions) -> Result<Value> {
        let request = self.request(method, endpoint, options.query, options.headers)?;

        let policy = match &options.retry {
            Some(overrides) => self.retry.merge(overrides),
            None => self.retry.clone(),
        };
        let state = RetryState::new(&request.method, policy);
        self.execute(request, state, options.cancel).await
    }

    async fn write(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: WriteOptions,
    ) -> Result<Value> {
        let mut request = self.request(method, endpoint, options.query, options.headers)?;
        request.body = body;
        self.execute(request, RetryState::once(), options.cancel)
            .await
    }

    fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: Vec<(String, String)>,
        mut headers: Vec<(String, String)>,
    ) -> Result<ApiRequest> {
        let url = self.resolve(endpoint)?;

        if self.target == Target::Members {
            if let Some(token) = &self.config.members_api_token {
                headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }

        Ok(ApiRequest {
            method,
            url,
            query,
            headers,
            body: None,
        })
    }

    /// Runs the attempt/wait loop until success, a final failure, or
    /// cancellation.
    async fn execute(
        &self,
        request: ApiRequest,
        mut state: RetryState,
        cancel: Option<CancellationToken>,
    ) -> Result<Value> {
        let cancel = cancel.unwrap_or_default();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&request)),
                outcome = self.transport.execute(&request) => outcome,
            };

            let failure = match outcome {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };

            match state.on_failure(&failure) {
                RetryDecision::Retry { attempt, delay } => {
                    warn!(
                        "{} {}: attempt {}/{} failed ({}), retrying in {}ms...",
                        request.method,
                        request.url,
                        attempt,
                        state.max_retries(),
                        failure,
                        delay.as_millis()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(self.cancelled(&request)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp(reason) => {
                    debug!(
                        "{} {}: giving up after {} attempt(s), {}: {}",
                        request.method,
                        request.url,
                        state.attempts(),
                        reason,
                        failure
                    );
                    let err = ApiError::new(request.method, &request.url, state.attempts(), failure);
                    return Err(err.into());
                }
            }
        }
    }

    fn cancelled(&self, request: &ApiRequest) -> anyhow::Error {
        debug!("{} {}: cancelled", request.method, request.url);
        anyhow::Error::from(Cancelled {
            method: request.method.clone(),
            url: request.url.clone(),
        })
    }
}
