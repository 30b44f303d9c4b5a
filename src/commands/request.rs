use anyhow::Result;
use log::debug;
use reqwest::Method;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    http::{ApiClient, ReadOptions, RetryOverrides, Transport, WriteOptions},
    runtime::Runtime,
};

/// A raw request assembled from command-line arguments.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Body for POST, PUT and PATCH. Defaults to an empty object.
    pub body: Option<Value>,
    /// Per-request retry overrides; ignored for writes.
    pub retry: RetryOverrides,
    /// Send to the members API instead of the main API.
    pub members: bool,
}

impl RequestSpec {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            retry: RetryOverrides::default(),
            members: false,
        }
    }
}

#[tracing::instrument(
    skip(runtime, api_url, members_url, spec, cancel),
    fields(method = %spec.method, endpoint = %spec.endpoint)
)]
pub async fn request<R: Runtime>(
    runtime: R,
    api_url: Option<String>,
    members_url: Option<String>,
    spec: RequestSpec,
    cancel: CancellationToken,
) -> Result<Value> {
    let config = Config::new(runtime, api_url, members_url)?;
    send(&config.api, spec, cancel).await
}

/// Dispatches `spec` through `client`: reads retry, writes go once.
pub async fn send<T: Transport>(
    client: &ApiClient<T>,
    spec: RequestSpec,
    cancel: CancellationToken,
) -> Result<Value> {
    let client = if spec.members {
        client.members()?
    } else {
        client.clone()
    };

    match spec.method {
        Method::GET | Method::HEAD => {
            let options = ReadOptions {
                query: spec.query,
                headers: spec.headers,
                retry: (!spec.retry.is_empty()).then_some(spec.retry),
                cancel: Some(cancel),
            };
            if spec.method == Method::GET {
                client.get(&spec.endpoint, options).await
            } else {
                client.head(&spec.endpoint, options).await
            }
        }
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
            if !spec.retry.is_empty() {
                debug!("Ignoring retry overrides for {}", spec.method);
            }
            let options = WriteOptions {
                query: spec.query,
                headers: spec.headers,
                cancel: Some(cancel),
            };
            let body = spec.body.unwrap_or_else(|| Value::Object(Map::new()));
            match spec.method {
                Method::POST => client.post(&spec.endpoint, body, options).await,
                Method::PUT => client.put(&spec.endpoint, body, options).await,
                Method::PATCH => client.patch(&spec.endpoint, body, options).await,
                _ => client.delete(&spec.endpoint, options).await,
            }
        }
        other => anyhow::bail!("Unsupported method: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::error::{ApiError, HttpFailure};
    use crate::http::{ApiRequest, MockTransport, RetryConfig};
    use serde_json::json;

    fn client(transport: MockTransport) -> ApiClient<MockTransport> {
        let config = ApiConfig::new("http://host")
            .with_members("http://members", Some("secret-token".into()));
        ApiClient::new(transport, config, RetryConfig::default())
    }

    #[tokio::test]
    async fn test_send_get_with_query_and_headers() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| {
                request.method == Method::GET
                    && request.url == "http://host/api/events"
                    && request.query == vec![("page".to_string(), "2".to_string())]
                    && request.header("x-trace") == Some("t1")
                    && request.body.is_none()
            })
            .times(1)
            .returning(|_| Ok(json!({"data": []})));

        let mut spec = RequestSpec::new(Method::GET, "events");
        spec.query = vec![("page".into(), "2".into())];
        spec.headers = vec![("x-trace".into(), "t1".into())];

        let body = send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, json!({"data": []}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_get_applies_retry_overrides() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(2)
            .returning(|_| Err(HttpFailure::status(503, None)));

        let mut spec = RequestSpec::new(Method::GET, "events");
        spec.retry = RetryOverrides::default().max_retries(1).initial_delay_ms(5);

        let err = send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_err.attempts, 2);
    }

    #[tokio::test]
    async fn test_send_post_defaults_to_empty_object() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| {
                request.method == Method::POST && request.body == Some(json!({}))
            })
            .times(1)
            .returning(|_| Ok(json!({"id": 1})));

        let spec = RequestSpec::new(Method::POST, "events");
        let body = send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn test_send_write_is_not_retried_even_with_overrides() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| request.method == Method::PUT)
            .times(1)
            .returning(|_| Err(HttpFailure::status(503, None)));

        let mut spec = RequestSpec::new(Method::PUT, "events/1");
        spec.body = Some(json!({"name": "x"}));
        spec.retry = RetryOverrides::default().max_retries(5);

        let err = send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<ApiError>().unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_send_delete_and_patch() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| {
                request.method == Method::DELETE && request.url == "http://host/api/events/1"
            })
            .times(1)
            .returning(|_| Ok(Value::Null));
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| {
                request.method == Method::PATCH && request.body == Some(json!({"a": 1}))
            })
            .times(1)
            .returning(|_| Ok(json!({"a": 1})));

        let client = client(transport);
        let deleted = send(
            &client,
            RequestSpec::new(Method::DELETE, "/events/1"),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(deleted, Value::Null);

        let mut patch = RequestSpec::new(Method::PATCH, "events/1");
        patch.body = Some(json!({"a": 1}));
        send(&client, patch, CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_members_target() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request: &ApiRequest| {
                request.url == "http://members/volunteers"
                    && request.header("authorization") == Some("Bearer secret-token")
            })
            .times(1)
            .returning(|_| Ok(json!([])));

        let mut spec = RequestSpec::new(Method::GET, "volunteers");
        spec.members = true;
        send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_unsupported_method() {
        let transport = MockTransport::new();
        let spec = RequestSpec::new(Method::OPTIONS, "events");
        let err = send(&client(transport), spec, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported method: OPTIONS"));
    }
}
