//! Error records shared by the HTTP layer and its callers.
//!
//! A failed request produces an [`HttpFailure`] (what the transport saw) and
//! an [`AppError`] (what a user should be told). [`ApiError`] carries both.

mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use normalize::{NETWORK_ERROR_CODE, normalize_error, status_message};

/// Normalized error record built once per failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    /// Human-readable message. Never empty.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AppError {
    /// Coarse classification of this error by status code.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::from_status(self.status)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error taxonomy. Which server errors are retried is decided by the
/// retry policy, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No response was received (status 0 or absent).
    Network,
    /// 4xx
    Client,
    /// 5xx
    Server,
    Unknown,
}

impl ErrorClass {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            None | Some(0) => ErrorClass::Network,
            Some(400..=499) => ErrorClass::Client,
            Some(500..=599) => ErrorClass::Server,
            Some(_) => ErrorClass::Unknown,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Network => write!(f, "network"),
            ErrorClass::Client => write!(f, "client"),
            ErrorClass::Server => write!(f, "server"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Raw failure descriptor returned by a transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpFailure {
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub status_text: Option<String>,
    /// Decoded response body, if any.
    pub body: Option<Value>,
    /// Correlation id reported by the server.
    pub request_id: Option<String>,
    /// Transport-level cause for network failures.
    pub cause: Option<String>,
    /// The request was never sent (bad header, malformed URL). Normalizes
    /// like a network failure but is never retried.
    pub local: bool,
}

impl HttpFailure {
    /// A failure where no HTTP response was received.
    pub fn network(cause: impl Into<String>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::default()
        }
    }

    /// A failure raised while building the request, before anything was
    /// sent.
    pub fn local(cause: impl Into<String>) -> Self {
        Self {
            cause: Some(cause.into()),
            local: true,
            ..Self::default()
        }
    }

    /// A failure carrying an HTTP status and optional body.
    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            ..Self::default()
        }
    }

    pub fn is_network(&self) -> bool {
        self.status == 0
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.local {
            return match &self.cause {
                Some(cause) => write!(f, "request not sent: {}", cause),
                None => write!(f, "request not sent"),
            };
        }
        if self.is_network() {
            return match &self.cause {
                Some(cause) => write!(f, "network error: {}", cause),
                None => write!(f, "network error"),
            };
        }
        match &self.status_text {
            Some(text) => write!(f, "HTTP {} {}", self.status, text),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

impl std::error::Error for HttpFailure {}

/// A request that failed for good: the raw failure plus its normalized
/// record.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub method: reqwest::Method,
    pub url: String,
    /// Number of attempts made, including the first.
    pub attempts: u32,
    pub failure: HttpFailure,
    pub app_error: AppError,
}

impl ApiError {
    pub fn new(method: reqwest::Method, url: &str, attempts: u32, failure: HttpFailure) -> Self {
        let app_error = normalize_error(&failure);
        Self {
            method,
            url: url.to_string(),
            attempts,
            failure,
            app_error,
        }
    }

    pub fn app_error(&self) -> &AppError {
        &self.app_error
    }

    pub fn class(&self) -> ErrorClass {
        self.app_error.class()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.method, self.url, self.app_error)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// The caller cancelled the request before it settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub method: reqwest::Method,
    pub url: String,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: request cancelled", self.method, self.url)
    }
}

impl std::error::Error for Cancelled {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_class_from_status() {
        assert_eq!(ErrorClass::from_status(None), ErrorClass::Network);
        assert_eq!(ErrorClass::from_status(Some(0)), ErrorClass::Network);
        assert_eq!(ErrorClass::from_status(Some(404)), ErrorClass::Client);
        assert_eq!(ErrorClass::from_status(Some(503)), ErrorClass::Server);
        assert_eq!(ErrorClass::from_status(Some(302)), ErrorClass::Unknown);
    }

    #[test]
    fn test_http_failure_display() {
        let failure = HttpFailure::network("connection refused");
        assert_eq!(failure.to_string(), "network error: connection refused");

        let failure = HttpFailure::local("invalid header x-bad");
        assert!(failure.is_network());
        assert_eq!(failure.to_string(), "request not sent: invalid header x-bad");

        let mut failure = HttpFailure::status(503, None);
        assert_eq!(failure.to_string(), "HTTP 503");
        failure.status_text = Some("Service Unavailable".into());
        assert_eq!(failure.to_string(), "HTTP 503 Service Unavailable");
    }

    #[test]
    fn test_api_error_attaches_normalized_record() {
        let failure = HttpFailure::status(400, Some(json!({"error": "Bad input"})));
        let err = ApiError::new(reqwest::Method::POST, "http://host/api/events", 1, failure);

        assert_eq!(err.app_error().message, "Bad input");
        assert_eq!(err.class(), ErrorClass::Client);
        assert_eq!(
            err.to_string(),
            "POST http://host/api/events: Bad input [HTTP_400]"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_app_error_serializes_camel_case() {
        let failure = HttpFailure {
            status: 404,
            status_text: Some("Not Found".into()),
            request_id: Some("req-1".into()),
            ..HttpFailure::default()
        };
        let value = serde_json::to_value(normalize_error(&failure)).unwrap();

        assert_eq!(value["statusText"], "Not Found");
        assert_eq!(value["requestId"], "req-1");
        assert_eq!(value["code"], "HTTP_404");
        assert!(value.get("details").is_none());
        assert!(value["timestamp"].is_string());
    }
}
