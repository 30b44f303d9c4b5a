//! Maps backend error payloads onto [`AppError`].
//!
//! Supported body shapes, tried in this order:
//! - `{ "error": "message", "code"?: ... }`
//! - `{ "error": { "code"?: ..., "message"?: ..., "details"?: ... } }`
//! - `{ "message": "...", "code"?: ..., "details"?: ... }`
//!
//! Anything else falls back to a fixed message per status code.

use chrono::Utc;
use serde_json::Value;
use std::borrow::Cow;

use super::{AppError, HttpFailure};

pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";

const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";
const GENERIC_OBJECT_MESSAGE: &str = "An error occurred";

/// Recognised error body shapes.
#[derive(Debug, PartialEq)]
enum ErrorShape<'a> {
    ErrorString {
        message: &'a str,
        code: Option<String>,
    },
    ErrorObject {
        message: Option<String>,
        code: Option<String>,
        details: Option<&'a Value>,
    },
    Message {
        message: String,
        code: Option<String>,
        details: Option<&'a Value>,
    },
    Unknown,
}

impl<'a> ErrorShape<'a> {
    fn parse(body: Option<&'a Value>) -> Self {
        let Some(Value::Object(body)) = body else {
            return ErrorShape::Unknown;
        };

        match body.get("error") {
            Some(Value::String(message)) if !message.is_empty() => {
                return ErrorShape::ErrorString {
                    message,
                    code: body.get("code").and_then(text),
                };
            }
            Some(error @ (Value::Object(_) | Value::Array(_))) => {
                return ErrorShape::ErrorObject {
                    message: error.get("message").and_then(text),
                    code: error.get("code").and_then(text),
                    details: error.get("details").filter(|d| !d.is_null()),
                };
            }
            _ => {}
        }

        if let Some(message) = body.get("message").and_then(text) {
            return ErrorShape::Message {
                message,
                code: body.get("code").and_then(text),
                details: body.get("details").filter(|d| !d.is_null()),
            };
        }

        ErrorShape::Unknown
    }
}

/// Reads a JSON scalar as text. Empty strings, zero, false and null count
/// as absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Fixed user-facing message for a status code.
pub fn status_message(status: u16) -> Cow<'static, str> {
    let message = match status {
        400 => "Invalid request. Please check your input.",
        401 => "Authentication required. Please log in again.",
        403 => "Access denied. You do not have permission to perform this action.",
        404 => "Resource not found.",
        409 => "Conflict. The resource may have been modified.",
        422 => "Validation error. Please check your input.",
        429 => "Too many requests. Please try again later.",
        500 => "Server error. Please try again later.",
        502 => "Bad gateway. The server is temporarily unavailable.",
        503 => "Service unavailable. Please try again later.",
        504 => "Gateway timeout. The request took too long.",
        other => return Cow::Owned(format!("Error {}. Please try again.", other)),
    };
    Cow::Borrowed(message)
}

/// Builds the normalized record for a failed request. Never fails.
pub fn normalize_error(failure: &HttpFailure) -> AppError {
    let mut app_error = AppError {
        message: "An unknown error occurred".to_string(),
        code: None,
        details: None,
        status: (failure.status != 0).then_some(failure.status),
        status_text: failure.status_text.clone().filter(|s| !s.is_empty()),
        request_id: failure.request_id.clone(),
        timestamp: Utc::now(),
    };

    if failure.is_network() {
        app_error.message = NETWORK_ERROR_MESSAGE.to_string();
        app_error.code = Some(NETWORK_ERROR_CODE.to_string());
        return app_error;
    }

    let status_code = || format!("HTTP_{}", failure.status);

    match ErrorShape::parse(failure.body.as_ref()) {
        ErrorShape::ErrorString { message, code } => {
            app_error.message = message.to_string();
            app_error.code = Some(code.unwrap_or_else(status_code));
        }
        ErrorShape::ErrorObject {
            message,
            code,
            details,
        } => {
            app_error.message = message.unwrap_or_else(|| GENERIC_OBJECT_MESSAGE.to_string());
            app_error.code = Some(code.unwrap_or_else(status_code));
            app_error.details = details.cloned();
        }
        ErrorShape::Message {
            message,
            code,
            details,
        } => {
            app_error.message = message;
            app_error.code = Some(code.unwrap_or_else(status_code));
            app_error.details = details.cloned();
        }
        ErrorShape::Unknown => {
            app_error.message = status_message(failure.status).into_owned();
            app_error.code = Some(status_code());
        }
    }

    app_error
}
