//! Client-side errors for backend calls.

use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-2xx response; `message` is the best text the body offered.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl ApiError {
    /// Build a status error from a raw error body.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            message: error_message(status, body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a transport error from `reqwest`.
    pub(crate) fn from_transport(err: reqwest::Error, base_url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout)
        } else if err.is_connect() {
            ApiError::Connection(base_url.to_string())
        } else if err.is_decode() {
            ApiError::ResponseParsing(err.to_string())
        } else {
            ApiError::HttpClient(err.to_string())
        }
    }
}

/// Human-readable text for a failed response.
///
/// Looks for a string `detail` (FastAPI) or `message` field in a JSON body and
/// falls back to `HTTP {status}`.
pub fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "message"].iter().find_map(|key| {
                json.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
