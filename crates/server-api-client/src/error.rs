//! Error types for server API calls.

use thiserror::Error;

/// Error type for server API calls.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 from the server
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-2xx status
    #[error("HTTP {status}{}", message_suffix(.message))]
    Http { status: u16, message: Option<String> },

    /// Connection refused, DNS failure or timeout
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// 2xx response whose body reports failure (`ok:false` / `success:false`)
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Endpoint could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Other transport failure
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl ApiError {
    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::NetworkUnavailable(_) => true,
            ApiError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Server-supplied explanation, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected(message) => Some(message),
            ApiError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ApiError::NetworkUnavailable(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                ApiError::Unauthorized
            } else {
                ApiError::Http {
                    status: status.as_u16(),
                    message: None,
                }
            }
        } else {
            ApiError::Request(err)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
