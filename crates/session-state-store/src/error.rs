//! Session error types.

use server_api_client::ApiError;
use thiserror::Error;

/// Session synchronization error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Server unreachable (connect failure or timeout)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Server answered 401
    #[error("Unauthorized")]
    Unauthorized,

    /// Authorization link missing, unparseable or on an unexpected host
    #[error("Invalid authorization link: {0}")]
    InvalidAuthorizationLink(String),

    /// Provider reported an error in the callback
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Callback carried neither a token nor a code/state pair
    #[error("Callback is missing required parameters")]
    MissingCallbackParameters,

    /// Token or code exchange rejected by the server
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailure(String),

    /// Session cookie did not appear within the verification window
    #[error("Session could not be verified after {attempts} attempts")]
    SessionVerificationTimeout { attempts: u32 },

    /// Server configuration missing or incomplete
    #[error("Server configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    /// Other non-2xx status
    #[error("HTTP {status}")]
    Http { status: u16, message: Option<String> },

    /// Server rejected the request with a reason
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Local cookie store failure
    #[error("Cookie store error: {0}")]
    Cookie(#[from] cookie_storage::CookieError),

    /// Invalid transition in the OAuth phase machine
    #[error("Invalid OAuth state transition: {0}")]
    InvalidStateTransition(String),

    /// OAuth attempt cancelled while in flight
    #[error("Cancelled")]
    Cancelled,

    /// Response or transport failure with no better classification
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SessionError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::NetworkUnavailable => true,
            SessionError::SessionVerificationTimeout { .. } => true,
            SessionError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Text suitable for the notifier.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::NetworkUnavailable => {
                "Network unavailable. Check your connection and try again.".to_string()
            }
            SessionError::Unauthorized => "Please sign in again.".to_string(),
            SessionError::InvalidAuthorizationLink(_) => {
                "The authorization link is invalid. Please try again.".to_string()
            }
            SessionError::AuthorizationDenied(reason) => format!("Authorization failed: {reason}"),
            SessionError::MissingCallbackParameters => {
                "The authorization response was incomplete. Please try again.".to_string()
            }
            SessionError::TokenExchangeFailure(reason) => format!("Sign-in failed: {reason}"),
            SessionError::SessionVerificationTimeout { .. } => {
                "Sign-in could not be confirmed. Please try again.".to_string()
            }
            SessionError::ConfigurationUnavailable(_) => {
                "Could not load the server configuration. Check the server address and your network."
                    .to_string()
            }
            SessionError::Http { status, message } => message
                .clone()
                .unwrap_or_else(|| format!("Server error ({status}). Please try again later.")),
            SessionError::Rejected(reason) => reason.clone(),
            SessionError::Cookie(_) => "Could not access the local session store.".to_string(),
            SessionError::InvalidStateTransition(_) => {
                "Sign-in is in an unexpected state. Please try again.".to_string()
            }
            SessionError::Cancelled => "Sign-in was cancelled.".to_string(),
            SessionError::Unexpected(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SessionError::Unauthorized,
            ApiError::NetworkUnavailable(_) => SessionError::NetworkUnavailable,
            ApiError::Http { status, message } => SessionError::Http { status, message },
            ApiError::Rejected(reason) => SessionError::Rejected(reason),
            other => SessionError::Unexpected(other.to_string()),
        }
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
