//! Request and response types for the auth endpoints.

use serde::{Deserialize, Serialize};

/// Storage mode reported by `/api/server-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    /// Server keeps no per-user session; the client auto-logs in without
    /// credentials.
    LocalStorage,
    /// Session lives in a server-issued cookie. Carries the backend name
    /// (e.g. `redis`, `upstash`).
    Cookie(String),
}

/// OAuth settings advertised by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    #[serde(default, alias = "Enabled")]
    pub enabled: bool,
    #[serde(default, alias = "Provider")]
    pub provider: Option<String>,
}

/// Body of `GET /api/server-config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, alias = "StorageType", alias = "storageType")]
    pub storage_type: Option<String>,
    #[serde(default, alias = "SiteName", alias = "siteName")]
    pub site_name: Option<String>,
    #[serde(default, alias = "OAuth", alias = "oauth")]
    pub oauth: Option<OAuthSettings>,
}

impl ServerConfig {
    /// Storage mode, or `None` when the server omitted it.
    pub fn storage_mode(&self) -> Option<StorageMode> {
        let raw = self.storage_type.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.eq_ignore_ascii_case("localstorage") {
            Some(StorageMode::LocalStorage)
        } else {
            Some(StorageMode::Cookie(raw.to_ascii_lowercase()))
        }
    }

    pub fn oauth_enabled(&self) -> bool {
        self.oauth.as_ref().is_some_and(|oauth| oauth.enabled)
    }
}

/// Body of `POST /api/login`. Both fields absent means a credential-less
/// login, used by local-storage servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

/// Body of `POST /api/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// Successful registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// Account exists but an administrator must approve it before login.
    pub needs_approval: bool,
    /// Server-supplied message, if any.
    pub message: Option<String>,
}

/// Successful token or code exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenExchange {
    /// Session cookie value returned in the body, for clients whose cookie
    /// store is not fed by `Set-Cookie`.
    pub cookie: Option<String>,
}
