//! UI-visible session state.

use crate::oauth_fsm::OAuthPhase;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User identity decoded from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Identity-provider account id, for OAuth-linked accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_username: Option<String>,
}

#[derive(Deserialize)]
struct AuthCookiePayload {
    #[serde(default, alias = "name")]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, alias = "linuxdoId", alias = "externalId")]
    external_id: Option<serde_json::Value>,
    #[serde(default, alias = "linuxdoUsername", alias = "externalUsername")]
    external_username: Option<String>,
}

impl CurrentUser {
    /// Decode the auth cookie value: a percent-encoded JSON object.
    ///
    /// Returns `None` when the cookie is opaque or carries no username; the
    /// session still counts as present in that case.
    pub fn from_auth_cookie(raw: &str) -> Option<Self> {
        let mut decoded = raw.trim().trim_matches('"').to_string();
        // Some servers encode twice.
        for _ in 0..2 {
            if decoded.starts_with('{') {
                break;
            }
            decoded = urlencoding::decode(&decoded).ok()?.into_owned();
        }

        let payload: AuthCookiePayload = match serde_json::from_str(&decoded) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "Auth cookie is not a JSON payload");
                return None;
            }
        };

        let name = payload.username.filter(|name| !name.trim().is_empty())?;
        let external_id = payload.external_id.and_then(|value| match value {
            serde_json::Value::String(id) if !id.is_empty() => Some(id),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        });

        Some(Self {
            name,
            role: payload.role,
            external_id,
            external_username: payload.external_username,
        })
    }
}

/// Authoritative login state shown by the UI.
///
/// Login and registration prompt flags are independent of `is_logged_in`;
/// the store decides when to raise them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_logged_in: bool,
    pub is_login_prompt_visible: bool,
    pub is_registration_prompt_visible: bool,
    pub oauth_phase: OAuthPhase,
    /// Authorization URL to copy by hand when no browser could be opened.
    pub pending_authorization_link: Option<String>,
    pub current_user: Option<CurrentUser>,
}

impl SessionState {
    pub(crate) fn set_logged_out(&mut self) {
        self.is_logged_in = false;
        self.current_user = None;
    }

    pub(crate) fn set_logged_in(&mut self, user: Option<CurrentUser>) {
        self.is_logged_in = true;
        self.current_user = user;
    }

    pub(crate) fn hide_prompts(&mut self) {
        self.is_login_prompt_visible = false;
        self.is_registration_prompt_visible = false;
    }

    /// Close the registration prompt and open the login prompt.
    pub(crate) fn switch_to_login_prompt(&mut self) {
        self.is_login_prompt_visible = true;
        self.is_registration_prompt_visible = false;
    }
}
