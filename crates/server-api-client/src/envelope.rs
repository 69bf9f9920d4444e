//! Normalization of the server's response bodies.
//!
//! Older endpoints answer `{ok, error}`, newer ones `{success, message}`.
//! Both decode into [`Envelope`].

use crate::{ApiError, ApiResult};
use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "needsApproval", alias = "needs_approval")]
    pub needs_approval: Option<bool>,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default, alias = "authUrl", alias = "authorizationUrl", alias = "auth_url")]
    pub url: Option<String>,
}

impl Envelope {
    pub fn parse(body: &str) -> ApiResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(body)?)
    }

    /// A body with neither flag counts as success; the status already did.
    pub fn succeeded(&self) -> bool {
        self.ok.or(self.success).unwrap_or(true)
    }

    /// Best human-readable explanation in the body.
    pub fn reason(&self) -> Option<String> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    pub fn message(&self) -> Option<String> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    /// Turn a 2xx body reporting failure into [`ApiError::Rejected`].
    pub fn into_result(self) -> ApiResult<Self> {
        if self.succeeded() {
            Ok(self)
        } else {
            let reason = self
                .reason()
                .unwrap_or_else(|| "request rejected".to_string());
            Err(ApiError::Rejected(reason))
        }
    }
}

/// Classify a status/body pair.
pub(crate) fn classify(status: StatusCode, body: &str) -> ApiResult<Envelope> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let message = Envelope::parse(body).ok().and_then(|envelope| envelope.reason());
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }
    Envelope::parse(body)?.into_result()
}
