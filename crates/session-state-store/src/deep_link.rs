//! Deep-link classification and dispatch.
//!
//! The OS hands the app URLs in two ways: while running (a deep-link event)
//! and at launch. Both go through [`is_oauth_callback`] and then
//! [`SessionStateStore::complete_oauth_callback`]; launch URLs are deferred
//! so startup can finish first.

use crate::session::SessionStateStore;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// Query keys that mark a URL as an OAuth callback.
pub const CALLBACK_QUERY_KEYS: [&str; 5] = ["code", "state", "success", "token", "error"];

const CALLBACK_HOST: &str = "oauth";
const CALLBACK_PATH: &str = "/callback";

/// Deep link the identity provider redirects back to.
pub fn callback_redirect_uri(scheme: &str) -> String {
    format!("{scheme}://{CALLBACK_HOST}{CALLBACK_PATH}")
}

/// True if `raw` is `<scheme>://oauth/callback` or carries any callback
/// query parameter.
pub fn is_oauth_callback(raw: &str, scheme: &str) -> bool {
    let Ok(url) = Url::parse(raw.trim()) else {
        return false;
    };

    let reserved = url.scheme().eq_ignore_ascii_case(scheme)
        && url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(CALLBACK_HOST))
        && url.path().trim_end_matches('/') == CALLBACK_PATH;

    reserved
        || url
            .query_pairs()
            .any(|(key, _)| CALLBACK_QUERY_KEYS.contains(&key.as_ref()))
}

/// Parameters carried by a callback URL.
///
/// Some providers put them in the fragment; query values take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub success: Option<bool>,
    pub token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        if let Some(fragment) = url.fragment() {
            params.absorb(url::form_urlencoded::parse(fragment.as_bytes()));
        }
        params.absorb(url.query_pairs());
        params
    }

    fn absorb<'a>(&mut self, pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) {
        for (key, value) in pairs {
            let value = value.trim().to_string();
            match key.as_ref() {
                "code" => self.code = Some(value),
                "state" => self.state = Some(value),
                "success" => self.success = parse_flag(&value),
                "token" => self.token = Some(value),
                "error" => self.error = Some(value),
                "error_description" => self.error_description = Some(value),
                _ => {}
            }
        }
    }

    /// Why the provider refused, if it did.
    pub fn denial_reason(&self) -> Option<String> {
        if let Some(error) = self.error.as_deref().filter(|error| !error.is_empty()) {
            return Some(match self.error_description.as_deref() {
                Some(description) if !description.is_empty() => {
                    format!("{error}: {description}")
                }
                _ => error.to_string(),
            });
        }
        (self.success == Some(false)).then(|| "authorization was not completed".to_string())
    }

    /// One-time token to exchange for a session cookie.
    pub fn exchange_token(&self) -> Option<&str> {
        if self.success == Some(false) {
            return None;
        }
        self.token.as_deref().filter(|token| !token.is_empty())
    }

    /// Legacy authorization-code pair.
    pub fn code_and_state(&self) -> Option<(&str, &str)> {
        let code = self.code.as_deref().filter(|code| !code.is_empty())?;
        let state = self.state.as_deref().filter(|state| !state.is_empty())?;
        Some((code, state))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Events delivered by the host platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// App returned to the foreground.
    Foregrounded,
    /// URL delivered while running.
    DeepLink(String),
    /// URL the app was launched with, if any.
    ColdLaunch(Option<String>),
}

/// Routes platform events into the store.
pub struct AppEventDispatcher {
    store: Arc<SessionStateStore>,
    scheme: String,
    cold_launch_delay: Duration,
}

impl AppEventDispatcher {
    pub fn new(store: Arc<SessionStateStore>) -> Self {
        let settings = store.settings();
        let scheme = settings.deep_link_scheme.clone();
        let cold_launch_delay = settings.cold_launch_delay;
        Self {
            store,
            scheme,
            cold_launch_delay,
        }
    }

    /// Handle one event. Returns the callback result when the event carried
    /// an OAuth callback URL.
    pub async fn dispatch(&self, event: AppEvent) -> Option<bool> {
        match event {
            AppEvent::Foregrounded => {
                let endpoint = self.store.endpoint();
                debug!(has_endpoint = endpoint.is_some(), "App foregrounded; checking session");
                self.store
                    .check_session(endpoint.as_ref().map(Url::as_str))
                    .await;
                None
            }
            AppEvent::DeepLink(url) => self.handle_url(&url, "deep_link").await,
            AppEvent::ColdLaunch(None) => None,
            AppEvent::ColdLaunch(Some(url)) => {
                tokio::time::sleep(self.cold_launch_delay).await;
                self.handle_url(&url, "cold_launch").await
            }
        }
    }

    async fn handle_url(&self, url: &str, source: &'static str) -> Option<bool> {
        // Callback URLs carry one-time tokens; never log them.
        if !is_oauth_callback(url, &self.scheme) {
            debug!(source, "Ignoring URL that is not an OAuth callback");
            return None;
        }
        info!(source, "Dispatching OAuth callback");
        Some(self.store.complete_oauth_callback(url).await)
    }

    /// Process events until the sender side is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<AppEvent>) {
        while let Some(event) = events.recv().await {
            if let Some(result) = self.dispatch(event).await {
                debug!(result, "OAuth callback handled");
            }
        }
        debug!("App event stream closed");
    }

    pub fn spawn(self, events: mpsc::Receiver<AppEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri() {
        assert_eq!(callback_redirect_uri("lumen"), "lumen://oauth/callback");
    }

    #[test]
    fn test_classifies_reserved_callback() {
        assert!(is_oauth_callback("lumen://oauth/callback", "lumen"));
        assert!(is_oauth_callback("LUMEN://oauth/callback/", "lumen"));
        assert!(!is_oauth_callback("lumen://player/42", "lumen"));
        assert!(!is_oauth_callback("other://oauth/callback", "lumen"));
        assert!(!is_oauth_callback("not a url", "lumen"));
    }

    #[test]
    fn test_classifies_by_query_key() {
        assert!(is_oauth_callback("https://tv.example.com/?token=abc", "lumen"));
        assert!(is_oauth_callback("lumen://anything?error=access_denied", "lumen"));
        assert!(is_oauth_callback("lumen://x?code=1&state=2", "lumen"));
        assert!(!is_oauth_callback("lumen://x?video=2", "lumen"));
    }

    #[test]
    fn test_params_from_query_and_fragment() {
        let url = Url::parse("lumen://oauth/callback?success=true&token=q#token=f&state=s").unwrap();
        let params = CallbackParams::from_url(&url);
        assert_eq!(params.token.as_deref(), Some("q"));
        assert_eq!(params.state.as_deref(), Some("s"));
        assert_eq!(params.success, Some(true));
        assert_eq!(params.exchange_token(), Some("q"));
    }

    #[test]
    fn test_denial_reason() {
        let url = Url::parse("lumen://oauth/callback?error=access_denied").unwrap();
        assert_eq!(
            CallbackParams::from_url(&url).denial_reason().as_deref(),
            Some("access_denied")
        );

        let url = Url::parse(
            "lumen://oauth/callback?error=access_denied&error_description=user%20declined",
        )
        .unwrap();
        assert_eq!(
            CallbackParams::from_url(&url).denial_reason().as_deref(),
            Some("access_denied: user declined")
        );

        let url = Url::parse("lumen://oauth/callback?success=false&token=t").unwrap();
        let params = CallbackParams::from_url(&url);
        assert!(params.denial_reason().is_some());
        assert!(params.exchange_token().is_none());
    }

    #[test]
    fn test_code_and_state_requires_both() {
        let url = Url::parse("lumen://oauth/callback?code=abc").unwrap();
        assert!(CallbackParams::from_url(&url).code_and_state().is_none());

        let url = Url::parse("lumen://oauth/callback?code=abc&state=xyz").unwrap();
        assert_eq!(
            CallbackParams::from_url(&url).code_and_state(),
            Some(("abc", "xyz"))
        );
    }

    #[test]
    fn test_bare_callback_is_empty() {
        let url = Url::parse("lumen://oauth/callback").unwrap();
        assert!(CallbackParams::from_url(&url).is_empty());
    }
}
