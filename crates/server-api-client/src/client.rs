//! reqwest-backed [`AuthApiClient`].

use crate::envelope::{classify, Envelope};
use crate::{
    api_url, ApiError, ApiResult, AuthApiClient, Credentials, RegisterOutcome, RegisterRequest,
    ServerConfig, TokenExchange,
};
use async_trait::async_trait;
use cookie_storage::{CookieJarBridge, CookieProbe};
use reqwest::header::LOCATION;
use reqwest::RequestBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Per-request timeout used by [`ReqwestAuthApiClient::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!("lumen/", env!("CARGO_PKG_VERSION"));

/// [`AuthApiClient`] over HTTP.
///
/// Cookies set by the server are written into the given [`CookieProbe`] and
/// replayed on later requests.
#[derive(Clone)]
pub struct ReqwestAuthApiClient {
    http: reqwest::Client,
    /// Same cookie jar, but redirects are surfaced instead of followed so the
    /// authorize endpoint's `Location` can be read.
    no_redirect: reqwest::Client,
}

impl ReqwestAuthApiClient {
    pub fn new(cookies: Arc<dyn CookieProbe>) -> ApiResult<Self> {
        Self::with_timeout(cookies, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(cookies: Arc<dyn CookieProbe>, timeout: Duration) -> ApiResult<Self> {
        let jar = Arc::new(CookieJarBridge::new(cookies));

        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let no_redirect = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { http, no_redirect })
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> ApiResult<Envelope> {
        let response = request.send().await.inspect_err(|err| {
            warn!(operation, error = %err, "Request to server failed");
        })?;
        let status = response.status();
        let body = response.text().await?;
        debug!(operation, status = status.as_u16(), "Server responded");

        classify(status, &body).inspect_err(|err| {
            debug!(operation, error = %err, "Server call unsuccessful");
        })
    }
}

#[async_trait]
impl AuthApiClient for ReqwestAuthApiClient {
    async fn server_config(&self, endpoint: &Url) -> ApiResult<ServerConfig> {
        let url = api_url(endpoint, "api/server-config")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        // The config body has no ok/success flag; only the status is checked.
        if !status.is_success() {
            classify(status, &body)?;
        }
        let config: ServerConfig = serde_json::from_str(&body)?;
        debug!(storage_type = ?config.storage_type, "Fetched server config");
        Ok(config)
    }

    async fn login(&self, endpoint: &Url, credentials: &Credentials) -> ApiResult<()> {
        let url = api_url(endpoint, "api/login")?;
        self.send("login", self.http.post(url).json(credentials))
            .await?;
        Ok(())
    }

    async fn logout(&self, endpoint: &Url) -> ApiResult<()> {
        let url = api_url(endpoint, "api/logout")?;
        self.send("logout", self.http.post(url)).await?;
        Ok(())
    }

    async fn register(
        &self,
        endpoint: &Url,
        request: &RegisterRequest,
    ) -> ApiResult<RegisterOutcome> {
        let url = api_url(endpoint, "api/register")?;
        let envelope = self
            .send("register", self.http.post(url).json(request))
            .await?;
        Ok(RegisterOutcome {
            needs_approval: envelope.needs_approval.unwrap_or(false),
            message: envelope.message(),
        })
    }

    async fn start_oauth(&self, endpoint: &Url, redirect_uri: &str) -> ApiResult<String> {
        let mut url = api_url(endpoint, "api/oauth/authorize")?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri);

        let response = self.no_redirect.get(url.clone()).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| ApiError::Decode("redirect without Location header".to_string()))?;
            let resolved = url.join(location)?;
            debug!(host = ?resolved.host_str(), "Authorization redirect received");
            return Ok(resolved.to_string());
        }

        let body = response.text().await?;
        classify(status, &body)?
            .url
            .ok_or_else(|| ApiError::Decode("authorization response carried no URL".to_string()))
    }

    async fn oauth_callback(
        &self,
        endpoint: &Url,
        code: &str,
        state: &str,
    ) -> ApiResult<TokenExchange> {
        let mut url = api_url(endpoint, "api/oauth/callback")?;
        url.query_pairs_mut()
            .append_pair("code", code)
            .append_pair("state", state);

        let envelope = self.send("oauth_callback", self.http.get(url)).await?;
        Ok(TokenExchange {
            cookie: envelope.cookie,
        })
    }

    async fn exchange_token(&self, endpoint: &Url, token: &str) -> ApiResult<TokenExchange> {
        let mut url = api_url(endpoint, "api/oauth/exchange-token")?;
        url.query_pairs_mut().append_pair("token", token);

        let envelope = self.send("exchange_token", self.http.get(url)).await?;
        Ok(TokenExchange {
            cookie: envelope.cookie,
        })
    }
}
