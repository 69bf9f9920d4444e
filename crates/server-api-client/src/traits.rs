//! Auth API trait definition.

use crate::{ApiResult, Credentials, RegisterOutcome, RegisterRequest, ServerConfig, TokenExchange};
use async_trait::async_trait;
use url::Url;

/// Stateless HTTP operations against the Lumen server.
///
/// `endpoint` is the server base address; each call resolves its own path
/// against it.
#[async_trait]
pub trait AuthApiClient: Send + Sync {
    /// `GET /api/server-config`
    async fn server_config(&self, endpoint: &Url) -> ApiResult<ServerConfig>;

    /// `POST /api/login`
    async fn login(&self, endpoint: &Url, credentials: &Credentials) -> ApiResult<()>;

    /// `POST /api/logout`
    async fn logout(&self, endpoint: &Url) -> ApiResult<()>;

    /// `POST /api/register`
    async fn register(
        &self,
        endpoint: &Url,
        request: &RegisterRequest,
    ) -> ApiResult<RegisterOutcome>;

    /// `GET /api/oauth/authorize`. Returns the identity-provider URL to open.
    ///
    /// `redirect_uri` is the deep link the provider should return to.
    async fn start_oauth(&self, endpoint: &Url, redirect_uri: &str) -> ApiResult<String>;

    /// `GET /api/oauth/callback?code=&state=` (legacy code flow)
    async fn oauth_callback(
        &self,
        endpoint: &Url,
        code: &str,
        state: &str,
    ) -> ApiResult<TokenExchange>;

    /// `GET /api/oauth/exchange-token?token=`
    async fn exchange_token(&self, endpoint: &Url, token: &str) -> ApiResult<TokenExchange>;
}
