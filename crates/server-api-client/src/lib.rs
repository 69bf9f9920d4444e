//! HTTP client for the Lumen server's auth endpoints.
//!
//! [`AuthApiClient`] is the stateless surface the session store calls;
//! [`ReqwestAuthApiClient`] implements it over `reqwest`, sharing cookies with
//! a [`cookie_storage::CookieProbe`]. Response bodies come in two historical
//! shapes (`{ok, ...}` and `{success, ...}`) and are normalized here so callers
//! only see [`ApiResult`].

mod client;
mod envelope;
mod error;
mod traits;
mod types;

pub use client::{ReqwestAuthApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ApiError, ApiResult};
pub use traits::AuthApiClient;
pub use types::{
    Credentials, OAuthSettings, RegisterOutcome, RegisterRequest, ServerConfig, StorageMode,
    TokenExchange,
};

use url::Url;

/// Resolve `path` against the server base address.
///
/// The base address may carry a path prefix (`https://host/lumen`); it is
/// kept, while any query or fragment on the base is dropped.
pub fn api_url(endpoint: &Url, path: &str) -> ApiResult<Url> {
    let mut base = endpoint.clone();
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
