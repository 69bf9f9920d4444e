//! Cookie storage for the Lumen client.
//!
//! The server keeps its session in an HTTP cookie. This crate owns the local
//! copy of that cookie jar:
//! - [`CookieProbe`]: the read/write/clear surface the session store polls
//! - [`MemoryCookieStore`]: process-local jar (tests, ephemeral runs)
//! - [`FileCookieStore`]: JSON-backed jar that survives restarts
//! - [`CookieJarBridge`]: adapter so `reqwest` reads and writes the same jar

mod file;
mod jar;
mod keys;
mod memory;
mod traits;

pub use file::FileCookieStore;
pub use jar::CookieJarBridge;
pub use keys::{AUTH_COOKIE_NAME, COOKIE_STORE_VERSION};
pub use memory::MemoryCookieStore;
pub use traits::CookieProbe;

use thiserror::Error;
use url::Url;

/// Error type for cookie storage operations.
#[derive(Error, Debug)]
pub enum CookieError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted jar could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Cookie name or value rejected
    #[error("Invalid cookie: {0}")]
    Invalid(String),
}

/// Result type for cookie storage operations.
pub type CookieResult<T> = Result<T, CookieError>;

/// Key under which cookies for `url` are stored.
///
/// Cookies are scoped per origin (scheme, host, port) so that
/// `https://tv.example.com/api/login` and `https://tv.example.com/` share a jar.
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

pub(crate) fn validate_cookie(name: &str, value: &str) -> CookieResult<()> {
    if name.is_empty() {
        return Err(CookieError::Invalid("cookie name is empty".to_string()));
    }
    if name
        .chars()
        .any(|c| c.is_ascii_control() || matches!(c, '=' | ';' | ',' | ' '))
    {
        return Err(CookieError::Invalid(format!("bad cookie name: {name:?}")));
    }
    if value.chars().any(|c| c.is_ascii_control() || c == ';') {
        return Err(CookieError::Invalid(format!("bad value for cookie {name}")));
    }
    Ok(())
}
