//! Cookie probe trait definition.

use crate::CookieResult;
use std::collections::HashMap;
use url::Url;

/// Read/write/clear access to the cookies stored for a server origin.
pub trait CookieProbe: Send + Sync {
    /// All cookies stored for the origin of `origin`, name to value.
    fn get(&self, origin: &Url) -> CookieResult<HashMap<String, String>>;

    /// Store one cookie for the origin of `origin`, replacing any previous value.
    fn set(&self, origin: &Url, name: &str, value: &str) -> CookieResult<()>;

    /// Remove one cookie. Returns whether it existed.
    fn remove(&self, origin: &Url, name: &str) -> CookieResult<bool>;

    /// Drop every cookie for every origin.
    fn clear_all(&self) -> CookieResult<()>;

    /// Value of a single cookie, if present.
    fn value(&self, origin: &Url, name: &str) -> CookieResult<Option<String>> {
        Ok(self.get(origin)?.remove(name))
    }

    /// Check if a cookie exists
    fn has(&self, origin: &Url, name: &str) -> CookieResult<bool> {
        Ok(self.value(origin, name)?.is_some())
    }
}
