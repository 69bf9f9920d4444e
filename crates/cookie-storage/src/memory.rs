//! In-memory cookie jar.

use crate::{origin_key, validate_cookie, CookieProbe, CookieResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use url::Url;

type Jar = HashMap<String, HashMap<String, String>>;

/// Process-local cookie jar. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    jar: Mutex<Jar>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieProbe for MemoryCookieStore {
    fn get(&self, origin: &Url) -> CookieResult<HashMap<String, String>> {
        Ok(self
            .jar
            .lock()
            .get(&origin_key(origin))
            .cloned()
            .unwrap_or_default())
    }

    fn set(&self, origin: &Url, name: &str, value: &str) -> CookieResult<()> {
        validate_cookie(name, value)?;
        self.jar
            .lock()
            .entry(origin_key(origin))
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, origin: &Url, name: &str) -> CookieResult<bool> {
        let mut jar = self.jar.lock();
        let key = origin_key(origin);
        let Some(cookies) = jar.get_mut(&key) else {
            return Ok(false);
        };
        let existed = cookies.remove(name).is_some();
        if cookies.is_empty() {
            jar.remove(&key);
        }
        Ok(existed)
    }

    fn clear_all(&self) -> CookieResult<()> {
        self.jar.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AUTH_COOKIE_NAME;

    fn server() -> Url {
        Url::parse("https://tv.example.com/").unwrap()
    }

    #[test]
    fn test_set_get_remove() {
        let store = MemoryCookieStore::new();
        assert!(store.get(&server()).unwrap().is_empty());

        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        assert_eq!(
            store.value(&server(), AUTH_COOKIE_NAME).unwrap().as_deref(),
            Some("abc")
        );
        assert!(store.has(&server(), AUTH_COOKIE_NAME).unwrap());

        assert!(store.remove(&server(), AUTH_COOKIE_NAME).unwrap());
        assert!(!store.remove(&server(), AUTH_COOKIE_NAME).unwrap());
        assert!(!store.has(&server(), AUTH_COOKIE_NAME).unwrap());
    }

    #[test]
    fn test_origins_are_isolated() {
        let store = MemoryCookieStore::new();
        let other = Url::parse("https://other.example.com/").unwrap();

        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        assert!(!store.has(&other, AUTH_COOKIE_NAME).unwrap());
    }

    #[test]
    fn test_clear_all() {
        let store = MemoryCookieStore::new();
        let other = Url::parse("https://other.example.com/").unwrap();
        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        store.set(&other, "theme", "dark").unwrap();

        store.clear_all().unwrap();
        assert!(store.get(&server()).unwrap().is_empty());
        assert!(store.get(&other).unwrap().is_empty());
    }
}
