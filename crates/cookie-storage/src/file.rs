//! JSON-file-backed cookie jar.

use crate::keys::COOKIE_STORE_VERSION;
use crate::{origin_key, validate_cookie, CookieError, CookieProbe, CookieResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedJar {
    version: u32,
    #[serde(default)]
    origins: HashMap<String, HashMap<String, String>>,
}

/// Cookie jar persisted as JSON.
///
/// The file is the source of truth: every read loads it again so cookies
/// written by another process (a cold-launch `lumen handle-link`, say) are
/// seen by a poller here. Mutations reload, edit and rewrite atomically
/// (temp file + rename) under an in-process lock.
#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCookieStore {
    /// Open the jar at `path`, starting empty if the file does not exist.
    ///
    /// A file that cannot be decoded is treated as empty and overwritten on
    /// the next mutation.
    pub fn open(path: impl Into<PathBuf>) -> CookieResult<Self> {
        let path = path.into();
        let jar = load(&path)?;
        debug!(path = %path.display(), origins = jar.origins.len(), "Opened cookie jar");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the jar, apply `edit`, and persist if it reports a change.
    fn modify<T>(&self, edit: impl FnOnce(&mut PersistedJar) -> (T, bool)) -> CookieResult<T> {
        let _guard = self.write_lock.lock();
        let mut jar = load(&self.path)?;
        let (result, changed) = edit(&mut jar);
        if changed {
            jar.version = COOKIE_STORE_VERSION;
            let content = serde_json::to_string_pretty(&jar)?;
            atomic_write(&self.path, &content)?;
        }
        Ok(result)
    }
}

fn load(path: &Path) -> CookieResult<PersistedJar> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<PersistedJar>(&content) {
            Ok(jar) => Ok(jar),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Discarding unreadable cookie jar");
                Ok(PersistedJar::default())
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PersistedJar::default()),
        Err(err) => Err(CookieError::Io(err)),
    }
}

fn atomic_write(path: &Path, content: &str) -> CookieResult<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("cookies.json");
    let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let write_result = (|| -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(CookieError::Io(err));
    }
    Ok(())
}

impl CookieProbe for FileCookieStore {
    fn get(&self, origin: &Url) -> CookieResult<HashMap<String, String>> {
        let mut jar = load(&self.path)?;
        Ok(jar.origins.remove(&origin_key(origin)).unwrap_or_default())
    }

    fn set(&self, origin: &Url, name: &str, value: &str) -> CookieResult<()> {
        validate_cookie(name, value)?;
        self.modify(|jar| {
            jar.origins
                .entry(origin_key(origin))
                .or_default()
                .insert(name.to_string(), value.to_string());
            ((), true)
        })
    }

    fn remove(&self, origin: &Url, name: &str) -> CookieResult<bool> {
        let key = origin_key(origin);
        self.modify(|jar| {
            let existed = match jar.origins.get_mut(&key) {
                Some(cookies) => {
                    let existed = cookies.remove(name).is_some();
                    if cookies.is_empty() {
                        jar.origins.remove(&key);
                    }
                    existed
                }
                None => false,
            };
            (existed, existed)
        })
    }

    fn clear_all(&self) -> CookieResult<()> {
        self.modify(|jar| {
            jar.origins.clear();
            ((), true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AUTH_COOKIE_NAME;
    use tempfile::tempdir;

    fn server() -> Url {
        Url::parse("https://tv.example.com/").unwrap()
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = FileCookieStore::open(dir.path().join("cookies.json")).unwrap();
        assert!(store.get(&server()).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_cookies_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let store = FileCookieStore::open(&path).unwrap();
        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        drop(store);

        let reopened = FileCookieStore::open(&path).unwrap();
        assert_eq!(
            reopened.value(&server(), AUTH_COOKIE_NAME).unwrap().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_clear_all_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let store = FileCookieStore::open(&path).unwrap();
        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        store.clear_all().unwrap();

        let reopened = FileCookieStore::open(&path).unwrap();
        assert!(reopened.get(&server()).unwrap().is_empty());
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let store = FileCookieStore::open(&path).unwrap();
        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        store.set(&server(), "theme", "dark").unwrap();
        assert!(store.remove(&server(), AUTH_COOKIE_NAME).unwrap());

        let reopened = FileCookieStore::open(&path).unwrap();
        let cookies = reopened.get(&server()).unwrap();
        assert!(!cookies.contains_key(AUTH_COOKIE_NAME));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "not json").unwrap();

        let store = FileCookieStore::open(&path).unwrap();
        assert!(store.get(&server()).unwrap().is_empty());

        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"version\": 1"));
    }

    #[test]
    fn test_poller_sees_cookie_written_by_another_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let poller = FileCookieStore::open(&path).unwrap();
        let writer = FileCookieStore::open(&path).unwrap();
        assert!(poller.value(&server(), AUTH_COOKIE_NAME).unwrap().is_none());

        writer.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();

        assert_eq!(
            poller.value(&server(), AUTH_COOKIE_NAME).unwrap().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_mutation_keeps_cookies_written_elsewhere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let first = FileCookieStore::open(&path).unwrap();
        let second = FileCookieStore::open(&path).unwrap();

        second.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();
        first.set(&server(), "theme", "dark").unwrap();
        assert!(!first.remove(&server(), "missing").unwrap());

        let cookies = FileCookieStore::open(&path).unwrap().get(&server()).unwrap();
        assert_eq!(cookies.get(AUTH_COOKIE_NAME).map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[cfg(unix)]
    #[test]
    fn test_jar_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let store = FileCookieStore::open(&path).unwrap();
        store.set(&server(), AUTH_COOKIE_NAME, "abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
