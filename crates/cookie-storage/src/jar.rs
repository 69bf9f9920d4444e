//! Bridge between a [`CookieProbe`] and reqwest's cookie handling.
//!
//! Installing [`CookieJarBridge`] as the client's cookie provider makes
//! `Set-Cookie` headers from login or token exchange land in the same store
//! the session check polls, and replays stored cookies on later requests.

use crate::CookieProbe;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// [`reqwest::cookie::CookieStore`] backed by a [`CookieProbe`].
///
/// Attributes other than `Max-Age`/`Expires` expiry are ignored; cookies are
/// scoped by origin only.
pub struct CookieJarBridge {
    probe: Arc<dyn CookieProbe>,
}

impl CookieJarBridge {
    pub fn new(probe: Arc<dyn CookieProbe>) -> Self {
        Self { probe }
    }
}

/// A parsed `Set-Cookie` header.
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    name: String,
    value: String,
    expired: bool,
}

fn parse_set_cookie(header: &str) -> Option<SetCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut max_age = None;
    let mut expires = None;
    for attribute in parts {
        let (key, attr_value) = attribute.split_once('=').unwrap_or((attribute, ""));
        let key = key.trim();
        if key.eq_ignore_ascii_case("max-age") {
            max_age = attr_value.trim().parse::<i64>().ok().or(max_age);
        } else if key.eq_ignore_ascii_case("expires") {
            expires = parse_cookie_date(attr_value.trim()).or(expires);
        }
    }

    // Max-Age wins over Expires when both are present.
    let expired = value.is_empty()
        || match (max_age, expires) {
            (Some(max_age), _) => max_age <= 0,
            (None, Some(expires)) => expires <= Utc::now(),
            (None, None) => false,
        };

    Some(SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        expired,
    })
}

/// `Expires` in RFC 1123 form, or the older `Wed, 21-Oct-2015 07:28:00 GMT`.
fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

impl reqwest::cookie::CookieStore for CookieJarBridge {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            let Some(cookie) = header.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };
            let result = if cookie.expired {
                self.probe.remove(url, &cookie.name).map(|_| ())
            } else {
                self.probe.set(url, &cookie.name, &cookie.value)
            };
            match result {
                Ok(()) => debug!(
                    name = %cookie.name,
                    removed = cookie.expired,
                    "Stored cookie from response"
                ),
                Err(err) => warn!(name = %cookie.name, error = %err, "Failed to store cookie"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let cookies = match self.probe.get(url) {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(error = %err, "Failed to read cookie jar");
                return None;
            }
        };
        if cookies.is_empty() {
            return None;
        }

        let mut pairs: Vec<_> = cookies.into_iter().collect();
        pairs.sort();
        let header = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}
