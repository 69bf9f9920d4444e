//! Well-known cookie names.

/// Name of the server's session cookie.
pub const AUTH_COOKIE_NAME: &str = "auth";

/// Schema version written into the persisted jar.
pub const COOKIE_STORE_VERSION: u32 = 1;
