//! Integration tests for the session store.
//!
//! - `harness.rs`         - Mock API client, cookie store, notifier and browser
//! - `check_session.rs`   - Session reconciliation for both storage modes
//! - `logout_register.rs` - Logout, registration and credential login
//! - `oauth_begin.rs`     - Starting, reusing and cancelling OAuth attempts
//! - `oauth_callback.rs`  - Callback handling, token exchange and verification
//! - `dispatcher.rs`      - Foreground, deep-link and cold-launch events

mod oauth_begin;
mod oauth_callback;
