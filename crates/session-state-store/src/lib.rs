//! Session-state synchronization for the Lumen client.
//!
//! The server keeps the login session in a cookie; the UI needs a plain
//! "logged in or not" answer. This crate reconciles the two:
//! - [`SessionStateStore`]: owns the authoritative [`SessionState`] and every
//!   operation that mutates it (check, login, logout, register, OAuth)
//! - OAuth phase FSM: explicit `rust-fsm` machine for the external-browser flow
//! - [`poll_until`]: bounded, cancellable polling used to wait for the session
//!   cookie to show up in the local store
//! - Deep-link classification and [`AppEventDispatcher`] for OS-delivered URLs

mod browser;
mod deep_link;
mod error;
mod forms;
mod notifier;
mod oauth;
mod oauth_fsm;
mod retry;
mod session;
mod state;

#[cfg(test)]
mod tests;

pub use browser::ExternalBrowserOpener;
pub use deep_link::{
    callback_redirect_uri, is_oauth_callback, AppEvent, AppEventDispatcher, CallbackParams,
    CALLBACK_QUERY_KEYS,
};
pub use error::{SessionError, SessionResult};
pub use forms::{FormError, RegistrationForm, MIN_PASSWORD_LEN};
pub use notifier::{Notice, NoticeLevel, Notifier};
pub use oauth_fsm::oauth_machine;
pub use oauth_fsm::{OAuthMachine, OAuthMachineInput, OAuthMachineState, OAuthPhase};
pub use retry::{poll_until, CancelHandle, CancelToken, RetryOutcome, RetryPolicy};
pub use session::{SessionStateStore, StateCallback, StoreSettings};
pub use state::{CurrentUser, SessionState};
