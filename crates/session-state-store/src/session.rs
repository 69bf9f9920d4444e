//! Session state store.
//!
//! [`SessionStateStore`] owns the single [`SessionState`] instance and is the
//! only thing that mutates it. Top-level operations are serialized by an
//! async operation lock; state itself sits behind a short synchronous mutex
//! that is never held across an await.

use crate::browser::ExternalBrowserOpener;
use crate::error::{SessionError, SessionResult};
use crate::forms::RegistrationForm;
use crate::notifier::{Notice, Notifier};
use crate::oauth_fsm::{OAuthMachine, OAuthMachineInput, OAuthPhase};
use crate::retry::{poll_until, CancelHandle, CancelToken, RetryOutcome, RetryPolicy};
use crate::state::{CurrentUser, SessionState};
use client_config_and_utils::Config;
use cookie_storage::{origin_key, CookieProbe, AUTH_COOKIE_NAME};
use parking_lot::Mutex;
use server_api_client::{AuthApiClient, Credentials, ServerConfig, StorageMode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Callback type for session state change notifications.
pub type StateCallback = Box<dyn Fn(SessionState) + Send + Sync>;

const GENERIC_REGISTRATION_FAILURE: &str = "Registration failed. Please try again later.";

/// Tunables for the store, normally derived from [`Config`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// App URL scheme for OAuth deep links.
    pub deep_link_scheme: String,
    /// Hosts an authorization link may point at.
    pub identity_provider_hosts: Vec<String>,
    /// Hand authorization links to the browser opener.
    pub open_browser: bool,
    /// Cookie confirmation during `check_session` and `login`.
    pub cookie_poll: RetryPolicy,
    /// Cookie confirmation after a token exchange.
    pub verification: RetryPolicy,
    /// Waiting for an in-flight server-config load.
    pub config_wait: RetryPolicy,
    /// Deferral before a cold-launch URL is dispatched.
    pub cold_launch_delay: Duration,
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        let timings = &config.session;
        Self {
            deep_link_scheme: config.deep_link_scheme.clone(),
            identity_provider_hosts: config.identity_provider_hosts.clone(),
            open_browser: config.open_browser,
            cookie_poll: RetryPolicy::fixed(
                timings.cookie_poll_attempts,
                timings.cookie_poll_interval(),
            ),
            verification: RetryPolicy::fixed(
                timings.verification_attempts,
                timings.verification_interval(),
            ),
            config_wait: RetryPolicy::fixed(
                timings.config_wait_attempts(),
                timings.config_wait_interval(),
            ),
            cold_launch_delay: timings.cold_launch_delay(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Server config cache, keyed by origin.
#[derive(Default)]
pub(crate) struct ConfigSlot {
    loading: Option<String>,
    cached: Option<(String, ServerConfig)>,
}

impl ConfigSlot {
    fn is_loading(&self, origin: &str) -> bool {
        self.loading.as_deref() == Some(origin)
    }

    fn get(&self, origin: &str) -> Option<ServerConfig> {
        self.cached
            .as_ref()
            .filter(|(cached_origin, _)| cached_origin == origin)
            .map(|(_, config)| config.clone())
    }
}

pub(crate) struct Inner {
    pub(crate) state: SessionState,
    machine: OAuthMachine,
    /// Cancellation for the live OAuth attempt.
    pub(crate) attempt: Option<CancelHandle>,
    pub(crate) endpoint: Option<Url>,
    server_config: ConfigSlot,
    /// Most recent callback URL and its result.
    pub(crate) last_callback: Option<(String, bool)>,
    last_checked: Option<Url>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SessionState::default(),
            machine: OAuthMachine::new(),
            attempt: None,
            endpoint: None,
            server_config: ConfigSlot::default(),
            last_callback: None,
            last_checked: None,
        }
    }

    /// Apply one FSM input and keep the derived state consistent.
    ///
    /// Fails with [`SessionError::Cancelled`] if `attempt` was cancelled, so a
    /// cancelled operation can never move the phase after `cancel_oauth`.
    pub(crate) fn apply(
        &mut self,
        input: &OAuthMachineInput,
        attempt: Option<&CancelToken>,
    ) -> SessionResult<OAuthPhase> {
        if attempt.is_some_and(CancelToken::is_cancelled) {
            return Err(SessionError::Cancelled);
        }

        let from = self.state.oauth_phase;
        self.machine.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in phase {:?}",
                input, from
            ))
        })?;

        let to = OAuthPhase::from(self.machine.state());
        self.state.oauth_phase = to;
        if !to.may_hold_pending_link() {
            self.state.pending_authorization_link = None;
        }
        if !to.is_active() {
            self.attempt = None;
        }

        if from != to {
            debug!(from = ?from, to = ?to, "OAuth phase transition");
        }
        Ok(to)
    }
}

/// Drops the "loading" marker even if the load future is dropped mid-flight.
struct LoadingGuard<'a> {
    inner: &'a Mutex<Inner>,
    origin: String,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.server_config.is_loading(&self.origin) {
            inner.server_config.loading = None;
        }
    }
}

/// Authoritative owner of [`SessionState`].
pub struct SessionStateStore {
    pub(crate) api: Arc<dyn AuthApiClient>,
    pub(crate) cookies: Arc<dyn CookieProbe>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) browser: Arc<dyn ExternalBrowserOpener>,
    pub(crate) settings: StoreSettings,
    pub(crate) inner: Mutex<Inner>,
    /// Serializes top-level operations.
    pub(crate) op_lock: tokio::sync::Mutex<()>,
    /// Bumped after every completed `check_session`.
    check_epoch: AtomicU64,
    state_callback: Mutex<Option<StateCallback>>,
}

impl SessionStateStore {
    pub fn new(
        api: Arc<dyn AuthApiClient>,
        cookies: Arc<dyn CookieProbe>,
        notifier: Arc<dyn Notifier>,
        browser: Arc<dyn ExternalBrowserOpener>,
        settings: StoreSettings,
    ) -> Self {
        Self {
            api,
            cookies,
            notifier,
            browser,
            settings,
            inner: Mutex::new(Inner::new()),
            op_lock: tokio::sync::Mutex::new(()),
            check_epoch: AtomicU64::new(0),
            state_callback: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn oauth_phase(&self) -> OAuthPhase {
        self.inner.lock().state.oauth_phase
    }

    /// Server address remembered from the last `check_session` or
    /// `set_endpoint`.
    pub fn endpoint(&self) -> Option<Url> {
        self.inner.lock().endpoint.clone()
    }

    /// Remember the server address without checking the session.
    pub fn set_endpoint(&self, raw: &str) -> SessionResult<Url> {
        let endpoint = parse_endpoint(Some(raw)).ok_or_else(|| {
            SessionError::ConfigurationUnavailable(format!("invalid server address: {raw}"))
        })?;
        self.inner.lock().endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Cached server config for the remembered endpoint.
    pub fn server_config(&self) -> Option<ServerConfig> {
        let inner = self.inner.lock();
        let origin = origin_key(inner.endpoint.as_ref()?);
        inner.server_config.get(&origin)
    }

    /// Set a callback to be notified of state changes.
    pub fn set_state_callback(&self, callback: StateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    pub fn show_login_prompt(&self) {
        self.update(|inner| inner.state.switch_to_login_prompt());
    }

    pub fn show_registration_prompt(&self) {
        self.update(|inner| {
            inner.state.is_registration_prompt_visible = true;
            inner.state.is_login_prompt_visible = false;
        });
    }

    pub fn hide_prompts(&self) {
        self.update(|inner| inner.state.hide_prompts());
    }

    /// Run `f` under the state lock and notify the callback if the state
    /// changed.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, changed) = {
            let mut inner = self.inner.lock();
            let before = inner.state.clone();
            let result = f(&mut inner);
            let changed = (inner.state != before).then(|| inner.state.clone());
            (result, changed)
        };

        if let Some(state) = changed {
            if let Some(callback) = self.state_callback.lock().as_ref() {
                callback(state);
            }
        }
        result
    }

    pub(crate) fn transition(
        &self,
        input: &OAuthMachineInput,
        attempt: Option<&CancelToken>,
    ) -> SessionResult<OAuthPhase> {
        self.update(|inner| inner.apply(input, attempt))
    }

    pub(crate) fn notify(&self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "Notifying user");
        self.notifier.notify(notice);
    }

    pub(crate) fn notify_error(&self, err: &SessionError) {
        self.notify(Notice::error(err.user_message()));
    }

    /// Reconcile local login state with the server session.
    ///
    /// Never fails: every error is recovered into a definite state (and a
    /// notification where appropriate). A call that arrives while another
    /// check for the same endpoint is running returns once that check is done.
    pub async fn check_session(&self, server_endpoint: Option<&str>) {
        let Some(endpoint) = parse_endpoint(server_endpoint) else {
            debug!("No usable server endpoint; treating session as logged out");
            self.update(|inner| {
                inner.state.set_logged_out();
                inner.state.hide_prompts();
            });
            return;
        };
        self.update(|inner| inner.endpoint = Some(endpoint.clone()));

        let epoch = self.check_epoch.load(Ordering::SeqCst);
        let _guard = self.op_lock.lock().await;

        let just_checked = self.inner.lock().last_checked.as_ref() == Some(&endpoint);
        if just_checked && self.check_epoch.load(Ordering::SeqCst) != epoch {
            debug!("Session check coalesced with the one that just completed");
            return;
        }

        self.reconcile_session(&endpoint).await;

        self.inner.lock().last_checked = Some(endpoint);
        self.check_epoch.fetch_add(1, Ordering::SeqCst);
    }

    async fn reconcile_session(&self, endpoint: &Url) {
        let (config, quiet) = match self.server_config_for_check(endpoint).await {
            Ok(found) => found,
            Err(err) => {
                self.apply_check_error(err, false);
                return;
            }
        };

        let Some(mode) = config.as_ref().and_then(ServerConfig::storage_mode) else {
            if config.is_some() {
                warn!("Server configuration does not report a storage mode");
                if !quiet {
                    self.notify_error(&SessionError::ConfigurationUnavailable(
                        "storage mode missing".to_string(),
                    ));
                }
            } else {
                debug!("No server configuration available; leaving session state unchanged");
            }
            return;
        };

        let cookie = self
            .poll_auth_cookie(endpoint, &self.settings.cookie_poll, None)
            .await
            .into_value();

        match mode {
            StorageMode::Cookie(_) => self.apply_cookie_result(cookie),
            StorageMode::LocalStorage => {
                if cookie.is_some() {
                    self.apply_cookie_result(cookie);
                    return;
                }
                match self.api.login(endpoint, &Credentials::anonymous()).await {
                    Ok(()) => {
                        info!("Local-storage auto-login succeeded");
                        self.update(|inner| {
                            inner.state.set_logged_in(None);
                            inner.state.is_login_prompt_visible = false;
                        });
                    }
                    Err(err) => match SessionError::from(err) {
                        SessionError::NetworkUnavailable => {
                            self.apply_check_error(SessionError::NetworkUnavailable, quiet)
                        }
                        err => {
                            info!(error = %err, "Local-storage auto-login rejected");
                            self.update(|inner| {
                                inner.state.set_logged_out();
                                inner.state.is_login_prompt_visible = true;
                            });
                        }
                    },
                }
            }
        }
    }

    fn apply_cookie_result(&self, cookie: Option<String>) {
        self.update(|inner| match cookie {
            Some(raw) => {
                inner
                    .state
                    .set_logged_in(CurrentUser::from_auth_cookie(&raw));
            }
            None => {
                if inner.state.is_logged_in {
                    info!("Session cookie no longer present; session lost");
                }
                inner.state.set_logged_out();
                inner.state.is_login_prompt_visible = true;
            }
        });
    }

    fn apply_check_error(&self, err: SessionError, quiet: bool) {
        match err {
            SessionError::Unauthorized => {
                info!("Server reports no valid session");
                self.update(|inner| {
                    inner.state.set_logged_out();
                    inner.state.is_login_prompt_visible = true;
                });
            }
            err => {
                warn!(error = %err, "Session check failed");
                self.update(|inner| inner.state.set_logged_out());
                if !quiet {
                    self.notify_error(&err);
                }
            }
        }
    }

    /// Server config for a session check, plus whether notifications should
    /// be suppressed because a concurrent load did not finish in time.
    async fn server_config_for_check(
        &self,
        endpoint: &Url,
    ) -> SessionResult<(Option<ServerConfig>, bool)> {
        let origin = origin_key(endpoint);

        if self.inner.lock().server_config.is_loading(&origin) {
            let outcome = poll_until(&self.settings.config_wait, None, |_| {
                let loading = self.inner.lock().server_config.is_loading(&origin);
                std::future::ready((!loading).then_some(()))
            })
            .await;

            if let RetryOutcome::Exhausted { attempts } = outcome {
                warn!(attempts, "Server config still loading; continuing without waiting");
                let cached = self.inner.lock().server_config.get(&origin);
                return Ok((cached, true));
            }
        }

        if let Some(config) = self.inner.lock().server_config.get(&origin) {
            return Ok((Some(config), false));
        }

        let config = self.load_server_config(endpoint).await?;
        Ok((Some(config), false))
    }

    /// Fetch and cache `/api/server-config` for `endpoint`.
    ///
    /// While this runs, `check_session` for the same origin waits for it
    /// instead of issuing its own request.
    pub async fn load_server_config(&self, endpoint: &Url) -> SessionResult<ServerConfig> {
        let origin = origin_key(endpoint);
        self.inner.lock().server_config.loading = Some(origin.clone());
        let _loading = LoadingGuard {
            inner: &self.inner,
            origin: origin.clone(),
        };

        match self.api.server_config(endpoint).await {
            Ok(config) => {
                debug!(
                    storage_type = ?config.storage_type,
                    oauth_enabled = config.oauth_enabled(),
                    "Server config loaded"
                );
                self.inner.lock().server_config.cached = Some((origin, config.clone()));
                Ok(config)
            }
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "Failed to load server config");
                Err(match SessionError::from(err) {
                    SessionError::Unauthorized => SessionError::Unauthorized,
                    SessionError::NetworkUnavailable => SessionError::NetworkUnavailable,
                    other => SessionError::ConfigurationUnavailable(other.to_string()),
                })
            }
        }
    }

    pub(crate) async fn poll_auth_cookie(
        &self,
        endpoint: &Url,
        policy: &RetryPolicy,
        cancel: Option<&CancelToken>,
    ) -> RetryOutcome<String> {
        debug!(
            attempts = policy.max_attempts,
            max_wait_ms = policy.max_wait().as_millis() as u64,
            "Polling for auth cookie"
        );
        let outcome = poll_until(policy, cancel, |attempt| {
            let cookie = self.read_auth_cookie(endpoint);
            if cookie.is_none() {
                debug!(attempt, "Auth cookie not present yet");
            }
            std::future::ready(cookie)
        })
        .await;

        debug!(
            attempts = outcome.attempts(),
            found = matches!(outcome, RetryOutcome::Succeeded { .. }),
            "Auth cookie poll finished"
        );
        outcome
    }

    fn read_auth_cookie(&self, endpoint: &Url) -> Option<String> {
        match self.cookies.value(endpoint, AUTH_COOKIE_NAME) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(err) => {
                warn!(error = %err, "Failed to read cookie store");
                None
            }
        }
    }

    /// Log out on the server and locally. Always ends logged out.
    pub async fn logout(&self) {
        self.cancel_oauth();
        let _guard = self.op_lock.lock().await;

        if let Some(endpoint) = self.endpoint() {
            if let Err(err) = self.api.logout(&endpoint).await {
                warn!(error = %err, "Server logout failed; clearing local session anyway");
            }
        }
        if let Err(err) = self.cookies.clear_all() {
            warn!(error = %err, "Failed to clear cookie store");
        }

        self.update(|inner| {
            inner.state.set_logged_out();
            inner.state.switch_to_login_prompt();
            inner.last_callback = None;
        });
        info!("Logged out");
        self.notify(Notice::info("Signed out."));
    }

    /// Submit a registration. Returns whether the account was created
    /// (including accounts awaiting approval).
    ///
    /// Field validation belongs to the caller; see [`RegistrationForm::validate`].
    pub async fn register(&self, username: &str, password: &str, confirm_password: &str) -> bool {
        let form = RegistrationForm::new(username, password, confirm_password);
        let _guard = self.op_lock.lock().await;

        let Some(endpoint) = self.endpoint() else {
            warn!("Registration attempted without a server address");
            self.notify(Notice::error(GENERIC_REGISTRATION_FAILURE));
            return false;
        };

        match self.api.register(&endpoint, &form.to_request()).await {
            Ok(outcome) => {
                info!(needs_approval = outcome.needs_approval, "Registration accepted");
                let notice = if outcome.needs_approval {
                    Notice::info(outcome.message.unwrap_or_else(|| {
                        "Registration submitted. An administrator must approve the account before you can sign in."
                            .to_string()
                    }))
                } else {
                    Notice::success(
                        outcome
                            .message
                            .unwrap_or_else(|| "Registration successful. Please sign in.".to_string()),
                    )
                };
                self.update(|inner| inner.state.switch_to_login_prompt());
                self.notify(notice);
                true
            }
            Err(err) => {
                let err = SessionError::from(err);
                warn!(error = %err, "Registration failed");
                let message = match &err {
                    SessionError::Rejected(reason) => reason.clone(),
                    SessionError::Http {
                        message: Some(reason),
                        ..
                    } => reason.clone(),
                    _ => GENERIC_REGISTRATION_FAILURE.to_string(),
                };
                self.notify(Notice::error(message));
                false
            }
        }
    }

    /// Username/password login. In cookie mode success requires the session
    /// cookie to show up within the cookie-poll window.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let _guard = self.op_lock.lock().await;

        let Some(endpoint) = self.endpoint() else {
            self.notify_error(&SessionError::ConfigurationUnavailable(
                "no server address".to_string(),
            ));
            return false;
        };

        let cached = self.inner.lock().server_config.get(&origin_key(&endpoint));
        let mode = match cached {
            Some(config) => config.storage_mode(),
            None => self
                .load_server_config(&endpoint)
                .await
                .ok()
                .and_then(|config| config.storage_mode()),
        };

        let credentials = Credentials::password(username.trim(), password);
        if let Err(err) = self.api.login(&endpoint, &credentials).await {
            match SessionError::from(err) {
                SessionError::Unauthorized => {
                    info!("Login rejected: invalid credentials");
                    self.notify(Notice::error("Invalid username or password."));
                }
                err => {
                    warn!(error = %err, "Login failed");
                    self.notify_error(&err);
                }
            }
            return false;
        }

        let user = if mode == Some(StorageMode::LocalStorage) {
            None
        } else {
            match self
                .poll_auth_cookie(&endpoint, &self.settings.cookie_poll, None)
                .await
            {
                RetryOutcome::Succeeded { value, .. } => CurrentUser::from_auth_cookie(&value),
                outcome => {
                    let err = SessionError::SessionVerificationTimeout {
                        attempts: outcome.attempts(),
                    };
                    warn!(error = %err, "Login accepted but no session cookie arrived");
                    self.notify_error(&err);
                    return false;
                }
            }
        };

        self.update(|inner| {
            inner.state.set_logged_in(user);
            inner.state.hide_prompts();
        });
        info!("Logged in");
        self.notify(Notice::success("Signed in."));
        true
    }
}

/// Parse a server base address. Only http(s) addresses are usable.
fn parse_endpoint(raw: Option<&str>) -> Option<Url> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Some(url)
        }
        Ok(_) => {
            warn!("Server endpoint is not an http(s) address");
            None
        }
        Err(err) => {
            warn!(error = %err, "Server endpoint is not a valid URL");
            None
        }
    }
}
