//! OAuth flow through an external browser.
//!
//! `begin_oauth` fetches the provider link and hands it to the browser;
//! the provider later redirects to `<scheme>://oauth/callback`, which the OS
//! delivers back as a deep link to `complete_oauth_callback`. At most one
//! attempt is live at a time; `cancel_oauth` stops it wherever it is.

use crate::deep_link::{callback_redirect_uri, CallbackParams};
use crate::error::{SessionError, SessionResult};
use crate::notifier::Notice;
use crate::oauth_fsm::{OAuthMachineInput, OAuthPhase};
use crate::retry::{CancelHandle, CancelToken, RetryOutcome};
use crate::session::SessionStateStore;
use crate::state::CurrentUser;
use cookie_storage::AUTH_COOKIE_NAME;
use server_api_client::{ApiError, TokenExchange};
use tracing::{debug, info, warn};
use url::Url;

impl SessionStateStore {
    /// Start an OAuth attempt. Returns true while the attempt is live
    /// (browser opened, or link waiting to be copied by hand).
    ///
    /// A call while an attempt is already live reuses it.
    pub async fn begin_oauth(&self) -> bool {
        let _guard = self.op_lock.lock().await;

        let phase = self.oauth_phase();
        if phase.is_active() {
            info!(phase = ?phase, "OAuth attempt already in flight; reusing it");
            return true;
        }

        let handle = CancelHandle::new();
        let token = handle.token();
        let begun = self.update(|inner| {
            let phase = inner.apply(&OAuthMachineInput::Begin, None)?;
            inner.attempt = Some(handle);
            inner.last_callback = None;
            Ok::<_, SessionError>(phase)
        });
        if let Err(err) = begun {
            warn!(error = %err, "Could not start OAuth attempt");
            self.notify_error(&err);
            return false;
        }
        info!("OAuth attempt started");

        match self.request_authorization(&token).await {
            Ok(link) => self.hand_off_link(link, &token).await,
            Err(SessionError::Cancelled) => {
                info!("OAuth attempt cancelled while requesting authorization");
                false
            }
            Err(err) => {
                self.fail_attempt(&OAuthMachineInput::AuthorizationFailed, &token, &err);
                false
            }
        }
    }

    async fn request_authorization(&self, token: &CancelToken) -> SessionResult<Url> {
        let endpoint = self.endpoint().ok_or_else(|| {
            SessionError::ConfigurationUnavailable("no server address".to_string())
        })?;
        let redirect_uri = callback_redirect_uri(&self.settings.deep_link_scheme);

        let link = token
            .run(self.api.start_oauth(&endpoint, &redirect_uri))
            .await
            .ok_or(SessionError::Cancelled)??;

        self.validate_authorization_link(&link)
    }

    /// The link must be an https URL on one of the configured provider hosts.
    pub(crate) fn validate_authorization_link(&self, raw: &str) -> SessionResult<Url> {
        let link = Url::parse(raw.trim())
            .map_err(|err| SessionError::InvalidAuthorizationLink(err.to_string()))?;

        if link.scheme() != "https" {
            return Err(SessionError::InvalidAuthorizationLink(format!(
                "unsupported scheme {}",
                link.scheme()
            )));
        }
        let host = link
            .host_str()
            .ok_or_else(|| SessionError::InvalidAuthorizationLink("missing host".to_string()))?;
        let allowed = self
            .settings
            .identity_provider_hosts
            .iter()
            .any(|expected| expected.eq_ignore_ascii_case(host));
        if !allowed {
            return Err(SessionError::InvalidAuthorizationLink(format!(
                "unexpected host {host}"
            )));
        }
        Ok(link)
    }

    async fn hand_off_link(&self, link: Url, token: &CancelToken) -> bool {
        let link = link.to_string();

        let opened = if self.settings.open_browser && self.browser.can_open() {
            match token.run(self.browser.open(&link)).await {
                None => {
                    info!("OAuth attempt cancelled while opening the browser");
                    return false;
                }
                Some(Ok(())) => true,
                Some(Err(err)) => {
                    warn!(error = %err, "Failed to open browser; falling back to manual link");
                    false
                }
            }
        } else {
            debug!("No external browser available; falling back to manual link");
            false
        };

        let result = if opened {
            self.transition(&OAuthMachineInput::LinkOpened, Some(token))
        } else {
            self.update(|inner| {
                let phase = inner.apply(&OAuthMachineInput::OpenerUnavailable, Some(token))?;
                inner.state.pending_authorization_link = Some(link.clone());
                Ok(phase)
            })
        };

        match result {
            Ok(OAuthPhase::AwaitingCallback) => {
                self.notify(Notice::info("Complete the authorization in your browser."));
                true
            }
            Ok(_) => {
                self.notify(Notice::info(
                    "Could not open a browser. Copy the authorization link to continue.",
                ));
                true
            }
            Err(SessionError::Cancelled) => false,
            Err(err) => {
                warn!(error = %err, "OAuth hand-off failed");
                self.notify_error(&err);
                false
            }
        }
    }

    /// Handle an OAuth callback URL, from a live deep link or a cold launch.
    ///
    /// Returns true only once the session cookie has been confirmed. The same
    /// URL delivered twice returns the first result without re-running the
    /// exchange.
    pub async fn complete_oauth_callback(&self, url: &str) -> bool {
        let _guard = self.op_lock.lock().await;

        let previous = {
            let inner = self.inner.lock();
            inner
                .last_callback
                .clone()
                .map(|(seen, result)| (seen, result, inner.state.is_logged_in))
        };
        if let Some((seen, result, logged_in)) = previous {
            if seen == url {
                // One-time tokens are never replayed; a session lost since
                // then is not reported as confirmed.
                let result = result && logged_in;
                info!(result, "Callback already handled; returning previous result");
                return result;
            }
        }

        let result = self.handle_callback(url).await;
        self.update(|inner| inner.last_callback = Some((url.to_string(), result)));
        result
    }

    async fn handle_callback(&self, url: &str) -> bool {
        let parsed = match Url::parse(url.trim()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "Callback URL could not be parsed");
                self.notify_error(&SessionError::InvalidAuthorizationLink(err.to_string()));
                return false;
            }
        };
        let params = CallbackParams::from_url(&parsed);
        self.update(|inner| inner.state.pending_authorization_link = None);

        let token = self.attempt_token();
        match self.run_callback(&params, &token).await {
            Ok(()) => true,
            Err(SessionError::Cancelled) => {
                info!("OAuth callback handling cancelled");
                false
            }
            Err(err) => {
                let input = failure_input(self.oauth_phase());
                self.fail_attempt(&input, &token, &err);
                false
            }
        }
    }

    /// Token of the live attempt, or of a fresh one for a callback that
    /// arrives with nothing in flight (cold launch).
    fn attempt_token(&self) -> CancelToken {
        self.update(|inner| match &inner.attempt {
            Some(handle) if inner.state.oauth_phase.is_active() => handle.token(),
            _ => {
                let handle = CancelHandle::new();
                let token = handle.token();
                inner.attempt = Some(handle);
                token
            }
        })
    }

    async fn run_callback(&self, params: &CallbackParams, token: &CancelToken) -> SessionResult<()> {
        let endpoint = self.endpoint().ok_or_else(|| {
            SessionError::ConfigurationUnavailable("no server address".to_string())
        })?;

        if let Some(reason) = params.denial_reason() {
            return Err(SessionError::AuthorizationDenied(reason));
        }

        let exchange = if let Some(exchange_token) = params.exchange_token() {
            self.transition(&OAuthMachineInput::CredentialsReceived, Some(token))?;
            info!("Exchanging OAuth token");
            self.exchange(token, self.api.exchange_token(&endpoint, exchange_token))
                .await?
        } else if let Some((code, state)) = params.code_and_state() {
            self.transition(&OAuthMachineInput::CredentialsReceived, Some(token))?;
            info!("Exchanging OAuth code");
            self.exchange(token, self.api.oauth_callback(&endpoint, code, state))
                .await?
        } else {
            if params.is_empty() {
                debug!("Callback URL carried no parameters");
            }
            return Err(SessionError::MissingCallbackParameters);
        };

        if let Some(cookie) = exchange.cookie.as_deref().filter(|cookie| !cookie.is_empty()) {
            if let Err(err) = self.cookies.set(&endpoint, AUTH_COOKIE_NAME, cookie) {
                warn!(error = %err, "Failed to store session cookie from exchange");
            }
        }
        self.transition(&OAuthMachineInput::ExchangeSucceeded, Some(token))?;

        match self
            .poll_auth_cookie(&endpoint, &self.settings.verification, Some(token))
            .await
        {
            RetryOutcome::Succeeded { value, attempts } => {
                let user = CurrentUser::from_auth_cookie(&value);
                self.update(|inner| -> SessionResult<()> {
                    inner.apply(&OAuthMachineInput::SessionConfirmed, Some(token))?;
                    inner.state.set_logged_in(user);
                    inner.state.hide_prompts();
                    Ok(())
                })?;
                info!(attempts, "OAuth session confirmed");
                self.notify(Notice::success("Signed in."));
                Ok(())
            }
            RetryOutcome::Cancelled { .. } => Err(SessionError::Cancelled),
            RetryOutcome::Exhausted { attempts } => {
                self.update(|inner| inner.state.set_logged_out());
                Err(SessionError::SessionVerificationTimeout { attempts })
            }
        }
    }

    async fn exchange(
        &self,
        token: &CancelToken,
        call: impl std::future::Future<Output = Result<TokenExchange, ApiError>>,
    ) -> SessionResult<TokenExchange> {
        match token.run(call).await {
            None => Err(SessionError::Cancelled),
            Some(Ok(exchange)) => Ok(exchange),
            Some(Err(ApiError::NetworkUnavailable(_))) => Err(SessionError::NetworkUnavailable),
            Some(Err(err)) => {
                let reason = err
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                Err(SessionError::TokenExchangeFailure(reason))
            }
        }
    }

    /// Move the live attempt to `Failed` and tell the user why. Does nothing
    /// if the attempt was cancelled meanwhile.
    fn fail_attempt(&self, input: &OAuthMachineInput, token: &CancelToken, err: &SessionError) {
        warn!(error = %err, transient = err.is_transient(), "OAuth attempt failed");
        match self.transition(input, Some(token)) {
            Ok(_) => self.notify_error(err),
            Err(SessionError::Cancelled) => {}
            Err(transition_err) => {
                warn!(error = %transition_err, "Could not record OAuth failure");
                self.notify_error(err);
            }
        }
    }

    /// Cancel the live OAuth attempt. Returns false if none was live.
    ///
    /// Does not wait for the operation lock: an in-flight `begin_oauth` or
    /// `complete_oauth_callback` observes the cancellation and stops.
    pub fn cancel_oauth(&self) -> bool {
        let cancelled = self.update(|inner| {
            if !inner.state.oauth_phase.is_active() {
                return false;
            }
            if let Some(handle) = inner.attempt.take() {
                handle.cancel();
            }
            inner.apply(&OAuthMachineInput::Cancel, None).is_ok()
        });
        if cancelled {
            info!("OAuth attempt cancelled");
        }
        cancelled
    }

    /// Cancel any live attempt and start a new one.
    pub async fn restart_oauth(&self) -> bool {
        self.cancel_oauth();
        self.begin_oauth().await
    }
}

/// FSM input that records a failure in `phase`.
fn failure_input(phase: OAuthPhase) -> OAuthMachineInput {
    match phase {
        OAuthPhase::ExchangingToken => OAuthMachineInput::ExchangeFailed,
        OAuthPhase::VerifyingSession => OAuthMachineInput::VerificationTimedOut,
        OAuthPhase::AuthorizationRequested => OAuthMachineInput::AuthorizationFailed,
        _ => OAuthMachineInput::CallbackRejected,
    }
}
