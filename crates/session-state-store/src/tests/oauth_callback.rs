use super::harness::*;
use crate::{NoticeLevel, OAuthPhase, RetryPolicy};
use server_api_client::TokenExchange;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_bare_callback_fails_safely() {
    let h = Harness::new();

    assert!(!h.store.complete_oauth_callback("lumen://oauth/callback").await);

    let state = h.store.snapshot();
    assert!(!state.is_logged_in);
    assert_eq!(state.oauth_phase, OAuthPhase::Failed);
    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 0);
    assert!(h.notifier.any_contains("incomplete"));
}

#[tokio::test]
async fn test_provider_denial() {
    let h = Harness::new();

    let url = "lumen://oauth/callback?error=access_denied";
    assert!(!h.store.complete_oauth_callback(url).await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
    let notice = h.notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("access_denied"));
    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_token_exchange_confirmed_on_second_read() {
    let h = Harness::new();
    *h.api.exchange.lock() = Ok(TokenExchange {
        cookie: Some("abc".into()),
    });
    h.cookies.lag_writes();
    h.cookies.reveal_auth_on_read(2, "abc");

    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    let state = h.store.snapshot();
    assert!(state.is_logged_in);
    assert_eq!(state.oauth_phase, OAuthPhase::Completed);
    assert!(!state.is_login_prompt_visible);
    assert_eq!(h.cookies.reads(), 2);
    assert_eq!(
        h.cookies.writes.lock().clone(),
        vec![("auth".to_string(), "abc".to_string())]
    );
    assert_eq!(h.notifier.last().unwrap().level, NoticeLevel::Success);
}

#[tokio::test]
async fn test_verification_timeout_does_not_log_in() {
    let h = Harness::new();
    h.cookies.lag_writes();

    assert!(!h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    let state = h.store.snapshot();
    assert!(!state.is_logged_in);
    assert_eq!(state.oauth_phase, OAuthPhase::Failed);
    assert_eq!(h.cookies.reads(), 8);
    assert!(h.notifier.any_contains("could not be confirmed"));
}

#[tokio::test]
async fn test_exchange_rejected() {
    let h = Harness::new();
    *h.api.exchange.lock() = Err(MockFailure::Rejected("token expired".into()));

    assert!(!h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
    assert!(!h.store.snapshot().is_logged_in);
    assert!(h.notifier.any_contains("token expired"));
    assert_eq!(h.cookies.reads(), 0);
}

#[tokio::test]
async fn test_exchange_network_failure() {
    let h = Harness::new();
    *h.api.exchange.lock() = Err(MockFailure::Network);

    assert!(!h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
    assert!(h.notifier.any_contains("Network unavailable"));
}

#[tokio::test]
async fn test_legacy_code_flow() {
    let h = Harness::new();

    let url = "lumen://oauth/callback?code=abc&state=xyz";
    assert!(h.store.complete_oauth_callback(url).await);

    assert_eq!(h.api.code_exchange_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 0);
    let state = h.store.snapshot();
    assert!(state.is_logged_in);
    assert_eq!(state.current_user.unwrap().name, "alice");
}

#[tokio::test]
async fn test_callback_completes_live_attempt() {
    let h = Harness::new();
    h.browser.can_open.store(false, Ordering::SeqCst);
    h.store.show_login_prompt();
    assert!(h.store.begin_oauth().await);
    assert!(h.store.snapshot().pending_authorization_link.is_some());

    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::Completed);
    assert!(state.pending_authorization_link.is_none());
    assert!(!state.is_login_prompt_visible);
    assert!(state.is_logged_in);
}

#[tokio::test]
async fn test_duplicate_callback_is_not_replayed() {
    let h = Harness::new();

    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);
    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_new_attempt_resets_duplicate_detection() {
    let h = Harness::new();
    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    assert!(h.store.begin_oauth().await);
    assert!(h.store.complete_oauth_callback(TOKEN_CALLBACK).await);

    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unparsable_callback_leaves_phase() {
    let h = Harness::new();
    h.browser.can_open.store(false, Ordering::SeqCst);
    assert!(h.store.begin_oauth().await);

    assert!(!h.store.complete_oauth_callback("::not a url").await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::AwaitingExternalBrowser);
    assert!(h.notifier.any_contains("authorization link is invalid"));
}

#[tokio::test]
async fn test_cancel_stops_verification() {
    let mut settings = fast_settings();
    settings.verification = RetryPolicy::fixed(50, Duration::from_millis(20));
    let h = Harness::with_settings(settings);
    h.cookies.lag_writes();

    let store = h.store.clone();
    let callback =
        tokio::spawn(async move { store.complete_oauth_callback(TOKEN_CALLBACK).await });
    tokio::time::sleep(Duration::from_millis(70)).await;
    assert_eq!(h.store.oauth_phase(), OAuthPhase::VerifyingSession);

    assert!(h.store.cancel_oauth());
    assert!(!callback.await.unwrap());

    let reads = h.cookies.reads();
    assert!(reads < 50);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.cookies.reads(), reads);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::Idle);
    assert!(!state.is_logged_in);
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_concurrent_callbacks_run_one_at_a_time() {
    let h = Harness::new();
    *h.api.exchange_delay.lock() = Duration::from_millis(30);

    let (first, second) = tokio::join!(
        h.store
            .complete_oauth_callback("lumen://oauth/callback?success=true&token=a"),
        h.store
            .complete_oauth_callback("lumen://oauth/callback?success=true&token=b"),
    );

    assert!(first);
    assert!(second);
    assert_eq!(h.api.exchange_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.api.max_exchanges_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.oauth_phase(), OAuthPhase::Completed);
}
