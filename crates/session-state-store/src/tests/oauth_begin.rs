use super::harness::*;
use crate::{NoticeLevel, OAuthPhase};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_begin_opens_browser() {
    let h = Harness::new();

    assert!(h.store.begin_oauth().await);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::AwaitingCallback);
    assert!(state.pending_authorization_link.is_none());
    assert_eq!(h.browser.opened.lock().clone(), vec![PROVIDER_LINK.to_string()]);
    assert_eq!(
        h.api.last_redirect_uri.lock().as_deref(),
        Some("lumen://oauth/callback")
    );
    let notice = h.notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert!(notice.message.contains("browser"));
}

#[tokio::test]
async fn test_begin_reuses_live_attempt() {
    let h = Harness::new();

    assert!(h.store.begin_oauth().await);
    assert!(h.store.begin_oauth().await);

    assert_eq!(h.api.start_oauth_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.browser.opened.lock().len(), 1);
    assert_eq!(h.store.oauth_phase(), OAuthPhase::AwaitingCallback);
}

#[tokio::test]
async fn test_concurrent_begins_fetch_one_link() {
    let h = Harness::new();
    *h.api.start_oauth_delay.lock() = Duration::from_millis(30);

    let (first, second) = tokio::join!(h.store.begin_oauth(), h.store.begin_oauth());

    assert!(first);
    assert!(second);
    assert_eq!(h.api.start_oauth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_opener_keeps_link_for_manual_copy() {
    let h = Harness::new();
    h.browser.can_open.store(false, Ordering::SeqCst);

    assert!(h.store.begin_oauth().await);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::AwaitingExternalBrowser);
    assert_eq!(state.pending_authorization_link.as_deref(), Some(PROVIDER_LINK));
    assert!(h.browser.opened.lock().is_empty());
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_open_failure_falls_back_to_manual_link() {
    let h = Harness::new();
    h.browser.fail_open.store(true, Ordering::SeqCst);

    assert!(h.store.begin_oauth().await);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::AwaitingExternalBrowser);
    assert_eq!(state.pending_authorization_link.as_deref(), Some(PROVIDER_LINK));
}

#[tokio::test]
async fn test_browser_disabled_in_settings() {
    let mut settings = fast_settings();
    settings.open_browser = false;
    let h = Harness::with_settings(settings);

    assert!(h.store.begin_oauth().await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::AwaitingExternalBrowser);
    assert!(h.browser.opened.lock().is_empty());
}

#[tokio::test]
async fn test_link_on_unexpected_host_fails() {
    let h = Harness::new();
    *h.api.start_oauth.lock() = Ok("https://evil.example.com/oauth2/authorize".into());

    assert!(!h.store.begin_oauth().await);

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::Failed);
    assert!(state.pending_authorization_link.is_none());
    assert!(h.browser.opened.lock().is_empty());
    assert!(h.notifier.any_contains("authorization link is invalid"));
}

#[tokio::test]
async fn test_link_must_be_https() {
    let h = Harness::new();
    *h.api.start_oauth.lock() = Ok("http://connect.linux.do/oauth2/authorize".into());

    assert!(!h.store.begin_oauth().await);
    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
}

#[tokio::test]
async fn test_provider_host_matches_case_insensitively() {
    let h = Harness::new();
    *h.api.start_oauth.lock() = Ok("https://CONNECT.linux.do/oauth2/authorize".into());

    assert!(h.store.begin_oauth().await);
    assert_eq!(h.store.oauth_phase(), OAuthPhase::AwaitingCallback);
}

#[tokio::test]
async fn test_link_fetch_failure() {
    let h = Harness::new();
    *h.api.start_oauth.lock() = Err(MockFailure::Network);

    assert!(!h.store.begin_oauth().await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
    assert!(h.notifier.any_contains("Network unavailable"));
}

#[tokio::test]
async fn test_begin_without_endpoint_fails() {
    let h = Harness::without_endpoint(fast_settings());

    assert!(!h.store.begin_oauth().await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::Failed);
    assert_eq!(h.api.start_oauth_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_begin_after_failure_starts_fresh() {
    let h = Harness::new();
    *h.api.start_oauth.lock() = Err(MockFailure::Network);
    assert!(!h.store.begin_oauth().await);

    *h.api.start_oauth.lock() = Ok(PROVIDER_LINK.to_string());
    assert!(h.store.begin_oauth().await);

    assert_eq!(h.store.oauth_phase(), OAuthPhase::AwaitingCallback);
    assert_eq!(h.api.start_oauth_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancel_during_link_fetch() {
    let h = Harness::new();
    *h.api.start_oauth_delay.lock() = Duration::from_millis(200);

    let store = h.store.clone();
    let begin = tokio::spawn(async move { store.begin_oauth().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.store.oauth_phase(), OAuthPhase::AuthorizationRequested);

    assert!(h.store.cancel_oauth());

    assert!(!begin.await.unwrap());
    assert_eq!(h.store.oauth_phase(), OAuthPhase::Idle);
    assert!(h.browser.opened.lock().is_empty());
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_cancel_clears_pending_link() {
    let h = Harness::new();
    h.browser.can_open.store(false, Ordering::SeqCst);
    assert!(h.store.begin_oauth().await);

    assert!(h.store.cancel_oauth());

    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::Idle);
    assert!(state.pending_authorization_link.is_none());
}

#[tokio::test]
async fn test_cancel_without_attempt() {
    let h = Harness::new();
    assert!(!h.store.cancel_oauth());
    assert_eq!(h.store.oauth_phase(), OAuthPhase::Idle);
}

#[tokio::test]
async fn test_restart_fetches_new_link() {
    let h = Harness::new();
    h.browser.can_open.store(false, Ordering::SeqCst);
    assert!(h.store.begin_oauth().await);

    h.browser.can_open.store(true, Ordering::SeqCst);
    assert!(h.store.restart_oauth().await);

    assert_eq!(h.api.start_oauth_calls.load(Ordering::SeqCst), 2);
    let state = h.store.snapshot();
    assert_eq!(state.oauth_phase, OAuthPhase::AwaitingCallback);
    assert!(state.pending_authorization_link.is_none());
}
