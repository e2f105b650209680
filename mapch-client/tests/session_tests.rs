use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use mapch_client::domains::auth::{
    IdentityErrorCode, ProviderEvent, SessionGuard, SessionStatus,
    SessionStore,
};
use mapch_client::infra::events::{EventBus, LifecycleEvent};
use mapch_client::infra::testing::stubs::{
    ScriptedTransport, StubIdentityProvider,
};
use mapch_model::{AccountId, Principal};

mod support;
use support::{client, drain};

fn member() -> Principal {
    Principal::new(AccountId::new("uid-42"), Some("member@map-ch.test".into()))
}

async fn signed_out(store: &SessionStore) {
    let mut rx = store.subscribe();
    timeout(
        Duration::from_secs(1),
        rx.wait_for(|status| !status.is_authenticated()),
    )
    .await
    .expect("session invalidated in time")
    .expect("store alive");
}

fn start(provider: &StubIdentityProvider, bus: &EventBus) -> SessionStore {
    let store = SessionStore::new();
    SessionGuard::new(Arc::new(provider.clone()), store.clone())
        .spawn(bus.subscribe_lifecycle());
    store
}

#[tokio::test]
async fn disabled_account_on_token_refresh_signs_out() {
    let provider = StubIdentityProvider::new().with_account(member());
    let bus = EventBus::default();
    let store = start(&provider, &bus);
    drain().await;
    assert_eq!(store.current(), SessionStatus::Authenticated(member()));

    provider.fail_token(IdentityErrorCode::UserDisabled);
    provider.emit(ProviderEvent::TokenChanged);

    signed_out(&store).await;
    assert_eq!(provider.calls().sign_out, 1);
}

#[tokio::test]
async fn deleted_account_is_noticed_on_foreground() {
    let provider = StubIdentityProvider::new().with_account(member());
    let bus = EventBus::default();
    let store = start(&provider, &bus);
    drain().await;
    assert!(store.is_authenticated());

    provider.fail_reload(IdentityErrorCode::UserNotFound);
    bus.publish_lifecycle(LifecycleEvent::Background);
    drain().await;
    assert!(store.is_authenticated());

    bus.publish_lifecycle(LifecycleEvent::Foreground);
    signed_out(&store).await;
    assert_eq!(provider.calls().sign_out, 1);
}

#[tokio::test]
async fn network_errors_keep_the_session() {
    let provider = StubIdentityProvider::new().with_account(member());
    let bus = EventBus::default();
    let store = start(&provider, &bus);
    drain().await;

    provider.fail_reload(IdentityErrorCode::NetworkError);
    bus.publish_lifecycle(LifecycleEvent::Foreground);
    drain().await;

    assert!(store.is_authenticated());
    assert_eq!(provider.calls().sign_out, 0);
}

#[tokio::test]
async fn auth_state_changes_mirror_the_provider() {
    let provider = StubIdentityProvider::new();
    let bus = EventBus::default();
    let store = start(&provider, &bus);
    drain().await;
    assert_eq!(store.current(), SessionStatus::Unauthenticated);

    provider.set_current(Some(member()));
    provider.emit(ProviderEvent::AuthStateChanged);
    drain().await;
    assert_eq!(store.current(), SessionStatus::Authenticated(member()));

    provider.set_current(None);
    provider.emit(ProviderEvent::AuthStateChanged);
    signed_out(&store).await;
    assert_eq!(provider.calls().sign_out, 0);
}

#[tokio::test]
async fn refreshed_token_reaches_the_api_client() {
    let provider = StubIdentityProvider::new()
        .with_account(member())
        .with_token("fresh-token");
    let transport = ScriptedTransport::new();
    let api = client(&transport);
    let store = SessionStore::new();
    let guard = SessionGuard::new(Arc::new(provider.clone()), store.clone())
        .with_api(api.clone());

    guard.handle_provider_event(ProviderEvent::TokenChanged).await;
    assert_eq!(api.token().await.as_deref(), Some("fresh-token"));

    provider.set_current(None);
    guard
        .handle_provider_event(ProviderEvent::AuthStateChanged)
        .await;
    assert_eq!(api.token().await, None);
    assert!(!store.is_authenticated());
}
