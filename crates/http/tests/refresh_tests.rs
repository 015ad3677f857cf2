//! Token refresh behaviour against a mock backend

use serde_json::{Value, json};
use std::time::Duration;
use warden_core::{CredentialStore, SessionEvent, TokenPair};
use warden_http::{ClientConfig, ClientError, SessionClient};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, store: &CredentialStore) -> SessionClient {
    SessionClient::builder()
        .base_url(server.uri())
        .store(store.clone())
        .build()
        .unwrap()
}

async fn mount_wallets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/wallets"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wallets"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "balance": 42 })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_replayed() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .and(body_json(json!({ "refresh": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));
    let client = client(&server, &store);
    let mut events = client.events().subscribe();

    let body: Value = client.get_json("/wallets").await.unwrap();

    assert_eq!(body["balance"], 42);
    assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::TokensRefreshed);
}

#[tokio::test]
async fn test_concurrent_failures_trigger_single_refresh() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));
    let client = client(&server, &store);

    let results = futures::future::join_all(
        (0..8).map(|_| client.get_json::<Value>("/wallets")),
    )
    .await;

    for result in results {
        assert_eq!(result.unwrap()["balance"], 42);
    }

    let replays = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/wallets")
        .filter(|r| {
            r.headers
                .get("authorization")
                .is_some_and(|value| value.as_bytes() == b"Bearer A2")
        })
        .count();
    assert_eq!(replays, 8);
    assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "A2", "refresh": "R2" })),
        )
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));

    let _: Value = client(&server, &store).get_json("/wallets").await.unwrap();

    assert_eq!(store.get(), Some(TokenPair::new("A2", "R2")));
}

#[tokio::test]
async fn test_replay_rejected_again_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wallets"))
        .respond_with(ResponseTemplate::new(401).set_body_string("still no"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));

    let result = client(&server, &store).get_json::<Value>("/wallets").await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh expired"))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));
    let client = client(&server, &store);
    let mut events = client.events().subscribe();

    let result = client.get_json::<Value>("/wallets").await;

    match result {
        Err(error @ ClientError::RefreshFailed(_)) => assert!(error.is_auth_expired()),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(store.get().is_none());
    assert_eq!(events.recv().await.unwrap(), SessionEvent::RefreshFailed);
}

#[tokio::test]
async fn test_refresh_call_is_not_intercepted() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));

    let _: Value = client(&server, &store).get_json("/wallets").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|r| r.url.path() == "/token/refresh")
        .unwrap();
    assert!(!refresh.headers.contains_key("authorization"));
    assert!(!refresh.headers.contains_key("x-device-fingerprint"));
}

#[tokio::test]
async fn test_refresh_survives_cancelled_caller() {
    let server = MockServer::start().await;
    mount_wallets(&server).await;
    Mock::given(method("POST"))
        .and(path("/token/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new();
    store.set(TokenPair::new("A1", "R1"));
    let mut config = ClientConfig::new(server.uri());
    config.timeout_secs = 1;
    let client = SessionClient::builder()
        .config(config)
        .store(store.clone())
        .build()
        .unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        client.get_json::<Value>("/wallets"),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!client.coordinator().is_refreshing());
    assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));

    let body: Value = client.get_json("/wallets").await.unwrap();
    assert_eq!(body["balance"], 42);
    assert_eq!(store.get(), Some(TokenPair::new("A2", "R1")));
}
