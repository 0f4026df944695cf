//! Integration tests for the HTTP fetch client against a mock upstream

mod helpers;

use helpers::*;
use httpmock::prelude::*;
use mdp_common::config::HttpConfig;
use mdp_pipeline::services::{FetchClient, FetchError};
use mdp_pipeline::SourceKind;
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn fast_client(max_retries: u32) -> FetchClient {
    let config = HttpConfig {
        max_retries,
        backoff_base_ms: 5,
        user_agent: "mdp-tests/1.0".to_string(),
        ..HttpConfig::default()
    };
    FetchClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_success_returns_payload_verbatim() {
    let server = MockServer::start_async().await;
    let payload = positions_payload(vec![position_feature(230629000, 60.1, 24.9)]);
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(POSITIONS_PATH)
                .header("digitraffic-user", "mdp-tests/1.0")
                .header("user-agent", "mdp-tests/1.0");
            then.status(200).json_body(payload.clone());
        })
        .await;

    let envelope = fast_client(3)
        .fetch(SourceKind::Positions, &server.url(POSITIONS_PATH), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(envelope.source, SourceKind::Positions);
    assert_eq!(envelope.payload, payload);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_server_errors_are_retried_until_budget_exhausted() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(SEA_STATE_PATH);
            then.status(503);
        })
        .await;

    let result = fast_client(3)
        .fetch(SourceKind::SeaState, &server.url(SEA_STATE_PATH), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
    // First attempt plus three retries
    mock.assert_hits_async(4).await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(PORT_CALLS_PATH);
            then.status(404).body("not found");
        })
        .await;

    let result = fast_client(3)
        .fetch(SourceKind::PortCalls, &server.url(PORT_CALLS_PATH), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_invalid_json_is_decode_error_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(POSITIONS_PATH);
            then.status(200).body("{\"features\": [");
        })
        .await;

    let result = fast_client(3)
        .fetch(SourceKind::Positions, &server.url(POSITIONS_PATH), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Decode(_))));
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_empty_body_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(POSITIONS_PATH);
            then.status(200).body("  \n");
        })
        .await;

    let result = fast_client(0)
        .fetch(SourceKind::Positions, &server.url(POSITIONS_PATH), TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_timeout_is_transient_network_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(POSITIONS_PATH);
            then.status(200)
                .json_body(json!([]))
                .delay(Duration::from_millis(500));
        })
        .await;

    let result = fast_client(1)
        .fetch(
            SourceKind::Positions,
            &server.url(POSITIONS_PATH),
            Duration::from_millis(100),
        )
        .await;

    match result {
        Err(e @ FetchError::Network(_)) => assert!(e.is_transient()),
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(mock.hits_async().await >= 1);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Port 9 (discard) on localhost is not listening in test environments
    let result = fast_client(1)
        .fetch(SourceKind::Positions, "http://127.0.0.1:9/locations", TIMEOUT)
        .await;

    assert!(matches!(result, Err(FetchError::Network(_))));
}
