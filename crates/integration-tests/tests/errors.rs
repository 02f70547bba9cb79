//! Error responses of the REST contract and how slices record them.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use slicekit::{ClientConfig, ConcurrencyPolicy, RestClient, RestSlice, SliceError};
use slicekit_core::StrapColorId;
use slicekit_core::entities::StrapColor;
use slicekit_integration_tests::{TestService, unreachable_url};

async fn service() -> TestService {
    TestService::spawn()
        .await
        .expect("Failed to start test service")
}

fn assert_idle_with_error(slice: &RestSlice<StrapColor>) {
    let state = slice.state();
    assert!(!state.loading);
    assert!(!state.updating);
    assert!(!state.update_success);
    assert!(state.error_message.is_some());
}

// ============================================================================
// Service Rules
// ============================================================================

#[tokio::test]
async fn test_create_with_id_is_rejected_by_service() {
    let service = service().await;
    let url = service.url().join("api/strap-colors").unwrap();

    let resp = reqwest::Client::new()
        .post(url)
        .json(&json!({ "id": 4, "name": "Red" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()
            .get("x-slicekitapp-error")
            .and_then(|v| v.to_str().ok()),
        Some("error.idexists")
    );
    let problem: Value = resp.json().await.unwrap();
    assert_eq!(problem["message"], "error.idexists");
    assert_eq!(problem["params"], "strapColor");
}

#[tokio::test]
async fn test_put_with_mismatched_id_is_rejected() {
    let service = service().await;
    let slice = service.slice::<StrapColor>().unwrap();
    slice.create_entity(&StrapColor::new("Red")).await.unwrap();

    let url = service.url().join("api/strap-colors/1").unwrap();
    let resp = reqwest::Client::new()
        .put(url)
        .json(&json!({ "id": 2, "name": "Blue" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: Value = resp.json().await.unwrap();
    assert_eq!(problem["message"], "error.idinvalid");
}

#[tokio::test]
async fn test_validation_failure_carries_field_errors() {
    let service = service().await;
    let slice = service.slice::<StrapColor>().unwrap();

    let err = slice
        .create_entity(&StrapColor::new(""))
        .await
        .unwrap_err();

    match &err {
        SliceError::ValidationFailed { field_errors, .. } => {
            assert_eq!(field_errors.len(), 1);
            assert_eq!(field_errors[0].field, "name");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_idle_with_error(&slice);
    assert_eq!(slice.state().error_message, Some(err.to_string()));
    assert!(service.strap_colors.records().await.is_empty());
}

#[tokio::test]
async fn test_update_of_missing_record_is_a_conflict() {
    let service = service().await;
    let slice = service.slice::<StrapColor>().unwrap();

    let ghost = StrapColor {
        id: Some(StrapColorId::new(42)),
        ..StrapColor::new("Ghost")
    };
    let err = slice.update_entity(&ghost).await.unwrap_err();

    assert!(matches!(err, SliceError::Conflict(ref message) if message == "Entity not found"));
    assert_idle_with_error(&slice);
}

#[tokio::test]
async fn test_precondition_failure_sends_nothing() {
    let service = service().await;
    let slice = service.slice::<StrapColor>().unwrap();

    let err = slice
        .update_entity(&StrapColor::new("No id"))
        .await
        .unwrap_err();

    assert!(matches!(err, SliceError::InvalidRequest(_)));
    assert_idle_with_error(&slice);
    assert_eq!(service.strap_colors.requests(), 0);
}

// ============================================================================
// Transport & Authentication
// ============================================================================

#[tokio::test]
async fn test_unreachable_service_is_a_network_error() {
    let url = unreachable_url().await.unwrap();
    let client = RestClient::new(&ClientConfig::new(url)).unwrap();
    let slice = RestSlice::<StrapColor>::from_client(&client, ConcurrencyPolicy::Fenced);

    let err = slice
        .create_entity(&StrapColor::new("Red"))
        .await
        .unwrap_err();

    assert!(matches!(err, SliceError::Network(_)));
    assert_idle_with_error(&slice);

    // The slice stays usable after a failure.
    slice.reset();
    assert!(slice.state().error_message.is_none());
}

#[tokio::test]
async fn test_truncated_error_body_still_reports_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0_u8; 4096];
        let _ = socket.read(&mut request).await.unwrap();
        // Promise a longer body than is sent, then hang up.
        socket
            .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 64\r\n\r\n{\"tit")
            .await
            .unwrap();
    });

    let url = format!("http://{addr}").parse().unwrap();
    let client = RestClient::new(&ClientConfig::new(url)).unwrap();
    let slice = RestSlice::<StrapColor>::from_client(&client, ConcurrencyPolicy::Fenced);

    let err = slice
        .get_entity(StrapColorId::new(1))
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(matches!(
        err,
        SliceError::Http { status: 502, ref message } if message == "Bad Gateway"
    ));
    assert!(!slice.state().loading);
    assert_eq!(slice.state().error_message, Some(err.to_string()));
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let service = TestService::spawn_with_token("test-token")
        .await
        .expect("Failed to start test service");

    let anonymous = service.slice::<StrapColor>().unwrap();
    let err = anonymous
        .create_entity(&StrapColor::new("Red"))
        .await
        .unwrap_err();
    assert!(matches!(err, SliceError::Http { status: 401, .. }));

    let client = RestClient::new(
        &service
            .config()
            .with_token(SecretString::from("test-token")),
    )
    .unwrap();
    let authorized = RestSlice::<StrapColor>::from_client(&client, ConcurrencyPolicy::Fenced);
    let saved = authorized
        .create_entity(&StrapColor::new("Red"))
        .await
        .unwrap();
    assert_eq!(saved.id, Some(StrapColorId::new(1)));
}
