//! End-to-End Tests for upstream dispatch
//!
//! Runs the normalizer and dispatcher against a local mock Dify server:
//! - Chat, workflow and completion payload shapes
//! - Conversation id reuse across turns
//! - HTML pages served with a success status
//! - 401 diagnosis from the upstream message
//! - Transport failures and timeouts

mod common;

use common::*;
use dify_relay_core::{
    normalize, normalize_with, AuthCause, AuthHeaderType, CallerTurn, Dispatcher, ErrorKind,
    RequestMode, UpstreamResult,
};
use serde_json::json;
use std::time::Duration;

fn base_url(addr: std::net::SocketAddr) -> String {
    // port-only URL: the normalizer adds /v1
    format!("http://{}", addr)
}

// ============================================================================
// Success paths
// ============================================================================

#[tokio::test]
async fn test_conversation_id_round_trip() {
    let (addr, state) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::json(200, json!({ "answer": "Hi", "conversation_id": "conv-123" })),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let first = dispatcher
        .send(&target, RequestMode::Chatbot, "Hello", None)
        .await;
    let conversation_id = match &first {
        UpstreamResult::Success {
            answer,
            conversation_id,
            ..
        } => {
            assert_eq!(answer, "Hi");
            conversation_id.clone()
        }
        other => panic!("unexpected result: {:?}", other),
    };
    assert_eq!(conversation_id.as_deref(), Some("conv-123"));

    let first_body = state.last_request().await.json();
    assert_eq!(first_body["conversation_id"], json!(null));
    assert_eq!(first_body["response_mode"], "blocking");
    assert_eq!(first_body["user"], "web-ui-user");

    dispatcher
        .send(
            &target,
            RequestMode::Chatbot,
            "And again",
            conversation_id.as_deref(),
        )
        .await;
    let second_body = state.last_request().await.json();
    assert_eq!(second_body["conversation_id"], "conv-123");
    assert_eq!(second_body["query"], "And again");
    assert_eq!(state.request_count().await, 2);
}

#[tokio::test]
async fn test_request_headers() {
    let (addr, state) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::json(200, json!({ "answer": "ok" })),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(
        &format!("  http://{}/v1/ ,", addr),
        &format!(" {} ", TEST_API_KEY),
        RequestMode::Chatbot,
    )
    .unwrap();

    dispatcher.send(&target, RequestMode::Chatbot, "ping", None).await;

    let request = state.last_request().await;
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/v1/chat-messages");
    assert_eq!(
        request.header("authorization"),
        Some(format!("Bearer {}", TEST_API_KEY).as_str())
    );
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("accept"), Some("application/json"));
    assert!(request.header("user-agent").unwrap().starts_with("Mozilla/5.0"));
}

#[tokio::test]
async fn test_alternate_auth_header_sent() {
    let (addr, state) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::json(200, json!({ "answer": "ok" })),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize_with(
        &base_url(addr),
        TEST_API_KEY,
        RequestMode::Chatbot,
        AuthHeaderType::XApiKey,
    )
    .unwrap();

    dispatcher.send(&target, RequestMode::Chatbot, "ping", None).await;

    let request = state.last_request().await;
    assert_eq!(request.header("x-api-key"), Some(TEST_API_KEY));
    assert_eq!(request.header("authorization"), None);
}

#[tokio::test]
async fn test_workflow_result_output() {
    let (addr, state) = start_mock_dify(vec![(
        "/v1/workflows/run",
        CannedResponse::json(200, json!({ "outputs": { "result": "42" } })),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Workflow).unwrap();

    let result = dispatcher
        .send(&target, RequestMode::Workflow, "meaning of life", None)
        .await;
    assert!(matches!(result, UpstreamResult::Success { ref answer, .. } if answer == "42"));

    let body = state.last_request().await.json();
    assert_eq!(body["inputs"]["query"], "meaning of life");
    assert!(body.get("query").is_none());
    assert!(body.get("conversation_id").is_none());
}

#[tokio::test]
async fn test_completion_endpoint_and_caller_inputs() {
    let (addr, state) = start_mock_dify(vec![(
        "/v1/completion-messages",
        CannedResponse::json(200, json!({ "answer": "done" })),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Completion).unwrap();

    let turn = CallerTurn::from_payload(
        &json!({ "query": "summarize", "inputs": { "lang": "en" }, "user": "operator-7" }),
        None,
        None,
    )
    .unwrap();
    let payload = turn.into_payload(RequestMode::Completion, dispatcher.default_user());
    let result = dispatcher
        .dispatch(&target, RequestMode::Completion, &payload)
        .await;
    assert!(result.is_success());

    let body = state.last_request().await.json();
    assert_eq!(body["inputs"]["lang"], "en");
    assert_eq!(body["user"], "operator-7");
}

// ============================================================================
// Error paths
// ============================================================================

#[tokio::test]
async fn test_html_page_with_success_status() {
    let (addr, _) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::html(200, "<!DOCTYPE html><html><body>You are about to visit</body></html>"),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    assert_eq!(result, UpstreamResult::HtmlPageError { http_status: 200 });
}

#[tokio::test]
async fn test_unauthorized_header_missing() {
    let (addr, _) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::json(
            401,
            json!({ "code": "unauthorized", "message": "Authorization header missing", "status": 401 }),
        ),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    match &result {
        UpstreamResult::StructuredError {
            http_status,
            kind,
            cause,
            ..
        } => {
            assert_eq!(*http_status, 401);
            assert_eq!(*kind, ErrorKind::Unauthorized);
            assert_eq!(*cause, Some(AuthCause::BadAuthHeader));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(result.user_message().contains("How to fix"));
    assert_eq!(result.response_status(), 401);
}

#[tokio::test]
async fn test_wrong_path_is_not_found() {
    let (addr, _) = start_mock_dify(vec![]).await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(
        &format!("http://{}/custom", addr),
        TEST_API_KEY,
        RequestMode::Chatbot,
    )
    .unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    assert!(matches!(
        result,
        UpstreamResult::StructuredError {
            http_status: 404,
            kind: ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn test_non_json_success_body() {
    let (addr, _) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::text(200, "OK"),
    )])
    .await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    assert!(matches!(result, UpstreamResult::NetworkError { .. }));
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = closed_port_addr().await;
    let dispatcher = create_test_dispatcher();
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    match &result {
        UpstreamResult::NetworkError { message } => {
            assert!(message.contains("could not reach the Dify server"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(result.response_status(), 500);
}

#[tokio::test]
async fn test_timeout_becomes_network_error() {
    let (addr, _) = start_mock_dify(vec![(
        "/v1/chat-messages",
        CannedResponse::json(200, json!({ "answer": "late" })).delayed(Duration::from_secs(5)),
    )])
    .await;
    let dispatcher = Dispatcher::with_client(
        create_test_client(Duration::from_millis(200)),
        &create_test_config(),
    );
    let target = normalize(&base_url(addr), TEST_API_KEY, RequestMode::Chatbot).unwrap();

    let result = dispatcher.send(&target, RequestMode::Chatbot, "hi", None).await;
    match result {
        UpstreamResult::NetworkError { message } => assert!(message.contains("timeout")),
        other => panic!("unexpected result: {:?}", other),
    }
}
