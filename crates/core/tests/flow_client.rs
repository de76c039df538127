//! Contract tests for the training framework endpoint.
//!
//! Covers the `GET /flows/{session_id}` request shape and how responses map
//! onto documents and `RetrievalError`s.

use callflow_core::retriever::{ArtifactRetriever, FlowClient, RetrievalError, RetrievalState};
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_empty_step_list_is_a_valid_document() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "X",
            "description": "Y",
            "usage": "",
            "usageContext": "",
            "promptBlockSteps": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let document = client.fetch("abc123").await.unwrap();

    assert_eq!(document.title, "X");
    assert_eq!(document.description, "Y");
    assert!(document.steps.is_empty());
}

#[tokio::test]
async fn test_steps_are_returned_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/conv_01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Scheduling pediatric cleanings",
            "description": "How the office books cleanings for two children",
            "usage": "Follow the steps in order",
            "usageContext": "Parent calling to book appointments",
            "promptBlockSteps": [
                {
                    "title": "Greet the caller",
                    "description": "Open the call warmly",
                    "instructions": "Welcome the caller and offer help",
                    "examples": "Hello, Sarah! We'd be happy to help."
                },
                {
                    "title": "Collect phone number",
                    "description": "Identify the patient record",
                    "instructions": "Ask for the phone number on file",
                    "examples": "Could you please provide your phone number?"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let document = client.fetch("conv_01").await.unwrap();

    let titles: Vec<&str> = document.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Greet the caller", "Collect phone number"]);
    assert_eq!(document.usage_context, "Parent calling to book appointments");
}

#[tokio::test]
async fn test_server_error_is_retrieval_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "title": "should not be parsed",
            "description": "",
            "usage": "",
            "usageContext": "",
            "promptBlockSteps": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let result = client.fetch("abc123").await;

    match result {
        Err(RetrievalError::RetrievalFailed { status }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
        }
        other => panic!("expected RetrievalFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_session_is_retrieval_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let result = client.fetch("missing").await;

    assert!(matches!(
        result,
        Err(RetrievalError::RetrievalFailed { status }) if status == StatusCode::NOT_FOUND
    ));
}

#[tokio::test]
async fn test_partial_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "X",
            "promptBlockSteps": [{"title": "only a title"}]
        })))
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let result = client.fetch("abc123").await;

    assert!(matches!(result, Err(RetrievalError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Internal analysis pending"))
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let result = client.fetch("abc123").await;

    assert!(matches!(result, Err(RetrievalError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Bind and release a port so nothing is listening on it.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let client = FlowClient::new(&uri).unwrap();
    let result = client.fetch("abc123").await;

    assert!(matches!(result, Err(RetrievalError::NetworkError(_))));
}

#[tokio::test]
async fn test_empty_session_id_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let result = client.fetch("").await;

    assert!(matches!(result, Err(RetrievalError::EmptySessionId)));
}

#[tokio::test]
async fn test_retriever_fetches_each_id_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "X",
            "description": "Y",
            "usage": "",
            "usageContext": "",
            "promptBlockSteps": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let mut retriever = ArtifactRetriever::new();

    let state = retriever.load(&client, "abc123").await;
    assert_eq!(state.data().map(|d| d.title.as_str()), Some("X"));
    assert!(state.error().is_none());

    // Same id again: served from state, no second request.
    retriever.load(&client, "abc123").await;
    assert!(matches!(retriever.state(), RetrievalState::Loaded(_)));
}

#[tokio::test]
async fn test_retriever_failure_is_distinguishable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows/abc123"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = FlowClient::new(&mock_server.uri()).unwrap();
    let mut retriever = ArtifactRetriever::new();

    let state = retriever.load(&client, "abc123").await;
    assert!(state.data().is_none());
    assert!(matches!(
        state.error(),
        Some(RetrievalError::RetrievalFailed { .. })
    ));

    let ticket = retriever.retry().expect("failed fetch can be retried");
    let result = client.fetch(ticket.session_id()).await;
    assert!(retriever.complete(ticket, result));
    assert!(retriever.state().error().is_some());
}
