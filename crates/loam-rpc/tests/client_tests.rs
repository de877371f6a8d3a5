//! Wire-level tests for SemanticClient against a mock JSON-RPC server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loam_core::{JournalEntry, LoamError, SemanticService};
use loam_rpc::SemanticClient;

fn client(uri: &str) -> SemanticClient {
    SemanticClient::new(uri, Duration::from_millis(500)).unwrap()
}

async fn mock_rpc(server: &MockServer, tool: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": tool },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn semantic_search_parses_hits() {
    let server = MockServer::start().await;
    mock_rpc(
        &server,
        "semantic_search",
        json!({
            "notes": [
                { "file": "a.org", "title": "Alpha", "similarity": 0.91, "node_id": "a-1" },
                { "file": "b.org", "title": "Beta", "similarity": 0.83, "node_id": "b-1" },
            ]
        }),
    )
    .await;

    let hits = client(&server.uri())
        .semantic_search("gardening", 5, 0.7)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].node_id, "a-1");
    assert!((hits[0].similarity - 0.91).abs() < 1e-6);
}

#[tokio::test]
async fn contextual_search_parses_content_and_backlinks() {
    let server = MockServer::start().await;
    mock_rpc(
        &server,
        "contextual_search",
        json!({
            "notes": [{
                "file": "a.org",
                "title": "Alpha",
                "content": "full text",
                "tags": ["rust"],
                "backlinks": ["b-1"],
                "node_id": "a-1",
            }]
        }),
    )
    .await;

    let hits = client(&server.uri())
        .contextual_search("gardening", 3)
        .await
        .unwrap();
    assert_eq!(hits[0].content, "full text");
    assert_eq!(hits[0].backlinks, vec!["b-1"]);
}

#[tokio::test]
async fn generate_embeddings_extracts_count_from_ack() {
    let server = MockServer::start().await;
    mock_rpc(
        &server,
        "generate_embeddings",
        json!("Generated embeddings for 7 notes (3 skipped)"),
    )
    .await;

    let count = client(&server.uri()).generate_embeddings(false).await.unwrap();
    assert_eq!(count, 7);
}

#[tokio::test]
async fn add_daily_entry_posts_the_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "params": {
                "name": "add_daily_entry",
                "arguments": { "title": "Garden tending" },
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = JournalEntry {
        timestamp: chrono::Utc::now(),
        title: "Garden tending".into(),
        points: vec!["normalized 2 notes".into()],
        next_steps: vec![],
        tags: vec!["loam".into()],
    };
    client(&server.uri()).add_daily_entry(&entry).await.unwrap();
}

#[tokio::test]
async fn rpc_error_object_maps_to_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "method not found" },
        })))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .semantic_search("q", 1, 0.5)
        .await
        .unwrap_err();
    match err {
        LoamError::ServiceError { code, message, .. } => {
            assert_eq!(code, -32601);
            assert!(message.contains("method not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_status_maps_to_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server.uri()).generate_embeddings(true).await.unwrap_err();
    match err {
        LoamError::ServiceError { code, .. } => assert_eq!(code, 503),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_response_maps_to_service_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "ok"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client(&server.uri()).generate_embeddings(false).await.unwrap_err();
    assert!(matches!(err, LoamError::ServiceTimeout { .. }));
}

#[tokio::test]
async fn unreachable_server_maps_to_service_unavailable() {
    // Nothing listens on this port.
    let lonely = client("http://127.0.0.1:9");
    let err = lonely.generate_embeddings(false).await.unwrap_err();
    assert!(matches!(err, LoamError::ServiceUnavailable { .. }));
    assert!(!lonely.is_available().await);
}

#[tokio::test]
async fn availability_probe_accepts_any_http_answer() {
    let server = MockServer::start().await;
    // No GET mock mounted: wiremock answers 404, which still proves
    // something is listening.
    assert!(client(&server.uri()).is_available().await);
}
