//! Tests for lendflow-remote: HTTP adapters against a mock server, retry behaviour end to end

use lendflow_core::ContentId;
use lendflow_remote::mock::{MemoryArtifactStore, ScriptedReasoner};
use lendflow_remote::*;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEN_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
    })
}

fn fast() -> RetryPolicy {
    RetryPolicy::from_millis(5, 1, 5)
}

// ===========================================================================
// GeminiReasoner
// ===========================================================================

#[tokio::test]
async fn gemini_sends_prompt_and_reads_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEN_PATH))
        .and(query_param("key", "test-key"))
        .and(body_json(json!({"contents": [{"parts": [{"text": "hello"}]}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let g = GeminiReasoner::new("test-key").with_base_url(server.uri());
    assert_eq!(g.generate("hello").await.unwrap(), "hi there");
}

#[tokio::test]
async fn gemini_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/auth:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/quota:generateContent"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_string(r#"{"error":{"message":"Quota exceeded. Please retry in 7s."}}"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/busy:generateContent"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "3"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/empty:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let base = GeminiReasoner::new("k").with_base_url(server.uri());
    let err = base.with_model("auth").generate("x").await.unwrap_err();
    assert!(matches!(err, RemoteError::AuthFailed(_)));

    let base = GeminiReasoner::new("k").with_base_url(server.uri());
    let err = base.with_model("quota").generate("x").await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    assert!(matches!(err, RemoteError::RateLimited { .. }));

    let base = GeminiReasoner::new("k").with_base_url(server.uri());
    let err = base.with_model("busy").generate("x").await.unwrap_err();
    assert!(matches!(err, RemoteError::Overloaded { retry_after: Some(d) } if d == Duration::from_secs(3)));

    let base = GeminiReasoner::new("k").with_base_url(server.uri());
    let err = base.with_model("empty").generate("x").await.unwrap_err();
    assert!(matches!(err, RemoteError::MalformedResponse(_)));
}

#[tokio::test]
async fn resilient_client_retries_overloaded_gemini() {
    let server = MockServer::start().await;
    let attempt = AtomicU32::new(0);
    Mock::given(method("POST"))
        .and(path(GEN_PATH))
        .respond_with(move |_: &wiremock::Request| {
            if attempt.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(gemini_reply("```json\n{\"ok\": true}\n```"))
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = ResilientClient::new(
        Arc::new(GeminiReasoner::new("k").with_base_url(server.uri())),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_policy(fast());
    assert_eq!(client.reason_json("p").await.unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn resilient_client_stops_at_budget_on_http_503() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let client = ResilientClient::new(
        Arc::new(GeminiReasoner::new("k").with_base_url(server.uri())),
        Arc::new(MemoryArtifactStore::new()),
    )
    .with_policy(fast());
    let err = client.reason("p").await.unwrap_err();
    assert!(matches!(err, RemoteError::RetriesExhausted { attempts: 5, .. }));
}

// ===========================================================================
// PinataStore
// ===========================================================================

#[tokio::test]
async fn pinata_pins_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .and(header("authorization", "Bearer jwt-123"))
        .and(body_json(json!({"step": "intent"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "IpfsHash": "QmTestHash", "PinSize": 42, "Timestamp": "2024-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = PinataStore::new("jwt-123").with_api_url(server.uri());
    let cid = store.put_json(&json!({"step": "intent"})).await.unwrap();
    assert_eq!(cid, ContentId::new("QmTestHash"));
}

#[tokio::test]
async fn pinata_reads_back_through_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/QmDoc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
        .mount(&server)
        .await;

    let store = PinataStore::new("jwt").with_gateway_url(server.uri());
    assert_eq!(store.get_json(&ContentId::new("QmDoc")).await.unwrap(), json!({"a": 1}));
}

#[tokio::test]
async fn pinata_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"IpfsHash": "late"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let store = PinataStore::new("jwt")
        .with_api_url(server.uri())
        .with_timeout(Duration::from_millis(50));
    let err = store.put_json(&json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteError::Timeout));
}

#[tokio::test]
async fn pinata_missing_hash_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pinning/pinJSONToIPFS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let store = PinataStore::new("jwt").with_api_url(server.uri());
    let err = store.put_json(&json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteError::MalformedResponse(_)));
}

// ===========================================================================
// Envelopes
// ===========================================================================

#[tokio::test]
async fn call_dispatches_on_request_kind() {
    let client = ResilientClient::new(
        Arc::new(ScriptedReasoner::new().reply("text")),
        Arc::new(MemoryArtifactStore::new()),
    );
    let r = client
        .call(RemoteRequest::Reason { prompt: "p".into() })
        .await
        .unwrap();
    assert_eq!(r, RemoteResponse::Text("text".into()));

    let r = client
        .call(RemoteRequest::Store { document: json!({"x": 1}) })
        .await
        .unwrap();
    assert!(matches!(r, RemoteResponse::ContentId(_)));
}
