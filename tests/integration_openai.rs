#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Embedding client against a mocked OpenAI-compatible endpoint

use docvec_mcp::DocvecError;
use docvec_mcp::config::EmbeddingConfig;
use docvec_mcp::embeddings::{EmbeddingProvider, OpenAiClient};
use serde_json::json;
use serial_test::serial;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIM: usize = 3;

fn config_for(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        api_base: format!("{}/v1", server.uri()),
        model: "test-embed".to_string(),
        dimension: DIM,
        timeout_secs: 5,
        ..EmbeddingConfig::default()
    }
}

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::with_api_key(&config_for(server), Some("sk-test".to_string()))
        .expect("Failed to create client")
}

fn retrying_client_for(server: &MockServer, attempts: u32) -> OpenAiClient {
    client_for(server)
        .with_retry_attempts(attempts)
        .with_retry_backoff(Duration::from_millis(1))
}

async fn embed(client: OpenAiClient, texts: Vec<String>) -> docvec_mcp::Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("embedding task panicked")
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_is_returned_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({
            "model": "test-embed",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [2.0, 2.0, 2.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 1.0, 1.0]}
            ],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embed(client_for(&server), texts(&["first", "second"]))
        .await
        .expect("embedding should succeed");

    assert_eq!(vectors, vec![vec![1.0; DIM], vec![2.0; DIM]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.5, 0.5]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embed(client_for(&server), texts(&["hello"]))
        .await
        .expect("embedding should succeed");
    assert_eq!(vectors.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn default_client_sends_one_request_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = embed(client_for(&server), texts(&["once"]))
        .await
        .expect_err("503 surfaces without a retry");
    assert!(matches!(err, DocvecError::Embedding(_)));
    assert!(err.to_string().contains("after 1 attempts"));

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn opted_in_retries_recover_from_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let vectors = embed(retrying_client_for(&server, 3), texts(&["retry me"]))
        .await
        .expect("third attempt should succeed");
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0]]);

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn opted_in_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = embed(retrying_client_for(&server, 3), texts(&["never"]))
        .await
        .expect_err("all attempts fail");
    assert!(matches!(err, DocvecError::Embedding(_)));
    assert!(err.to_string().contains("after 3 attempts"));

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_fail_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = embed(retrying_client_for(&server, 3), texts(&["denied"]))
        .await
        .expect_err("401 is not retried even when retries are enabled");
    assert!(err.to_string().contains("HTTP 401"));

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0, 2.0]}]
        })))
        .mount(&server)
        .await;

    let err = embed(client_for(&server), texts(&["short"]))
        .await
        .expect_err("dimension differs from config");
    assert!(matches!(
        err,
        DocvecError::DimensionMismatch {
            expected: DIM,
            actual: 2
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_entries_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0, 2.0, 3.0]}]
        })))
        .mount(&server)
        .await;

    let err = embed(client_for(&server), texts(&["one", "two"]))
        .await
        .expect_err("one embedding for two inputs");
    assert!(err.to_string().contains("2 vs 1"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn api_key_is_read_from_environment() {
    const KEY_VAR: &str = "DOCVEC_TEST_EMBEDDING_KEY";

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-from-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.0, 0.0, 1.0]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = EmbeddingConfig {
        api_key_env: KEY_VAR.to_string(),
        ..config_for(&server)
    };

    // SAFETY: the only test touching this variable, and env tests run serially
    unsafe { std::env::set_var(KEY_VAR, "sk-from-env") };
    let client = OpenAiClient::new(&config).expect("Failed to create client");
    // SAFETY: see above
    unsafe { std::env::remove_var(KEY_VAR) };

    let vectors = embed(client, texts(&["keyed"]))
        .await
        .expect("embedding should succeed");
    assert_eq!(vectors, vec![vec![0.0, 0.0, 1.0]]);
}
