use std::time::Duration;

use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notevec_core::{EmbedError, EmbedProvider, EmbedRequest, ProviderConfig, ProviderKind};
use notevec_embed::{build_provider, FakeProvider, OpenAiProvider};

fn provider(server: &MockServer, retries: u32) -> OpenAiProvider {
    let config = ProviderConfig {
        api_key: Some(Secret::new("sk-test".to_string())),
        base_url: server.uri(),
        dimensions: 3,
        max_retries: retries,
        timeout_secs: 5,
        ..ProviderConfig::default()
    };
    OpenAiProvider::from_config(&config).with_backoff(Duration::from_millis(1))
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn sends_model_input_and_dimensions_and_reorders_by_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "text-embedding-3-small", "input": ["a", "b"], "dimensions": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                {"index": 0, "embedding": [1.0, 0.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let input = texts(&["a", "b"]);
    let vectors = provider(&server, 0).embed_batch(EmbedRequest::new(&input, 3)).await.expect("embed");
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn missing_key_fails_only_when_called() {
    let server = MockServer::start().await;
    let config = ProviderConfig { base_url: server.uri(), ..ProviderConfig::default() };
    let provider = OpenAiProvider::from_config(&config);
    assert_eq!(provider.model_id(), "text-embedding-3-small");

    let input = texts(&["a"]);
    let err = provider.embed_batch(EmbedRequest::new(&input, 256)).await.unwrap_err();
    assert!(matches!(err, EmbedError::Unauthenticated(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Incorrect API key"}})))
        .expect(1)
        .mount(&server)
        .await;

    let input = texts(&["a"]);
    let err = provider(&server, 3).embed_batch(EmbedRequest::new(&input, 3)).await.unwrap_err();
    assert!(matches!(err, EmbedError::Unauthenticated(ref m) if m.contains("Incorrect API key")));
}

#[tokio::test]
async fn exhausted_quota_is_reported_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let input = texts(&["a"]);
    let err = provider(&server, 3).embed_batch(EmbedRequest::new(&input, 3)).await.unwrap_err();
    assert!(err.is_quota());
    assert!(err.to_string().contains("quota"));
}

#[tokio::test]
async fn transient_failures_are_retried_then_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"index": 0, "embedding": [0.5, 0.5, 0.0]}]})))
        .mount(&server)
        .await;

    let input = texts(&["a"]);
    let vectors = provider(&server, 2).embed_batch(EmbedRequest::new(&input, 3)).await.expect("embed");
    assert_eq!(vectors.len(), 1);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 3);
}

#[tokio::test]
async fn persistent_outage_surfaces_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let input = texts(&["a"]);
    let err = provider(&server, 1).embed_batch(EmbedRequest::new(&input, 3)).await.unwrap_err();
    assert!(matches!(err, EmbedError::Unavailable(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = ProviderConfig {
        api_key: Some(Secret::new("sk-test".to_string())),
        base_url: server.uri(),
        timeout_secs: 1,
        max_retries: 0,
        ..ProviderConfig::default()
    };
    let input = texts(&["a"]);
    let err = OpenAiProvider::from_config(&config).embed_batch(EmbedRequest::new(&input, 3)).await.unwrap_err();
    assert!(matches!(err, EmbedError::Timeout(_)));
}

#[tokio::test]
async fn fake_provider_is_deterministic_and_normalized() {
    let provider = FakeProvider::new(32);
    let input = texts(&["hello world", "hello world", "something else"]);
    let vectors = provider.embed_batch(EmbedRequest::new(&input, 32)).await.expect("embed");
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0], vectors[1]);
    assert_ne!(vectors[0], vectors[2]);
    let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-3, "norm={norm}");
}

#[tokio::test]
async fn build_provider_follows_kind() {
    let fake = build_provider(&ProviderConfig { kind: ProviderKind::Fake, dimensions: 8, ..ProviderConfig::default() })
        .expect("fake");
    assert_eq!(fake.dimensions(), 8);
    assert_eq!(fake.embed_one("query").await.expect("embed").len(), 8);

    let remote = build_provider(&ProviderConfig::default()).expect("remote");
    assert_eq!(remote.model_id(), "text-embedding-3-small");
    assert_eq!(remote.dimensions(), 256);
}

#[cfg(not(feature = "local"))]
#[test]
fn local_provider_requires_feature() {
    let result = build_provider(&ProviderConfig { kind: ProviderKind::Local, ..ProviderConfig::default() });
    assert!(result.is_err());
}
