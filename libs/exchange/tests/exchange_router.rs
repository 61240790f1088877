use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chatkit_exchange::{
    AppState, ExchangeConfig, MockSessionApi, SessionApi, SessionApiError, SessionConfigSetting,
    UpstreamReply, router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn configured() -> ExchangeConfig {
    ExchangeConfig::new(
        Some("sk-live-secret".into()),
        SessionConfigSetting::Valid(json!({"workflow": {"id": "wf_123"}})),
    )
}

fn app_with(config: ExchangeConfig, upstream: Arc<MockSessionApi>) -> Router {
    let state = AppState::new(config, reqwest::Client::new()).with_session_api(upstream);
    router(state)
}

fn request(method: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/api/chatkit-session")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.expect("router handles request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

#[tokio::test]
async fn relays_only_the_client_secret() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::OK,
        json!({"client_secret": "abc123", "expires_after": 600, "id": "cksess_1"}),
    ));
    let (status, _, body) = send(app_with(configured(), upstream.clone()), request("POST")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"client_secret": "abc123"}));

    let calls = upstream.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "sk-live-secret");
    assert_eq!(calls[0].1, json!({"workflow": {"id": "wf_123"}}));
}

#[tokio::test]
async fn missing_api_key_short_circuits() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::OK,
        json!({"client_secret": "abc123"}),
    ));
    let config = ExchangeConfig::new(None, SessionConfigSetting::Valid(json!({})));
    let (status, _, body) = send(app_with(config, upstream.clone()), request("POST")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Missing OPENAI_API_KEY");
    assert_eq!(upstream.call_count().await, 0);
}

#[tokio::test]
async fn missing_session_config_is_reported_after_key_check() {
    let upstream = Arc::new(MockSessionApi::replying(StatusCode::OK, json!({})));
    let config = ExchangeConfig::new(Some("sk".into()), SessionConfigSetting::Missing);
    let (status, _, body) = send(app_with(config, upstream.clone()), request("POST")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Missing CHATKIT_SESSION_CONFIG");
    assert!(body["message"].as_str().unwrap().contains("CHATKIT_SESSION_CONFIG"));
    assert_eq!(upstream.call_count().await, 0);
}

#[tokio::test]
async fn invalid_session_config_echoes_parser_message() {
    let upstream = Arc::new(MockSessionApi::replying(StatusCode::OK, json!({})));
    let setting = SessionConfigSetting::parse(Some("{\"workflow\":"));
    let expected = match &setting {
        SessionConfigSetting::Invalid(message) => message.clone(),
        other => panic!("expected invalid setting, got {other:?}"),
    };
    let config = ExchangeConfig::new(Some("sk".into()), setting);
    let (status, _, body) = send(app_with(config, upstream.clone()), request("POST")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Invalid CHATKIT_SESSION_CONFIG", "message": expected})
    );
    assert_eq!(upstream.call_count().await, 0);
}

#[tokio::test]
async fn upstream_failure_keeps_status_and_body() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": "rate_limited"}),
    ));
    let (status, _, body) = send(app_with(configured(), upstream), request("POST")).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body,
        json!({"error": "OpenAI API error", "details": {"error": "rate_limited"}})
    );
}

#[tokio::test]
async fn success_without_client_secret_is_bad_gateway() {
    let upstream = Arc::new(MockSessionApi::replying(StatusCode::OK, json!({})));
    let (status, _, body) = send(app_with(configured(), upstream), request("POST")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"error": "Missing client secret in response"}));
}

#[tokio::test]
async fn options_never_reaches_upstream() {
    for config in [
        configured(),
        ExchangeConfig::new(None, SessionConfigSetting::Missing),
    ] {
        let upstream = Arc::new(MockSessionApi::replying(
            StatusCode::OK,
            json!({"client_secret": "abc123"}),
        ));
        let (status, headers, body) =
            send(app_with(config, upstream.clone()), request("OPTIONS")).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(upstream.call_count().await, 0);
    }
}

#[tokio::test]
async fn other_methods_are_rejected_without_upstream_call() {
    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let upstream = Arc::new(MockSessionApi::replying(
            StatusCode::OK,
            json!({"client_secret": "abc123"}),
        ));
        let (status, headers, body) =
            send(app_with(configured(), upstream.clone()), request(method)).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "method {method}");
        assert_eq!(body, json!({"error": "Method Not Allowed"}));
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(upstream.call_count().await, 0);
    }
}

#[tokio::test]
async fn alias_path_serves_the_same_exchange() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::OK,
        json!({"client_secret": "alias"}),
    ));
    let request = Request::builder()
        .method("POST")
        .uri("/api/create-session")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app_with(configured(), upstream), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"client_secret": "alias"}));
}

#[tokio::test]
async fn request_body_is_ignored() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::OK,
        json!({"client_secret": "abc123"}),
    ));
    let request = Request::builder()
        .method("POST")
        .uri("/api/chatkit-session")
        .header("content-type", "text/plain")
        .body(Body::from("not json at all"))
        .unwrap();
    let (status, _, _) = send(app_with(configured(), upstream.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        upstream.calls.lock().await[0].1,
        json!({"workflow": {"id": "wf_123"}})
    );
}

struct UnreachableUpstream;

#[async_trait]
impl SessionApi for UnreachableUpstream {
    async fn create_session(
        &self,
        _api_key: &str,
        _document: &Value,
    ) -> Result<UpstreamReply, SessionApiError> {
        Err(SessionApiError::Config(anyhow::anyhow!("dns lookup failed")))
    }
}

struct PanickingUpstream;

#[async_trait]
impl SessionApi for PanickingUpstream {
    async fn create_session(
        &self,
        _api_key: &str,
        _document: &Value,
    ) -> Result<UpstreamReply, SessionApiError> {
        panic!("upstream client exploded");
    }
}

#[tokio::test]
async fn transport_failure_becomes_generic_server_error() {
    let state = AppState::new(configured(), reqwest::Client::new())
        .with_session_api(Arc::new(UnreachableUpstream));
    let (status, _, body) = send(router(state), request("POST")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create ChatKit session");
    assert!(body["message"].as_str().unwrap().contains("dns lookup failed"));
}

#[tokio::test]
async fn panics_are_contained_and_service_keeps_serving() {
    let state = AppState::new(configured(), reqwest::Client::new())
        .with_session_api(Arc::new(PanickingUpstream));
    let app = router(state);

    let (status, headers, body) = send(app.clone(), request("POST")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create ChatKit session");
    assert_eq!(body["message"], "upstream client exploded");
    assert_eq!(headers["access-control-allow-origin"], "*");

    let (status, _, _) = send(app, request("OPTIONS")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn api_key_never_appears_in_responses_or_logs() {
    let upstream = Arc::new(MockSessionApi::replying(
        StatusCode::UNAUTHORIZED,
        json!({"error": {"message": "bad key"}}),
    ));
    let response = app_with(configured(), upstream)
        .oneshot(request("POST"))
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("sk-live-secret"));
    assert!(logs_contain("upstream rejected session creation"));
    assert!(!logs_contain("sk-live-secret"));
}

#[tokio::test]
async fn healthz_is_no_content() {
    let upstream = Arc::new(MockSessionApi::replying(StatusCode::OK, json!({})));
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(app_with(configured(), upstream), request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unusable_base_url_fails_each_request_with_server_error() {
    let state = AppState::new(configured().with_api_base("::nope"), reqwest::Client::new());
    let app = router(state);

    for _ in 0..2 {
        let (status, headers, body) = send(app.clone(), request("POST")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to create ChatKit session");
        assert_eq!(headers["access-control-allow-origin"], "*");
    }
}
