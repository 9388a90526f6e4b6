use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use stayfinder_agent::{AgentError, AgentMessage, AgentResponse, Runnable};
use stayfinder_server::serve::router;

struct CannedAgent;

#[async_trait]
impl Runnable for CannedAgent {
    fn name(&self) -> &str {
        "CannedAgent"
    }

    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        Ok(AgentResponse {
            messages: vec![AgentMessage {
                author: "CannedAgent".to_string(),
                text: format!("echo: {input}"),
            }],
        })
    }
}

struct FailingAgent;

#[async_trait]
impl Runnable for FailingAgent {
    fn name(&self) -> &str {
        "FailingAgent"
    }

    async fn run(&self, _input: &str) -> Result<AgentResponse, AgentError> {
        Err(AgentError::Protocol("backend unreachable".to_string()))
    }
}

fn post_responses(input: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/responses")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "input": input }).to_string()))
        .expect("request should build")
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn responses_endpoint_returns_agent_messages() {
    let app = router(Arc::new(CannedAgent));

    let response =
        app.oneshot(post_responses("find me a hotel")).await.expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response.into_body()).await;
    assert_eq!(payload["messages"][0]["author"], "CannedAgent");
    assert_eq!(payload["messages"][0]["text"], "echo: find me a hotel");
}

#[tokio::test]
async fn agent_failure_maps_to_bad_gateway() {
    let app = router(Arc::new(FailingAgent));

    let response = app.oneshot(post_responses("anything")).await.expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = body_json(response.into_body()).await;
    assert!(payload["error"].as_str().expect("error text").contains("backend unreachable"));
}

#[tokio::test]
async fn health_endpoint_reports_ready() {
    let app = router(Arc::new(CannedAgent));

    let request =
        Request::builder().uri("/health").body(Body::empty()).expect("request should build");
    let response = app.oneshot(request).await.expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response.into_body()).await;
    assert_eq!(payload["status"], "ready");
    assert_eq!(payload["agent"], "CannedAgent");
}
