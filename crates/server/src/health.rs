use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    agent_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent: String,
    pub checked_at: String,
}

pub fn router(agent_name: String) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { agent_name })
}

/// The served agent holds no connections or pools to probe; reachability of
/// the process is the readiness signal.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        agent: state.agent_name.clone(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
