use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

use stayfinder_agent::{AgentMessage, Runnable};
use stayfinder_core::config::ServerConfig;

#[derive(Clone)]
pub struct ServeState {
    agent: Arc<dyn Runnable>,
}

#[derive(Debug, Deserialize)]
pub struct RunInput {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub messages: Vec<AgentMessage>,
}

#[derive(Debug, Serialize)]
pub struct RunFailure {
    pub error: String,
}

/// The request/response schema here is deliberately minimal: one input string
/// in, the ordered agent messages out. The hosted adapter this stands in for
/// owns the full wire contract.
pub fn router(agent: Arc<dyn Runnable>) -> Router {
    let agent_name = agent.name().to_string();

    Router::new()
        .route("/v1/responses", post(responses))
        .with_state(ServeState { agent })
        .merge(crate::health::router(agent_name))
}

pub async fn responses(
    State(state): State<ServeState>,
    Json(payload): Json<RunInput>,
) -> Result<Json<RunOutput>, (StatusCode, Json<RunFailure>)> {
    match state.agent.run(&payload.input).await {
        Ok(response) => Ok(Json(RunOutput { messages: response.messages })),
        Err(failure) => {
            error!(
                event_name = "server.responses.error",
                agent = %state.agent.name(),
                error = %failure,
                "agent run failed"
            );
            Err((StatusCode::BAD_GATEWAY, Json(RunFailure { error: failure.to_string() })))
        }
    }
}

/// Exposes the agent on the configured address and blocks until shutdown.
/// After ctrl-c, open connections get `graceful_shutdown_secs` to drain.
pub async fn serve(agent: Arc<dyn Runnable>, server: &ServerConfig) -> anyhow::Result<()> {
    let address = format!("{}:{}", server.bind_address, server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "server.started",
        bind_address = %address,
        agent = %agent.name(),
        "agent server listening"
    );

    let drain_limit = Duration::from_secs(server.graceful_shutdown_secs);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let graceful = axum::serve(listener, router(agent))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!(event_name = "server.shutdown.signal", "shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .into_future();
    tokio::pin!(graceful);

    tokio::select! {
        result = &mut graceful => result?,
        _ = async {
            let _ = shutdown_rx.wait_for(|fired| *fired).await;
            tokio::time::sleep(drain_limit).await;
        } => {
            warn!(
                event_name = "server.shutdown.drain_timeout",
                "open connections did not drain before the deadline"
            );
        }
    }

    info!(event_name = "server.stopped", "agent server stopped");
    Ok(())
}
