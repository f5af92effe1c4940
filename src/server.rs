//! HTTP surface of the relay.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::data::RoleTable;
use crate::error::RelayError;
use crate::models::ChatRequest;
use crate::openai::{RelayRequest, Upstream};
use crate::relay::relay;

#[derive(Clone)]
pub struct AppState {
    pub roles: Arc<RoleTable>,
    pub upstream: Upstream,
    pub buffer: usize,
}

impl AppState {
    pub fn new(config: &RelayConfig, roles: RoleTable) -> Result<Self, RelayError> {
        Ok(AppState {
            roles: Arc::new(roles),
            upstream: Upstream::new(config)?,
            buffer: config.buffer,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/roles", get(roles))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(config: RelayConfig) -> Result<(), RelayError> {
    if config.api_key.is_none() {
        warn!("[SERVER] GROQ_API_KEY is not set, chat requests will fail");
    }

    let state = AppState::new(&config, RoleTable::default())?;
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| RelayError::Config(format!("bind {}: {}", config.addr, e)))?;

    info!("[SERVER] listening on {}", config.addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| RelayError::Internal(e.to_string()))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn roles(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "roles": state.roles.names() }))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    match relay_chat(&state, &body).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_client_error() {
                warn!("[SERVER] rejected chat request: {}", e);
            } else {
                error!("[SERVER] chat request failed: {}", e);
            }
            e.into_response()
        }
    }
}

async fn relay_chat(state: &AppState, body: &[u8]) -> Result<Response, RelayError> {
    let payload: ChatRequest =
        serde_json::from_slice(body).map_err(|e| RelayError::Internal(e.to_string()))?;

    let request = RelayRequest::from_chat(&state.roles, &payload)?;

    let upstream = state.upstream.send_request(&request).await?;
    let text = relay(upstream, state.buffer);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(text))
        .map_err(|e| RelayError::Internal(e.to_string()))
}
