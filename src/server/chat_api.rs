//! Chat HTTP API.
//!
//! - POST /chat
//! - POST /stream_chat
//! - GET /health

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::inference::engine::{ChatEngine, GenerationRequest, Message};
use crate::server::error::ServiceError;
use crate::server::streaming::fragments_to_response;

/// Application state shared across handlers.
pub struct AppState {
    pub engine: Arc<dyn ChatEngine>,
    pub model: ModelConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<dyn ChatEngine>, model: ModelConfig) -> Self {
        Self {
            engine,
            model,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Credentials rule out a literal `*`, so the request's own values are echoed.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/chat", post(chat))
        .route("/stream_chat", post(stream_chat))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;
pub const DEFAULT_TOP_P: f64 = 0.7;
pub const DEFAULT_TEMPERATURE: f64 = 0.95;

/// Chat request body, shared by both chat endpoints.
///
/// Generation parameters that are missing or `null` take their defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl TryFrom<ChatRequest> for GenerationRequest {
    type Error = ServiceError;

    fn try_from(req: ChatRequest) -> Result<Self, Self::Error> {
        let max_new_tokens = req.max_new_tokens.unwrap_or(DEFAULT_MAX_NEW_TOKENS);
        let top_p = req.top_p.unwrap_or(DEFAULT_TOP_P);
        let temperature = req.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        if max_new_tokens == 0 {
            return Err(ServiceError::invalid("max_new_tokens must be a positive integer"));
        }
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ServiceError::invalid("top_p must be between 0 and 1"));
        }
        if temperature.is_nan() || temperature < 0.0 {
            return Err(ServiceError::invalid("temperature must be non-negative"));
        }

        Ok(GenerationRequest {
            messages: req.messages,
            system: req.system,
            tools: req.tools,
            image: req.image,
            video: req.video,
            max_new_tokens,
            top_p,
            temperature,
        })
    }
}

/// Unary chat response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
    pub finish_reason: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub backend: String,
    pub template: String,
    pub engine: String,
    pub uptime_secs: u64,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ServiceError> {
    let Json(req) = payload?;
    let request_id = Uuid::new_v4();
    let request = GenerationRequest::try_from(req)?;

    info!(
        %request_id,
        messages = request.messages.len(),
        max_new_tokens = request.max_new_tokens,
        "Chat request"
    );

    let candidates = state.engine.complete(&request).await.map_err(|e| {
        error!(%request_id, error = %e, "Chat generation failed");
        ServiceError::Engine(e)
    })?;

    let Some(first) = candidates.into_iter().next() else {
        error!(%request_id, "Engine returned no candidates");
        return Err(ServiceError::NoResponse);
    };

    info!(%request_id, finish_reason = %first.finish_reason, "Chat complete");

    Ok(Json(ChatResponse {
        response: first.response_text,
        finish_reason: first.finish_reason,
    }))
}

async fn stream_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(req) = payload?;
    let request_id = Uuid::new_v4();
    let request = GenerationRequest::try_from(req)?;

    info!(
        %request_id,
        messages = request.messages.len(),
        max_new_tokens = request.max_new_tokens,
        "Streaming chat request"
    );

    let fragments = state.engine.stream(&request).await.map_err(|e| {
        error!(%request_id, error = %e, "Stream setup failed");
        ServiceError::Engine(e)
    })?;

    Ok(fragments_to_response(fragments, request_id))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model.model_name_or_path.clone(),
        backend: state.model.infer_backend.to_string(),
        template: state.model.template.clone(),
        engine: state.engine.name().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
