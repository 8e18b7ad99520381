// src/api.rs
//! HTTP surface: `POST /api/chat` (streamed protocol lines), `GET /health`,
//! and the exported frontend when present.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::agent::load_agent_definition;
use crate::chat::{ChatOrchestrator, ChatRequest, ChatResponse};
use crate::config::AppConfig;
use crate::frames;
use crate::generation::build_generator;
use crate::sela::SelaClient;

pub const ACTIVITY_LOG_HEADER: &str = "x-activity-log";
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: ChatOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Production wiring: Sela fetcher, OpenAI (or mock) generator, agent file.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(SelaClient::new(&cfg.sela)?);
        let generator = build_generator(&cfg.openai)?;
        let system = load_agent_definition(&cfg.agent_path);
        tracing::info!(
            provider = generator.provider_name(),
            model = %cfg.openai.model,
            openai_key_len = cfg.openai.api_key.len(),
            sela_key_len = cfg.sela.api_key.len(),
            "app state ready"
        );
        Ok(Self::new(ChatOrchestrator::new(fetcher, generator, system)))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/chat", post(chat))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serve the exported frontend from `dir`, falling back to `index.html` for
/// client-side routes. No-op when the directory does not exist.
pub fn with_static_frontend(router: Router, dir: &str) -> Router {
    let root = Path::new(dir);
    if !root.is_dir() {
        tracing::info!(dir, "static dir missing, frontend not served");
        return router;
    }
    let spa = ServeDir::new(root).fallback(ServeFile::new(root.join("index.html")));
    router.fallback_service(spa)
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(r)) => r,
        Err(rej) => {
            tracing::debug!(error = %rej, "rejected chat body");
            return bad_request("Invalid request: messages array required");
        }
    };

    let ChatResponse {
        activity_log,
        frames: frame_stream,
    } = state.orchestrator.respond(req.messages).await;

    let body = Body::from_stream(frame_stream.map(|f| Ok::<_, Infallible>(frames::encode(&f))));

    let mut resp = Response::new(body);
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static("v1"));
    match HeaderValue::from_str(&activity_log) {
        Ok(v) => {
            headers.insert(ACTIVITY_LOG_HEADER, v);
        }
        Err(e) => {
            // header_json only emits printable ASCII
            tracing::warn!(error = %e, bytes = activity_log.len(), "activity log not a valid header value");
            headers.insert(ACTIVITY_LOG_HEADER, HeaderValue::from_static("[]"));
        }
    }
    resp
}
