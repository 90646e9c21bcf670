//! Chat, routing and discovery endpoints.
//!
//! - `POST /api/chat`    — UI message-stream SSE reply
//! - `POST /api/stream`  — plain-text completion with no persona
//! - `GET  /api/agents`  — handler metadata
//! - `POST /api/route`   — routing preview
//! - `GET  /api/models`  — configured models and availability
//! - `GET  /api/events`  — SSE feed of domain events

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use forkreach_agents::{HandlerInfo, HandlerScore, STREAM_PROTOCOL_VERSION, StreamRequest};
use forkreach_core::context::SessionContext;
use forkreach_core::message::{Message, Turn, TurnRole};
use forkreach_core::provider::ProviderRequest;
use forkreach_providers::{ModelInfo, Resolution};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tracing::{debug, info, warn};

use crate::SharedState;
use crate::device::device_from_headers;
use crate::error::ApiError;

pub const STREAM_PROTOCOL_HEADER: &str = "x-vercel-ai-ui-message-stream";

// ── Request shapes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiMessage {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    /// The first non-empty text part.
    pub fn text(&self) -> Option<&str> {
        self.parts
            .iter()
            .filter(|p| p.kind == "text")
            .filter_map(|p| p.text.as_deref())
            .find(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub product_context: Option<SessionContext>,
    #[serde(default)]
    pub product_id: Option<String>,
}

impl ChatRequest {
    /// The text of the last user message.
    pub fn current_message(&self) -> String {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == "user")
            .find_map(UiMessage::text)
            .unwrap_or_default()
            .to_string()
    }

    /// Every message with text except the last one, as turns. Roles other
    /// than user and assistant are dropped.
    pub fn history(&self) -> Vec<Turn> {
        let texts: Vec<(&str, &str)> = self
            .messages
            .iter()
            .filter_map(|m| m.text().map(|t| (m.role.as_str(), t)))
            .collect();
        let earlier = &texts[..texts.len().saturating_sub(1)];

        earlier
            .iter()
            .filter_map(|(role, text)| {
                TurnRole::parse(role).map(|role| Turn {
                    role,
                    content: text.to_string(),
                })
            })
            .collect()
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────

/// `POST /api/chat`
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let context = resolve_context(&state, &headers, &payload).await?;
    let message = payload.current_message();
    let history = payload.history();

    info!(
        model = payload.model.as_deref().unwrap_or(state.streamer.backends().default_model()),
        agent_id = payload.agent_id.as_deref().unwrap_or("auto"),
        history_turns = history.len(),
        has_context = context.is_some(),
        "Chat request"
    );

    let request = StreamRequest {
        message,
        handler_id: payload.agent_id,
        model: payload.model,
        context,
        history,
    };

    let frames = state.streamer.stream(request);
    let stream = ReceiverStream::new(frames)
        .map(|frame| Ok::<_, Infallible>(SseEvent::default().data(frame.to_json())));

    Ok((
        [(STREAM_PROTOCOL_HEADER, STREAM_PROTOCOL_VERSION)],
        Sse::new(stream),
    )
        .into_response())
}

/// Inline context wins; otherwise a stored product is looked up for the device.
async fn resolve_context(
    state: &SharedState,
    headers: &HeaderMap,
    payload: &ChatRequest,
) -> Result<Option<SessionContext>, ApiError> {
    if let Some(ctx) = &payload.product_context {
        return Ok(Some(ctx.clone()));
    }
    let Some(product_id) = payload.product_id.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    let device = device_from_headers(headers).ok_or_else(|| {
        ApiError::BadRequest("X-Device-Id header is required with product_id".into())
    })?;
    let product = state
        .store
        .get_product(&device, product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;

    debug!(product = %product.id, "Using stored product context");
    Ok(Some(product.to_session_context()))
}

// ── Plain prompt stream ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

/// `POST /api/stream` — the default model's raw output as `text/plain`.
pub async fn prompt_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<PromptRequest>,
) -> Response {
    let (tx, rx) = mpsc::channel::<Result<String, Infallible>>(64);
    let backends = state.streamer.backends().clone();
    let settings = state.streamer.settings().clone();

    tokio::spawn(async move {
        let (provider, model) = match backends.resolve(None) {
            Resolution::Supported { provider, model } => (provider, model),
            Resolution::Unsupported { model } => {
                let _ = tx.send(Ok(format!("Error: model '{model}' is not available"))).await;
                return;
            }
        };

        let request = ProviderRequest {
            model,
            messages: vec![Message::user(payload.prompt)],
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stream: true,
            stop: Vec::new(),
        };

        let mut chunks = match provider.stream(request).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Prompt stream failed to start");
                let _ = tx.send(Ok(format!("Error: {e}"))).await;
                return;
            }
        };

        loop {
            match tokio::time::timeout(settings.chunk_timeout, chunks.recv()).await {
                Ok(Some(Ok(chunk))) => {
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    if chunk.done {
                        return;
                    }
                }
                Ok(Some(Err(e))) => {
                    let _ = tx.send(Ok(format!("Error: {e}"))).await;
                    return;
                }
                Ok(None) => return,
                Err(_) => {
                    let secs = settings.chunk_timeout.as_secs();
                    let _ = tx.send(Ok(format!("Error: no output received within {secs}s"))).await;
                    return;
                }
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

// ── Discovery ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<HandlerInfo>,
}

/// `GET /api/agents`
pub async fn agents_handler(State(state): State<SharedState>) -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: state.streamer.router().registry().infos(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub message: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub agent: HandlerInfo,
    pub score: f32,
    pub explicit: bool,
    pub scores: Vec<HandlerScore>,
}

/// `POST /api/route` — which handler would answer, without generating.
pub async fn route_handler(
    State(state): State<SharedState>,
    Json(payload): Json<RouteRequest>,
) -> Json<RouteResponse> {
    let router = state.streamer.router();
    let routed = router.route(&payload.message, payload.agent_id.as_deref());
    Json(RouteResponse {
        agent: routed.handler.info().clone(),
        score: routed.score,
        explicit: routed.explicit,
        scores: router.scores(&payload.message),
    })
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default: String,
    pub models: Vec<ModelInfo>,
}

/// `GET /api/models`
pub async fn models_handler(State(state): State<SharedState>) -> Json<ModelsResponse> {
    let backends = state.streamer.backends();
    Json(ModelsResponse {
        default: backends.default_model().to_string(),
        models: backends.models(),
    })
}

/// `GET /api/events` — domain events as they happen. Lagged events are skipped.
pub async fn events_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok::<_, Infallible>(SseEvent::default().event(event.name()).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ChatRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn current_message_is_last_user_text() {
        let req = request(serde_json::json!({
            "messages": [
                {"role": "user", "parts": [{"type": "text", "text": "first"}]},
                {"role": "assistant", "parts": [{"type": "text", "text": "reply"}]},
                {"role": "user", "parts": [{"type": "step-start"}, {"type": "text", "text": "second"}]}
            ]
        }));
        assert_eq!(req.current_message(), "second");

        let history = req.history();
        assert_eq!(history, vec![Turn::user("first"), Turn::assistant("reply")]);
    }

    #[test]
    fn history_takes_first_text_part_and_skips_textless() {
        let req = request(serde_json::json!({
            "messages": [
                {"role": "user", "parts": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]},
                {"role": "assistant", "parts": [{"type": "reasoning", "text": "hmm"}]},
                {"role": "system", "parts": [{"type": "text", "text": "sys"}]},
                {"role": "user", "parts": [{"type": "text", "text": "now"}]}
            ]
        }));
        assert_eq!(req.history(), vec![Turn::user("a")]);
    }

    #[test]
    fn empty_conversation_yields_empty_message() {
        let req = request(serde_json::json!({ "messages": [] }));
        assert_eq!(req.current_message(), "");
        assert!(req.history().is_empty());
    }

    #[test]
    fn product_context_deserializes_with_nulls() {
        let req = request(serde_json::json!({
            "messages": [],
            "product_context": {
                "name": "DevTodo", "tagline": null, "target_audience": null,
                "key_features": null, "brand_voice": "playful"
            }
        }));
        let ctx = req.product_context.unwrap();
        assert!(ctx.key_features.is_empty());
        assert_eq!(ctx.render(), "Product Name: DevTodo\nBrand Voice: playful");
    }
}
