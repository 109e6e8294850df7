//! Request handlers for the OpenAI-compatible routes.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use ccbridge_core::StreamTranslator;
use ccbridge_core::ndjson::SessionResult;
use ccbridge_core::openai::{ChatCompletionRequest, CompletionRequest, ModelList, unix_timestamp};
use ccbridge_core::prompt::{legacy_prompt_text, messages_to_prompt};
use ccbridge_core::translate::{chat_response, completion_response};

use super::AppState;
use super::error::ApiError;
use crate::emitter::{SseEmitter, StreamFormat};
use crate::session::StreamSession;

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ApiError::invalid_request("messages array is required"));
    }

    let id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    let prompt = messages_to_prompt(&request.messages);
    info!(
        request_id = %id,
        requested_model = request.model.as_deref().unwrap_or_default(),
        messages = request.messages.len(),
        stream = request.is_stream(),
        "chat completion request"
    );

    if request.is_stream() {
        return start_stream(&state, StreamFormat::Chat, id, &prompt).await;
    }
    let result = run_to_completion(&state, &prompt).await?;
    Ok(Json(chat_response(&result, &id, &state.config.model_label)).into_response())
}

/// `POST /v1/completions`
pub async fn completions(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let id = format!("cmpl-{}", Uuid::new_v4().simple());
    let prompt = legacy_prompt_text(&request.prompt);
    info!(
        request_id = %id,
        requested_model = request.model.as_deref().unwrap_or_default(),
        stream = request.is_stream(),
        "completion request"
    );

    if request.is_stream() {
        return start_stream(&state, StreamFormat::Legacy, id, &prompt).await;
    }
    let result = run_to_completion(&state, &prompt).await?;
    Ok(Json(completion_response(&result, &id, &state.config.model_label)).into_response())
}

/// `GET /v1/models`
pub async fn models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::single(&state.config.model_label, unix_timestamp()))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Fallback for known paths hit with the wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Spawn the CLI and hand the session to a supervised task.
///
/// Spawn and stdin errors surface here as a JSON error, before any SSE
/// bytes are committed.
async fn start_stream(
    state: &AppState,
    format: StreamFormat,
    id: String,
    prompt: &str,
) -> Result<Response, ApiError> {
    let process = state.executor.spawn_streaming(prompt).await?;

    let cancel = state.shutdown.child_token();
    let (emitter, body) = SseEmitter::channel(format, &cancel, state.config.frame_buffer);
    let translator = StreamTranslator::new(id, state.config.model_label.clone());
    let session = StreamSession::new(translator, emitter, cancel, state.config.max_line_bytes);
    state.sessions.spawn(session.run(process));

    Ok(body.into_response())
}

async fn run_to_completion(state: &AppState, prompt: &str) -> Result<SessionResult, ApiError> {
    let result = state.executor.run_json(prompt).await?;
    debug!(
        session_id = ?result.session_id,
        duration_ms = ?result.duration_ms,
        num_turns = ?result.num_turns,
        total_cost_usd = ?result.total_cost_usd,
        "claude result received"
    );
    if result.is_error {
        return Err(ApiError::internal(result.text()));
    }
    Ok(result)
}
