use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use relay::intent::{self, Intent};
use relay::models::attachment::Attachment;
use relay::models::message::Message;
use relay::orchestrator::{self, ChatReply};
use relay::providers::base::CompletionRequest;
use relay::resolver::{self, ChatMode};
use relay::tasks::convert;
use relay::tasks::files::FileStore;
use relay::tasks::image::ImageBackend;
use serde::Deserialize;
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    /// Nested overrides from the chat settings panel; these win over the
    /// top-level provider/model fields.
    #[serde(default)]
    settings: Option<ChatSettings>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<i32>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    mode: ChatMode,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatSettings {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    role: String,
    content: String,
}

// Agents must not disclaim abilities the platform provides on their behalf.
const CAPABILITY_NOTE: &str = "You can create and edit images: when the user asks \
for one, acknowledge the request and the platform will generate or edit it. Do \
not say you cannot create or edit images, and do not point the user at external \
tools.";

/// Custom SSE response streaming line-framed events out of an mpsc channel.
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("X-Accel-Buffering", "no")
            .body(body)
            .unwrap()
    }
}

struct ErrorReply {
    status: StatusCode,
    message: &'static str,
}

impl ErrorReply {
    fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded. Please try again later.",
        }
    }
}

impl IntoResponse for ErrorReply {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

fn frame(value: serde_json::Value) -> String {
    format!("data: {}\n\n", value)
}

fn caller_key(request: &ChatRequest, headers: &HeaderMap) -> String {
    if let Some(user_id) = request.user_id.as_deref().filter(|id| !id.is_empty()) {
        return format!("chat-{}", user_id);
    }
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown");
    format!("chat-{}", ip.trim())
}

// Convert incoming history to internal messages; unknown roles (e.g. system
// snapshots some clients send) are dropped, the system prompt travels
// separately.
fn convert_history(history: &[HistoryMessage]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|msg| match msg.role.as_str() {
            "user" => Some(Message::user().with_text(msg.content.clone())),
            "assistant" => Some(Message::assistant().with_text(msg.content.clone())),
            _ => None,
        })
        .collect()
}

async fn send_message(tx: &mpsc::Sender<String>, message: String) {
    let _ = tx.send(frame(json!({"token": message}))).await;
}

async fn stream_chat(
    state: &AppState,
    request: &ChatRequest,
    history: Vec<Message>,
    tx: &mpsc::Sender<String>,
) {
    let provider_override = request
        .settings
        .as_ref()
        .and_then(|s| s.provider.clone())
        .or_else(|| request.provider.clone());
    let model_override = request
        .settings
        .as_ref()
        .and_then(|s| s.model.clone())
        .or_else(|| request.model.clone());

    let selection = resolver::resolve(
        &state.registry,
        &state.catalog,
        request.agent_id.as_deref(),
        provider_override.as_deref(),
        model_override.as_deref(),
        request.mode,
    );

    let system = format!(
        "{}\n\n{}",
        state.registry.system_prompt(request.agent_id.as_deref()),
        CAPABILITY_NOTE
    );

    let mut messages = history;
    messages.push(Message::user().with_text(request.message.clone()));

    let completion = CompletionRequest::new(system, messages)
        .with_attachments(request.attachments.clone())
        .with_sampling(
            request.temperature.unwrap_or(0.7),
            request.max_tokens.unwrap_or(1200),
        );

    match orchestrator::stream_with_fallback(
        &state.catalog,
        &state.failures,
        &selection,
        &completion,
    )
    .await
    {
        ChatReply::Stream { mut tokens, .. } => {
            while let Some(token) = tokens.next().await {
                match token {
                    Ok(token) => {
                        if tx.send(frame(json!({"token": token.text}))).await.is_err() {
                            // caller went away; stop consuming upstream
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("mid-stream failure: {}", e);
                        let _ = tx
                            .send(frame(json!({"error": format!("Streaming failed: {}", e)})))
                            .await;
                        break;
                    }
                }
            }
        }
        ChatReply::Classified(message) => send_message(tx, message).await,
    }
}

async fn run_turn(state: AppState, request: ChatRequest, tx: mpsc::Sender<String>) {
    let history = convert_history(&request.conversation_history);
    let intent = intent::classify(&request.message, &request.attachments, &history);

    match intent {
        Intent::ConvertImage { format, source } => {
            let message = convert::convert(&source, format).await;
            send_message(&tx, message).await;
        }
        Intent::FileOp(file_request) => {
            let user_id = request.user_id.clone().unwrap_or_else(|| "default".to_string());
            let message = FileStore::new(&state.storage_url)
                .handle(&file_request, &user_id)
                .await;
            send_message(&tx, message).await;
        }
        Intent::EditImage { source } => match ImageBackend::from_env() {
            Some(backend) => {
                let message = backend.edit_message(&request.message, &source).await;
                send_message(&tx, message).await;
            }
            // no image credential: treat as an unmet precondition
            None => stream_chat(&state, &request, history, &tx).await,
        },
        Intent::GenerateImage => match ImageBackend::from_env() {
            Some(backend) => {
                let message = backend.generate_message(&request.message).await;
                send_message(&tx, message).await;
            }
            None => stream_chat(&state, &request, history, &tx).await,
        },
        Intent::Chat => stream_chat(&state, &request, history, &tx).await,
    }

    let _ = tx.send(frame(json!({"done": true}))).await;
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, ErrorReply> {
    let decision = state
        .rate_limiter
        .check_and_consume(&caller_key(&request, &headers));
    if !decision.allowed {
        return Err(ErrorReply::rate_limited());
    }

    if request.message.trim().is_empty() {
        return Err(ErrorReply::bad_request("Message is required"));
    }

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    // Run the turn in its own task; a panic anywhere inside becomes one
    // generic transport error and a clean close instead of a hung stream.
    tokio::spawn(async move {
        let guard = tx.clone();
        if let Err(e) = tokio::spawn(run_turn(state, request, tx)).await {
            tracing::error!("reply task failed: {}", e);
            let _ = guard
                .send(frame(json!({"error": "Internal error while streaming"})))
                .await;
            let _ = guard.send(frame(json!({"done": true}))).await;
        }
    });

    Ok(SseResponse::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new().route("/reply", post(handler)).with_state(state)
}
