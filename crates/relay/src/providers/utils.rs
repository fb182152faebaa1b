use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::CompletionRequest;
use crate::errors::ProviderError;
use crate::models::role::Role;

lazy_static! {
    static ref MARKDOWN_DATA_IMAGE: Regex =
        Regex::new(r"!\[([^\]]*)\]\(data:image/[^)]+\)").unwrap();
    static ref BARE_DATA_IMAGE: Regex =
        Regex::new(r"data:image/[a-zA-Z]+;base64,[A-Za-z0-9+/=]{100,}").unwrap();
}

/// Replace inline image payloads in history text with short placeholders.
/// A single generated image can be megabytes of base64; forwarding it back
/// upstream blows the context window on the next turn.
pub fn strip_inline_images(text: &str) -> String {
    let text = MARKDOWN_DATA_IMAGE.replace_all(text, "[image: $1]");
    BARE_DATA_IMAGE.replace_all(&text, "[inline image removed]").to_string()
}

/// Convert a completion request to the chat-completions message array:
/// system turn first, then history, with the final user turn becoming
/// multi-part when image attachments are present.
pub fn to_openai_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut out = vec![json!({
        "role": "system",
        "content": request.system,
    })];

    let last = request.messages.len().saturating_sub(1);
    for (index, message) in request.messages.iter().enumerate() {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let text = if index == last {
            message.concat_text()
        } else {
            strip_inline_images(&message.concat_text())
        };

        let images: Vec<&crate::models::attachment::Attachment> = request
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .collect();
        if index == last && message.role == Role::User && !images.is_empty() {
            let mut parts = vec![json!({"type": "text", "text": text})];
            for attachment in images {
                if let Some(url) = attachment.source_url() {
                    parts.push(json!({
                        "type": "image_url",
                        "image_url": {"url": url, "detail": "auto"},
                    }));
                }
            }
            out.push(json!({"role": role, "content": parts}));
        } else {
            out.push(json!({"role": role, "content": text}));
        }
    }

    out
}

/// Convert a completion request to the messages-API array. The system prompt
/// is NOT part of this list (it travels as a separate field) and empty turns
/// are dropped, which the API rejects. Inline attachments use the nested
/// base64 source shape, remote ones the url source shape.
pub fn to_anthropic_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut out = Vec::new();

    let last = request.messages.len().saturating_sub(1);
    for (index, message) in request.messages.iter().enumerate() {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let text = if index == last {
            message.concat_text()
        } else {
            strip_inline_images(&message.concat_text())
        };
        if text.trim().is_empty() {
            continue;
        }

        let images: Vec<&crate::models::attachment::Attachment> = request
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .collect();
        if index == last && message.role == Role::User && !images.is_empty() {
            let mut parts = vec![json!({"type": "text", "text": text})];
            for attachment in images {
                if let Some((media_type, data)) = attachment.inline_parts() {
                    parts.push(json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": media_type,
                            "data": data,
                        },
                    }));
                } else if let Some(url) = &attachment.url {
                    parts.push(json!({
                        "type": "image",
                        "source": {"type": "url", "url": url},
                    }));
                }
            }
            out.push(json!({"role": role, "content": parts}));
        } else {
            out.push(json!({"role": role, "content": text}));
        }
    }

    out
}

/// Map a non-2xx upstream response to a typed provider error, keeping the
/// upstream text so exhausted-fallback classification can inspect it.
pub fn error_from_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = if body.is_empty() {
        format!("status {}", status)
    } else {
        format!("status {}: {}", status, body)
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Authentication(detail)
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(detail),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            let lowered = body.to_lowercase();
            if lowered.contains("too long")
                || lowered.contains("too many tokens")
                || lowered.contains("context_length")
                || lowered.contains("maximum context")
            {
                ProviderError::ContextLengthExceeded(detail)
            } else {
                ProviderError::RequestFailed(detail)
            }
        }
        status if status.is_server_error() => ProviderError::ServerError(detail),
        _ => ProviderError::RequestFailed(detail),
    }
}

/// Strip the SSE `data:` framing from one line, if present.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
