use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::errors::ProviderError;
use crate::models::attachment::Attachment;
use crate::models::message::Message;

/// One incremental chunk of generated text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamToken {
    pub text: String,
}

impl StreamToken {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }
}

/// Tokens as they arrive from upstream, in generation order, each exactly once.
pub type TokenStream = BoxStream<'static, Result<StreamToken, ProviderError>>;

/// A single chat completion call, independent of the upstream wire format.
/// Attachments belong to the final user turn; the adapters encode them.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub attachments: Vec<Attachment>,
    pub temperature: f32,
    pub max_tokens: i32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system: system.into(),
            messages,
            attachments: Vec::new(),
            temperature: 0.7,
            max_tokens: 1200,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: i32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// Base trait for streaming chat providers (OpenAI-compatible, Anthropic).
///
/// An adapter opens the upstream call, checks the response status, and then
/// re-emits normalized text tokens as the body arrives. Failures before the
/// stream starts are returned as `ProviderError` so the caller can try the
/// next candidate model.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn stream_chat(&self, request: &CompletionRequest)
        -> Result<TokenStream, ProviderError>;
}
