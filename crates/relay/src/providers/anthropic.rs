use async_stream::try_stream;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::io;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use super::base::{CompletionRequest, StreamToken, StreamingProvider, TokenStream};
use super::utils::{error_from_status, sse_data, to_anthropic_messages};
use crate::errors::ProviderError;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Adapter for the messages wire format: the system prompt travels as its own
/// field, the message list excludes system turns, and the event stream is
/// discriminated by `type` rather than a delta object.
pub struct AnthropicProvider {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl StreamingProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream_chat(
        &self,
        request: &CompletionRequest,
    ) -> Result<TokenStream, ProviderError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": to_anthropic_messages(request),
            "stream": true,
        });

        let url = format!("{}/v1/messages", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status, &body));
        }

        let bytes = response.bytes_stream().map_err(io::Error::other);
        let stream: TokenStream = Box::pin(try_stream! {
            let reader = StreamReader::new(bytes);
            let mut lines = FramedRead::new(reader, LinesCodec::new());
            while let Some(next) = lines.next().await {
                let line = next.map_err(|e| {
                    ProviderError::NetworkError(format!("stream decode error: {}", e))
                })?;
                let Some(data) = sse_data(&line) else { continue };
                let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                match event["type"].as_str() {
                    Some("content_block_delta") => {
                        if let Some(text) = event["delta"]["text"].as_str() {
                            if !text.is_empty() {
                                yield StreamToken::new(text);
                            }
                        }
                    }
                    Some("message_stop") => break,
                    // ping, message_start, content_block_start/stop, usage
                    _ => continue,
                }
            }
        });
        Ok(stream)
    }
}
