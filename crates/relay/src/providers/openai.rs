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
use super::utils::{error_from_status, sse_data, to_openai_messages};
use crate::errors::ProviderError;

/// Adapter for every provider speaking the chat-completions wire format
/// (openai, mistral, xai, groq, cerebras). Only the host, key and model
/// differ between them.
pub struct OpenAiCompatProvider {
    client: Client,
    name: String,
    host: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
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
            name: name.into(),
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl StreamingProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
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
            "messages": to_openai_messages(request),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        let url = format!("{}/v1/chat/completions", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status, &body));
        }

        // Decode the body line by line as it arrives; each SSE event carries
        // one incremental delta and is re-emitted immediately.
        let bytes = response.bytes_stream().map_err(io::Error::other);
        let stream: TokenStream = Box::pin(try_stream! {
            let reader = StreamReader::new(bytes);
            let mut lines = FramedRead::new(reader, LinesCodec::new());
            while let Some(next) = lines.next().await {
                let line = next.map_err(|e| {
                    ProviderError::NetworkError(format!("stream decode error: {}", e))
                })?;
                let Some(data) = sse_data(&line) else { continue };
                if data == "[DONE]" {
                    break;
                }
                let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                    if !delta.is_empty() {
                        yield StreamToken::new(delta);
                    }
                }
            }
        });
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            "You are a helpful assistant.",
            vec![Message::user().with_text("Hello?")],
        )
    }

    #[tokio::test]
    async fn test_stream_chat_emits_deltas_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .and(body_string_contains("\"stream\":true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let provider =
            OpenAiCompatProvider::new("openai", server.uri(), "test_api_key", "gpt-4.1-mini")
                .unwrap();
        let mut stream = provider.stream_chat(&request()).await.unwrap();

        let mut tokens = Vec::new();
        while let Some(token) = stream.next().await {
            tokens.push(token.unwrap().text);
        }
        assert_eq!(tokens, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_stream_chat_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limit reached"))
            .mount(&server)
            .await;

        let provider =
            OpenAiCompatProvider::new("openai", server.uri(), "test_api_key", "gpt-4.1-mini")
                .unwrap();
        let err = provider.stream_chat(&request()).await.err().unwrap();
        assert!(matches!(err, ProviderError::RateLimitExceeded(_)));
    }
}
