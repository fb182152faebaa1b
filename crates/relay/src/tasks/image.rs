use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::classify::{self, ErrorKind};
use crate::intent::ImageSource;
use crate::providers::credentials;

/// Upper bound for one synthesis call; rendering regularly takes tens of
/// seconds.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

const IMAGE_MODEL: &str = "dall-e-3";
const VISION_MODEL: &str = "gpt-4o";
const DESCRIPTION_MAX_TOKENS: i32 = 500;
const DESCRIPTION_CHAR_BUDGET: usize = 2500;
const REQUEST_CHAR_BUDGET: usize = 500;
const PROMPT_CHAR_BUDGET: usize = 4000;

lazy_static! {
    static ref BOILERPLATE: Vec<Regex> = [
        r"(?i)create\s+(an?\s+)?image\s+(of\s+)?",
        r"(?i)generate\s+(an?\s+)?image\s+(of\s+)?",
        r"(?i)make\s+(an?\s+)?image\s+(of\s+)?",
        r"(?i)draw\s+(an?\s+)?",
        r"(?i)create\s+(an?\s+)?picture\s+(of\s+)?",
        r"(?i)generate\s+(an?\s+)?picture\s+(of\s+)?",
        r"(?i)please",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

/// Strip the request phrasing so only the scene description reaches the
/// synthesis backend.
pub fn synthesis_prompt(message: &str) -> String {
    let mut prompt = message.to_string();
    for pattern in BOILERPLATE.iter() {
        prompt = pattern.replace_all(&prompt, "").to_string();
    }
    let prompt = prompt.trim();
    if prompt.is_empty() {
        message.to_string()
    } else {
        prompt.to_string()
    }
}

fn truncate(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        text.to_string()
    } else {
        text.chars().take(budget).collect()
    }
}

fn image_failure(raw: &str) -> String {
    let kind = match classify::classify(raw) {
        ErrorKind::ApiError => ErrorKind::ImageGenerationFailed,
        other => other,
    };
    classify::render(kind, Some(raw), None)
}

/// Client for the image synthesis backend and its vision sibling. Created
/// per call; absence of a credential is a precondition miss handled by the
/// caller, not an error.
pub struct ImageBackend {
    client: Client,
    host: String,
    api_key: String,
}

impl ImageBackend {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Option<Self> {
        let client = Client::builder().timeout(GENERATION_TIMEOUT).build().ok()?;
        Some(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_env() -> Option<Self> {
        let api_key = credentials::api_key("openai")?;
        Self::new("https://api.openai.com", api_key)
    }

    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/v1/images/generations",
            self.host.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": IMAGE_MODEL,
                "prompt": prompt,
                "n": 1,
                "size": "1024x1024",
                "quality": "standard",
                "style": "vivid",
                "response_format": "b64_json",
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(body);
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        parsed["data"][0]["b64_json"]
            .as_str()
            .map(|b64| b64.to_string())
            .ok_or_else(|| "image backend returned no image data".to_string())
    }

    async fn describe(&self, image_url: &str, user_request: &str) -> Result<String, String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.host.trim_end_matches('/')
        );
        let instruction = format!(
            "Briefly describe this image for recreation (max 150 words). Include: \
main subject, colors, style, background. User wants to: {}",
            truncate(user_request, 200)
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": VISION_MODEL,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": instruction},
                        {"type": "image_url", "image_url": {"url": image_url, "detail": "high"}},
                    ],
                }],
                "max_tokens": DESCRIPTION_MAX_TOKENS,
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(body);
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        let description = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(truncate(&description, DESCRIPTION_CHAR_BUDGET))
    }

    /// Synthesize one image from the message and embed it as a single
    /// assistant message, skipping the chat path.
    pub async fn generate_message(&self, message: &str) -> String {
        let prompt = synthesis_prompt(message);
        match self.generate(&prompt).await {
            Ok(b64) => {
                let filename = format!("generated-image-{}.png", Uuid::new_v4());
                format!(
                    "**Image generated successfully.**\n\n![{}](data:image/png;base64,{})\n\n\
*Hover over the image to download, or right-click to save.*",
                    filename, b64
                )
            }
            Err(raw) => image_failure(&raw),
        }
    }

    /// Edit = describe the source within a character budget, fold in the
    /// requested change, and synthesize a new image from the combined prompt.
    pub async fn edit_message(&self, message: &str, source: &ImageSource) -> String {
        let Some(image_url) = source.url() else {
            return classify::render(ErrorKind::ImageFormat, None, None);
        };

        let description = match self.describe(&image_url, message).await {
            Ok(description) => description,
            Err(raw) => return image_failure(&raw),
        };

        let prompt = truncate(
            &format!(
                "Recreate this image with modifications: {}\n\nApply this change: {}",
                description,
                truncate(message, REQUEST_CHAR_BUDGET)
            ),
            PROMPT_CHAR_BUDGET,
        );

        match self.generate(&prompt).await {
            Ok(b64) => {
                let filename = format!("edited-image-{}.png", Uuid::new_v4());
                format!(
                    "**Image edited successfully.**\n\n![{}](data:image/png;base64,{})\n\n\
*Hover over the image to download, or right-click to save.*",
                    filename, b64
                )
            }
            Err(raw) => image_failure(&raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_synthesis_prompt_strips_boilerplate() {
        assert_eq!(
            synthesis_prompt("create an image of a red bicycle"),
            "a red bicycle"
        );
        assert_eq!(
            synthesis_prompt("please generate a picture of a calm lake"),
            "a calm lake"
        );
        // nothing but boilerplate falls back to the raw message
        assert_eq!(synthesis_prompt("draw"), "draw");
    }

    #[tokio::test]
    async fn test_generate_message_embeds_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_string_contains("red bicycle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"b64_json": "aW1hZ2U=", "revised_prompt": "a red bicycle"}]
            })))
            .mount(&server)
            .await;

        let backend = ImageBackend::new(server.uri(), "test_api_key").unwrap();
        let message = backend
            .generate_message("create an image of a red bicycle")
            .await;

        assert!(message.contains("data:image/png;base64,aW1hZ2U="));
        assert!(message.contains("generated-image-"));
        assert!(message.contains(".png"));
    }

    #[tokio::test]
    async fn test_generate_message_renders_classified_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "{\"error\":{\"code\":\"content_policy_violation\",\"message\":\"rejected\"}}",
            ))
            .mount(&server)
            .await;

        let backend = ImageBackend::new(server.uri(), "test_api_key").unwrap();
        let message = backend.generate_message("create an image of something").await;

        assert!(message.contains("Image generation did not complete"));
        assert!(message.contains("What you can do:"));
    }

    #[tokio::test]
    async fn test_edit_message_describes_then_generates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "A small wooden boat on a lake."}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_string_contains("wooden boat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"b64_json": "ZWRpdA=="}]
            })))
            .mount(&server)
            .await;

        let backend = ImageBackend::new(server.uri(), "test_api_key").unwrap();
        let source = ImageSource::History("data:image/png;base64,AAAA".to_string());
        let message = backend
            .edit_message("make the sky more dramatic", &source)
            .await;

        assert!(message.contains("Image edited successfully"));
        assert!(message.contains("edited-image-"));
    }
}
