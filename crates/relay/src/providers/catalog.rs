use serde::{Deserialize, Serialize};

/// The request/response shape convention a provider's API follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Chat-completions style: one messages array including the system turn,
    /// SSE events carrying `choices[0].delta.content`.
    OpenAiCompat,
    /// Messages style: separate system field, SSE events discriminated by
    /// `type`, text arriving in `content_block_delta` events.
    Anthropic,
}

/// Static description of one upstream provider: where to reach it, how it
/// speaks, and which models it serves in roster order.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub name: String,
    pub display_name: String,
    pub wire_format: WireFormat,
    pub host: String,
    pub models: Vec<String>,
    pub quick_model: String,
    pub advanced_model: String,
}

impl ProviderProfile {
    pub fn new(
        name: &str,
        display_name: &str,
        wire_format: WireFormat,
        host: &str,
        models: &[&str],
        quick_model: &str,
        advanced_model: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            wire_format,
            host: host.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
            quick_model: quick_model.to_string(),
            advanced_model: advanced_model.to_string(),
        }
    }
}

/// The provider used when nothing else is requested or configured. Its
/// credential may have a secondary fallback (see `credentials`).
pub const PRIMARY_PROVIDER: &str = "openai";

/// Read-only table of the supported providers, loaded once and shared.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    profiles: Vec<ProviderProfile>,
}

impl ProviderCatalog {
    pub fn new(profiles: Vec<ProviderProfile>) -> Self {
        Self { profiles }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            ProviderProfile::new(
                "openai",
                "OpenAI",
                WireFormat::OpenAiCompat,
                "https://api.openai.com",
                &[
                    "gpt-4.1",
                    "gpt-4.1-mini",
                    "gpt-4o",
                    "gpt-4o-mini",
                    "gpt-4-turbo",
                ],
                "gpt-4.1-mini",
                "gpt-4.1",
            ),
            ProviderProfile::new(
                "anthropic",
                "Anthropic",
                WireFormat::Anthropic,
                "https://api.anthropic.com",
                &[
                    "claude-sonnet-4-20250514",
                    "claude-3-5-sonnet-20241022",
                    "claude-3-5-haiku-20241022",
                    "claude-3-haiku-20240307",
                ],
                "claude-3-5-haiku-20241022",
                "claude-sonnet-4-20250514",
            ),
            ProviderProfile::new(
                "mistral",
                "Mistral AI",
                WireFormat::OpenAiCompat,
                "https://api.mistral.ai",
                &[
                    "mistral-large-2501",
                    "mistral-small-2501",
                    "mistral-large-latest",
                    "mistral-small-latest",
                ],
                "mistral-small-2501",
                "mistral-large-2501",
            ),
            ProviderProfile::new(
                "xai",
                "xAI",
                WireFormat::OpenAiCompat,
                "https://api.x.ai",
                &["grok-3", "grok-3-fast", "grok-3-mini", "grok-2"],
                "grok-3-mini",
                "grok-3-fast",
            ),
            ProviderProfile::new(
                "groq",
                "Groq",
                WireFormat::OpenAiCompat,
                "https://api.groq.com/openai",
                &[
                    "llama-3.3-70b-versatile",
                    "llama-3.1-8b-instant",
                    "mixtral-8x7b-32768",
                ],
                "llama-3.1-8b-instant",
                "llama-3.3-70b-versatile",
            ),
            ProviderProfile::new(
                "cerebras",
                "Cerebras",
                WireFormat::OpenAiCompat,
                "https://api.cerebras.ai",
                &["llama-3.3-70b", "llama3.1-8b", "llama3.1-70b"],
                "llama3.1-8b",
                "llama-3.3-70b",
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }
}
