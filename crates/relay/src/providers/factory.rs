use super::anthropic::AnthropicProvider;
use super::base::StreamingProvider;
use super::catalog::{ProviderProfile, WireFormat};
use super::openai::OpenAiCompatProvider;
use crate::errors::ProviderError;

/// Build the streaming adapter for a profile. New providers plug in here by
/// implementing an adapter for their wire family rather than branching in the
/// fallback loop.
pub fn get_provider(
    profile: &ProviderProfile,
    api_key: String,
    model: String,
) -> Result<Box<dyn StreamingProvider>, ProviderError> {
    match profile.wire_format {
        WireFormat::OpenAiCompat => Ok(Box::new(OpenAiCompatProvider::new(
            profile.name.clone(),
            profile.host.clone(),
            api_key,
            model,
        )?)),
        WireFormat::Anthropic => Ok(Box::new(AnthropicProvider::new(
            profile.host.clone(),
            api_key,
            model,
        )?)),
    }
}
