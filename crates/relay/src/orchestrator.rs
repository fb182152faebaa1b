//! Drives the streaming proxy across a prioritized candidate list of models
//! until one of them delivers a stream or the list is exhausted.

use tracing::{info, warn};

use crate::classify;
use crate::errors::ProviderError;
use crate::failover::ModelFailureCache;
use crate::providers::base::{CompletionRequest, TokenStream};
use crate::providers::catalog::{ProviderCatalog, ProviderProfile, PRIMARY_PROVIDER};
use crate::providers::{credentials, factory};
use crate::resolver::ModelSelection;

/// Outcome of one routed chat turn: a live token stream, or a terminal
/// classified message delivered as visible chat content.
pub enum ChatReply {
    Stream {
        provider: String,
        model: String,
        tokens: TokenStream,
    },
    Classified(String),
}

const MAX_EXTRA_CANDIDATES: usize = 3;

fn candidate_models(
    failures: &ModelFailureCache,
    profile: &ProviderProfile,
    requested: &str,
) -> Vec<String> {
    let mut candidates = vec![requested.to_string()];
    candidates.extend(
        failures
            .list_available(&profile.name, &profile.models, Some(requested))
            .into_iter()
            .take(MAX_EXTRA_CANDIDATES),
    );
    candidates
}

async fn try_candidates(
    failures: &ModelFailureCache,
    profile: &ProviderProfile,
    api_key: &str,
    candidates: &[String],
    request: &CompletionRequest,
) -> Result<(String, TokenStream), ProviderError> {
    let mut last_error = ProviderError::RequestFailed("no candidate models".to_string());

    for model in candidates {
        let provider = match factory::get_provider(profile, api_key.to_string(), model.clone())
        {
            Ok(provider) => provider,
            Err(e) => {
                last_error = e;
                continue;
            }
        };
        match provider.stream_chat(request).await {
            Ok(tokens) => {
                info!(provider = %profile.name, model = %model, "upstream stream opened");
                return Ok((model.clone(), tokens));
            }
            Err(e) => {
                warn!(provider = %profile.name, model = %model, error = %e, "candidate failed");
                failures.mark_failed(&profile.name, model);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Pick a provider that actually has a credential, preferring the selection,
/// then the primary provider, then anything else in catalog order.
fn usable_profile<'a>(
    catalog: &'a ProviderCatalog,
    selection: &ModelSelection,
) -> Option<(&'a ProviderProfile, bool)> {
    if credentials::has_credential(&selection.provider) {
        return catalog.get(&selection.provider).map(|p| (p, true));
    }
    if credentials::has_credential(PRIMARY_PROVIDER) {
        return catalog.get(PRIMARY_PROVIDER).map(|p| (p, false));
    }
    catalog
        .profiles()
        .iter()
        .find(|p| credentials::has_credential(&p.name))
        .map(|p| (p, false))
}

/// Attempt the requested model, then up to three alternates from the same
/// provider, recording each failure. If everything fails under the primary
/// provider's main credential and a secondary credential exists, the whole
/// candidate list is retried once under it before giving up with a
/// classified message.
pub async fn stream_with_fallback(
    catalog: &ProviderCatalog,
    failures: &ModelFailureCache,
    selection: &ModelSelection,
    request: &CompletionRequest,
) -> ChatReply {
    let Some((profile, selection_usable)) = usable_profile(catalog, selection) else {
        return ChatReply::Classified(classify::render_no_provider());
    };
    if !selection_usable {
        warn!(
            requested = %selection.provider,
            using = %profile.name,
            "requested provider has no credential, rerouting"
        );
    }

    let requested_model = if selection_usable {
        selection.model.clone()
    } else {
        profile.quick_model.clone()
    };
    let candidates = candidate_models(failures, profile, &requested_model);

    let api_key = match credentials::api_key(&profile.name) {
        Some(key) => key,
        None => return ChatReply::Classified(classify::render_no_provider()),
    };

    let primary_error =
        match try_candidates(failures, profile, &api_key, &candidates, request).await {
            Ok((model, tokens)) => {
                return ChatReply::Stream {
                    provider: profile.name.clone(),
                    model,
                    tokens,
                }
            }
            Err(e) => e,
        };

    if let Some(backup_key) = credentials::backup_api_key(&profile.name) {
        info!(provider = %profile.name, "all candidates failed, retrying with secondary credential");
        match try_candidates(failures, profile, &backup_key, &candidates, request).await {
            Ok((model, tokens)) => {
                return ChatReply::Stream {
                    provider: profile.name.clone(),
                    model,
                    tokens,
                }
            }
            Err(e) => {
                let raw = e.to_string();
                return ChatReply::Classified(classify::render(
                    classify::classify(&raw),
                    Some(&raw),
                    Some(&profile.display_name),
                ));
            }
        }
    }

    let raw = primary_error.to_string();
    ChatReply::Classified(classify::render(
        classify::classify(&raw),
        Some(&raw),
        Some(&profile.display_name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::providers::catalog::WireFormat;
    use futures::StreamExt;
    use serial_test::serial;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_OK: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"fallback\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" works\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn test_catalog(host: &str, models: &[&str]) -> ProviderCatalog {
        ProviderCatalog::new(vec![ProviderProfile::new(
            "openai",
            "OpenAI",
            WireFormat::OpenAiCompat,
            host,
            models,
            models[0],
            models[0],
        )])
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("system", vec![Message::user().with_text("hi")])
    }

    async fn collect(mut tokens: TokenStream) -> String {
        let mut out = String::new();
        while let Some(token) = tokens.next().await {
            out.push_str(&token.unwrap().text);
        }
        out
    }

    #[tokio::test]
    #[serial]
    async fn test_first_failure_advances_to_next_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("model-bad"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("model-good"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_OK, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        std::env::set_var("OPENAI_API_KEY", "test-key");
        std::env::remove_var("OPENAI_API_KEY_BACKUP");

        let catalog = test_catalog(&server.uri(), &["model-bad", "model-good"]);
        let failures = ModelFailureCache::new();
        let selection = ModelSelection {
            provider: "openai".to_string(),
            model: "model-bad".to_string(),
        };

        match stream_with_fallback(&catalog, &failures, &selection, &request()).await {
            ChatReply::Stream {
                model, tokens, ..
            } => {
                assert_eq!(model, "model-good");
                assert_eq!(collect(tokens).await, "fallback works");
            }
            ChatReply::Classified(message) => panic!("expected stream, got: {}", message),
        }

        // the failed model was recorded
        let available =
            failures.list_available("openai", &["model-bad".to_string()], None);
        assert!(available.is_empty());

        std::env::remove_var("OPENAI_API_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_exhaustion_yields_classified_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(503).set_body_string("model is overloaded, retry later"),
            )
            .mount(&server)
            .await;

        std::env::set_var("OPENAI_API_KEY", "test-key");
        std::env::remove_var("OPENAI_API_KEY_BACKUP");

        // no fallback models configured besides the requested one
        let catalog = test_catalog(&server.uri(), &["only-model"]);
        let failures = ModelFailureCache::new();
        let selection = ModelSelection {
            provider: "openai".to_string(),
            model: "only-model".to_string(),
        };

        match stream_with_fallback(&catalog, &failures, &selection, &request()).await {
            ChatReply::Classified(message) => {
                assert!(message.to_lowercase().contains("overloaded"));
                assert!(message.contains("What you can do:"));
            }
            ChatReply::Stream { .. } => panic!("expected classified message"),
        }

        std::env::remove_var("OPENAI_API_KEY");
    }

    #[tokio::test]
    #[serial]
    async fn test_secondary_credential_retries_candidate_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(wiremock::matchers::header("Authorization", "Bearer primary"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(wiremock::matchers::header("Authorization", "Bearer backup"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_OK, "text/event-stream"))
            .mount(&server)
            .await;

        std::env::set_var("OPENAI_API_KEY", "primary");
        std::env::set_var("OPENAI_API_KEY_BACKUP", "backup");

        let catalog = test_catalog(&server.uri(), &["only-model"]);
        let failures = ModelFailureCache::new();
        let selection = ModelSelection {
            provider: "openai".to_string(),
            model: "only-model".to_string(),
        };

        match stream_with_fallback(&catalog, &failures, &selection, &request()).await {
            ChatReply::Stream { tokens, .. } => {
                assert_eq!(collect(tokens).await, "fallback works");
            }
            ChatReply::Classified(message) => panic!("expected stream, got: {}", message),
        }

        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_API_KEY_BACKUP");
    }

    #[tokio::test]
    #[serial]
    async fn test_no_credentials_anywhere() {
        for var in [
            "OPENAI_API_KEY",
            "OPENAI_API_KEY_BACKUP",
            "ANTHROPIC_API_KEY",
            "MISTRAL_API_KEY",
            "XAI_API_KEY",
            "GROQ_API_KEY",
            "CEREBRAS_API_KEY",
        ] {
            std::env::remove_var(var);
        }

        let catalog = ProviderCatalog::standard();
        let failures = ModelFailureCache::new();
        let selection = ModelSelection {
            provider: "openai".to_string(),
            model: "gpt-4.1-mini".to_string(),
        };

        match stream_with_fallback(&catalog, &failures, &selection, &request()).await {
            ChatReply::Classified(message) => {
                assert!(message.contains("No AI provider is configured"));
            }
            ChatReply::Stream { .. } => panic!("expected classified message"),
        }
    }
}
