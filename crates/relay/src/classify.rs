//! Buckets upstream failure text into a small taxonomy and renders the
//! user-facing remediation message. Classified failures are delivered as
//! ordinary chat content; only unclassifiable infrastructure failures
//! surface as transport-level errors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ImageFormat,
    ImageNotSupported,
    ImageGenerationFailed,
    ModelOverloaded,
    ContextTooLong,
    RateLimit,
    ApiError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ImageFormat => "image_format",
            ErrorKind::ImageNotSupported => "image_not_supported",
            ErrorKind::ImageGenerationFailed => "image_generation_failed",
            ErrorKind::ModelOverloaded => "model_overloaded",
            ErrorKind::ContextTooLong => "context_too_long",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ApiError => "api_error",
        }
    }
}

/// Map raw upstream error text to a kind. Pure: the same input always yields
/// the same kind. The substring checks are heuristic and ordered from most
/// to least specific.
pub fn classify(raw: &str) -> ErrorKind {
    let text = raw.to_lowercase();

    if text.contains("unsupported image")
        || text.contains("invalid image")
        || text.contains("unsupported format")
        || text.contains("image format")
        || text.contains("could not process image")
    {
        return ErrorKind::ImageFormat;
    }
    if text.contains("does not support image")
        || text.contains("image input") && text.contains("not support")
        || text.contains("vision") && text.contains("not support")
        || text.contains("image_url is only supported")
    {
        return ErrorKind::ImageNotSupported;
    }
    if text.contains("image generation")
        || text.contains("content_policy_violation")
        || text.contains("safety system")
    {
        return ErrorKind::ImageGenerationFailed;
    }
    if text.contains("overloaded")
        || text.contains("at capacity")
        || text.contains("server_error") && text.contains("retry")
        || text.contains("service unavailable")
    {
        return ErrorKind::ModelOverloaded;
    }
    if text.contains("too long")
        || text.contains("too many tokens")
        || text.contains("context length")
        || text.contains("context_length")
        || text.contains("maximum context")
    {
        return ErrorKind::ContextTooLong;
    }
    if text.contains("rate limit")
        || text.contains("rate_limit")
        || text.contains("quota")
        || text.contains("429")
    {
        return ErrorKind::RateLimit;
    }
    ErrorKind::ApiError
}

fn diagnosis(kind: ErrorKind) -> (&'static str, &'static str, &'static [&'static str]) {
    match kind {
        ErrorKind::ImageFormat => (
            "The image could not be processed",
            "The file is in a format the model cannot read, or the data is corrupted.",
            &[
                "Re-upload the image as PNG or JPEG",
                "Ask me to convert the image to another format first",
            ],
        ),
        ErrorKind::ImageNotSupported => (
            "This model cannot look at images",
            "The selected model has no vision capability.",
            &[
                "Switch to a vision-capable model",
                "Remove the attachment and describe the image in text instead",
            ],
        ),
        ErrorKind::ImageGenerationFailed => (
            "Image generation did not complete",
            "The image backend rejected the request or failed while rendering.",
            &[
                "Try rephrasing the image description",
                "Avoid content that may trip the safety filters",
                "Try again in a moment",
            ],
        ),
        ErrorKind::ModelOverloaded => (
            "The model is overloaded right now",
            "The provider is shedding load and temporarily refusing requests.",
            &[
                "Try again in a few seconds",
                "Switch to another model or provider for now",
            ],
        ),
        ErrorKind::ContextTooLong => (
            "The conversation has grown too long for this model",
            "The combined history and message exceed the model's context window.",
            &[
                "Start a fresh conversation",
                "Shorten the message or drop large attachments",
                "Switch to a model with a bigger context window",
            ],
        ),
        ErrorKind::RateLimit => (
            "The provider's rate limit was hit",
            "Too many requests reached the provider in a short time.",
            &[
                "Wait a minute and try again",
                "Switch to another provider while this one cools down",
            ],
        ),
        ErrorKind::ApiError => (
            "The AI provider returned an error",
            "The upstream request failed for an unexpected reason.",
            &[
                "Try again",
                "Switch to another model or provider if it keeps happening",
            ],
        ),
    }
}

/// Render the multi-part remediation message for a classified failure:
/// what happened, the likely cause, concrete next steps, and where to switch
/// model or provider.
pub fn render(kind: ErrorKind, details: Option<&str>, provider_label: Option<&str>) -> String {
    let (headline, cause, steps) = diagnosis(kind);

    let mut message = match provider_label {
        Some(label) => format!("**{}** ({}).\n\n{}\n", headline, label, cause),
        None => format!("**{}.**\n\n{}\n", headline, cause),
    };

    message.push_str("\nWhat you can do:\n");
    for step in steps {
        message.push_str(&format!("- {}\n", step));
    }
    message.push_str(
        "\nYou can change the model or provider for this agent under chat settings.",
    );

    if let Some(details) = details {
        let trimmed: String = details.chars().take(300).collect();
        message.push_str(&format!("\n\n*Details: {}*", trimmed));
    }

    message
}

/// Terminal message for the case where no provider has any credential at all.
pub fn render_no_provider() -> String {
    "**No AI provider is configured.**\n\nNone of the supported providers has \
an API key set, so this chat cannot reach a model.\n\nWhat you can do:\n- Add \
at least one provider API key to the server environment\n- Contact whoever \
operates this deployment\n\nYou can change the model or provider for this \
agent under chat settings once a key is present."
        .to_string()
}
