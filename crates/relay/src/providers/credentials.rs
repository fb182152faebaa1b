use super::catalog::PRIMARY_PROVIDER;

/// Credentials are read from the environment at call time rather than cached,
/// so rotating a key does not require a restart.
pub fn api_key(provider: &str) -> Option<String> {
    let var = match provider {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        "mistral" => "MISTRAL_API_KEY",
        "xai" => "XAI_API_KEY",
        "groq" => "GROQ_API_KEY",
        "cerebras" => "CEREBRAS_API_KEY",
        _ => return None,
    };
    std::env::var(var).ok().filter(|key| !key.is_empty())
}

/// The secondary credential used when every candidate fails under the primary
/// key. Only the primary provider carries one.
pub fn backup_api_key(provider: &str) -> Option<String> {
    if provider != PRIMARY_PROVIDER {
        return None;
    }
    std::env::var("OPENAI_API_KEY_BACKUP")
        .ok()
        .filter(|key| !key.is_empty())
}

pub fn has_credential(provider: &str) -> bool {
    api_key(provider).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_api_key_reads_env() {
        std::env::set_var("MISTRAL_API_KEY", "sk-test");
        assert_eq!(api_key("mistral").as_deref(), Some("sk-test"));
        std::env::remove_var("MISTRAL_API_KEY");
        assert_eq!(api_key("mistral"), None);
    }

    #[test]
    #[serial]
    fn test_empty_key_counts_as_missing() {
        std::env::set_var("GROQ_API_KEY", "");
        assert!(!has_credential("groq"));
        std::env::remove_var("GROQ_API_KEY");
    }

    #[test]
    #[serial]
    fn test_backup_key_only_for_primary() {
        std::env::set_var("OPENAI_API_KEY_BACKUP", "sk-backup");
        assert_eq!(backup_api_key("openai").as_deref(), Some("sk-backup"));
        assert_eq!(backup_api_key("anthropic"), None);
        std::env::remove_var("OPENAI_API_KEY_BACKUP");
    }
}
