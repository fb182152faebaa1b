use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Turn a settings field path like `storage.base_url` into the environment
/// variable the operator has to set.
pub fn to_env_var(field: &str) -> String {
    format!("RELAY_{}", field.replace('.', "__").to_uppercase())
}
