use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::catalog::{ProviderCatalog, PRIMARY_PROVIDER};

/// Chat quality mode: quick picks the fast/cheap model for the provider,
/// advanced the higher-quality one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Quick,
    Advanced,
}

/// Static per-agent configuration supplied to the routing core. Persona text
/// lives here but is opaque to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub quick_model: Option<String>,
    #[serde(default)]
    pub advanced_model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate and helpful responses.";

#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentConfig>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self {
            agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    /// A small built-in roster used when no agent file is deployed.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            AgentConfig {
                id: "assistant".to_string(),
                provider: "openai".to_string(),
                quick_model: None,
                advanced_model: None,
                system_prompt: None,
            },
            AgentConfig {
                id: "researcher".to_string(),
                provider: "anthropic".to_string(),
                quick_model: None,
                advanced_model: None,
                system_prompt: Some(
                    "You are a meticulous research assistant. Cite what you know \
and say what you don't."
                        .to_string(),
                ),
            },
        ])
    }

    /// Load the agent roster from a YAML file: a list of AgentConfig entries.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read agent file {}", path.display()))?;
        let agents: Vec<AgentConfig> =
            serde_yaml::from_str(&raw).context("Failed to parse agent file")?;
        Ok(Self::new(agents))
    }

    pub fn get(&self, id: &str) -> Option<&AgentConfig> {
        self.agents.get(id)
    }

    pub fn system_prompt(&self, id: Option<&str>) -> String {
        id.and_then(|id| self.get(id))
            .and_then(|agent| agent.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

/// Pick the provider and model for one turn.
///
/// Precedence: explicit override > the agent's configured provider and
/// per-mode model > the hardcoded default provider. Pure over its inputs;
/// credential availability is the orchestrator's concern.
pub fn resolve(
    registry: &AgentRegistry,
    catalog: &ProviderCatalog,
    agent_id: Option<&str>,
    provider_override: Option<&str>,
    model_override: Option<&str>,
    mode: ChatMode,
) -> ModelSelection {
    let agent = agent_id.and_then(|id| registry.get(id));

    let provider_name = provider_override
        .filter(|name| catalog.get(name).is_some())
        .or_else(|| {
            agent
                .map(|a| a.provider.as_str())
                .filter(|name| catalog.get(name).is_some())
        })
        .unwrap_or(PRIMARY_PROVIDER);

    let profile = catalog
        .get(provider_name)
        .expect("default provider must exist in the catalog");

    let model = model_override
        .map(|m| m.to_string())
        .or_else(|| {
            agent.and_then(|a| match mode {
                ChatMode::Quick => a.quick_model.clone(),
                ChatMode::Advanced => a.advanced_model.clone(),
            })
        })
        .unwrap_or_else(|| match mode {
            ChatMode::Quick => profile.quick_model.clone(),
            ChatMode::Advanced => profile.advanced_model.clone(),
        });

    ModelSelection {
        provider: provider_name.to_string(),
        model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(vec![AgentConfig {
            id: "einstein".to_string(),
            provider: "anthropic".to_string(),
            quick_model: Some("claude-3-haiku-20240307".to_string()),
            advanced_model: None,
            system_prompt: Some("You are Albert Einstein.".to_string()),
        }])
    }

    #[test]
    fn test_explicit_override_wins() {
        let catalog = ProviderCatalog::standard();
        let selection = resolve(
            &registry(),
            &catalog,
            Some("einstein"),
            Some("mistral"),
            Some("mistral-large-2501"),
            ChatMode::Quick,
        );
        assert_eq!(selection.provider, "mistral");
        assert_eq!(selection.model, "mistral-large-2501");
    }

    #[test]
    fn test_agent_config_supplies_provider_and_mode_model() {
        let catalog = ProviderCatalog::standard();
        let selection = resolve(
            &registry(),
            &catalog,
            Some("einstein"),
            None,
            None,
            ChatMode::Quick,
        );
        assert_eq!(selection.provider, "anthropic");
        assert_eq!(selection.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_mode_falls_back_to_profile_default() {
        let catalog = ProviderCatalog::standard();
        // the agent has no advanced model configured
        let selection = resolve(
            &registry(),
            &catalog,
            Some("einstein"),
            None,
            None,
            ChatMode::Advanced,
        );
        assert_eq!(selection.provider, "anthropic");
        assert_eq!(
            selection.model,
            catalog.get("anthropic").unwrap().advanced_model
        );
    }

    #[test]
    fn test_unknown_agent_and_provider_fall_back_to_default() {
        let catalog = ProviderCatalog::standard();
        let selection = resolve(
            &registry(),
            &catalog,
            Some("nobody"),
            Some("made-up"),
            None,
            ChatMode::Quick,
        );
        assert_eq!(selection.provider, PRIMARY_PROVIDER);
        assert_eq!(
            selection.model,
            catalog.get(PRIMARY_PROVIDER).unwrap().quick_model
        );
    }

    #[test]
    fn test_system_prompt_lookup() {
        let registry = registry();
        assert_eq!(
            registry.system_prompt(Some("einstein")),
            "You are Albert Einstein."
        );
        assert_eq!(registry.system_prompt(None), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(registry.system_prompt(Some("nobody")), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_registry_yaml_round_trip() {
        let yaml = r#"
- id: chef
  provider: mistral
  quick_model: mistral-small-2501
  system_prompt: You are a passionate chef.
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.yaml");
        std::fs::write(&path, yaml).unwrap();

        let registry = AgentRegistry::from_yaml_file(&path).unwrap();
        let chef = registry.get("chef").unwrap();
        assert_eq!(chef.provider, "mistral");
        assert_eq!(chef.quick_model.as_deref(), Some("mistral-small-2501"));
    }
}
