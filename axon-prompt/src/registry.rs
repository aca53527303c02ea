//! `PromptRegistry` (spec §6): versioned, named prompt templates with
//! atomic activate-new-deactivate-prior semantics.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::render::extract_variables;

/// A single registered version of a named prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// The prompt's name.
    pub name: String,
    /// 1-based, contiguous version number for this name.
    pub version: u32,
    /// The raw template content.
    pub content: String,
    /// `true` only for the most recently registered version of this name.
    pub active: bool,
    /// `{\w+}` variables referenced by `content`, in first-occurrence order.
    pub variables: Vec<String>,
}

/// A `resolve` naming a prompt or version that was never registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// No prompt has ever been registered under this name.
    #[error("unknown prompt '{0}'")]
    UnknownPrompt(String),
    /// The name exists but not at this version.
    #[error("prompt '{name}' has no version {version}")]
    UnknownVersion {
        /// The prompt's name.
        name: String,
        /// The requested version.
        version: u32,
    },
}

/// Registry of named, versioned prompt templates. Registering a new
/// version of an existing name atomically activates it and deactivates
/// the previously active version.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<HashMap<String, Vec<Prompt>>>,
}

impl PromptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `content` under `name`, returning the new version.
    pub async fn register(&self, name: impl Into<String>, content: impl Into<String>) -> Prompt {
        let name = name.into();
        let content = content.into();
        let variables = extract_variables(&content);
        let mut prompts = self.prompts.write().await;
        let versions = prompts.entry(name.clone()).or_default();
        for prior in versions.iter_mut() {
            prior.active = false;
        }
        let prompt = Prompt {
            name,
            version: versions.len() as u32 + 1,
            content,
            active: true,
            variables,
        };
        versions.push(prompt.clone());
        prompt
    }

    /// Resolve the currently active version of `name`.
    pub async fn resolve(&self, name: &str) -> Result<Prompt, PromptError> {
        let prompts = self.prompts.read().await;
        prompts
            .get(name)
            .and_then(|versions| versions.iter().find(|p| p.active).cloned())
            .ok_or_else(|| PromptError::UnknownPrompt(name.to_string()))
    }

    /// Resolve a specific version of `name`, active or not.
    pub async fn resolve_version(&self, name: &str, version: u32) -> Result<Prompt, PromptError> {
        let prompts = self.prompts.read().await;
        let versions = prompts
            .get(name)
            .ok_or_else(|| PromptError::UnknownPrompt(name.to_string()))?;
        versions
            .iter()
            .find(|p| p.version == version)
            .cloned()
            .ok_or_else(|| PromptError::UnknownVersion {
                name: name.to_string(),
                version,
            })
    }

    /// Every version of `name`, in ascending version order.
    pub async fn versions(&self, name: &str) -> Vec<Prompt> {
        self.prompts.read().await.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_registration_is_version_one_and_active() {
        let registry = PromptRegistry::new();
        let prompt = registry.register("greeting", "Hi {name}").await;
        assert_eq!(prompt.version, 1);
        assert!(prompt.active);
        assert_eq!(prompt.variables, vec!["name".to_string()]);
    }

    #[tokio::test]
    async fn versions_are_contiguous_and_only_latest_is_active() {
        let registry = PromptRegistry::new();
        registry.register("greeting", "Hi {name}").await;
        registry.register("greeting", "Hello {name}, {mood}").await;
        let versions = registry.versions("greeting").await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, 1);
        assert!(!versions[0].active);
        assert_eq!(versions[1].version, 2);
        assert!(versions[1].active);
    }

    #[tokio::test]
    async fn resolve_returns_active_version() {
        let registry = PromptRegistry::new();
        registry.register("greeting", "v1").await;
        registry.register("greeting", "v2").await;
        let resolved = registry.resolve("greeting").await.unwrap();
        assert_eq!(resolved.content, "v2");
    }

    #[tokio::test]
    async fn resolve_version_reaches_an_inactive_version() {
        let registry = PromptRegistry::new();
        registry.register("greeting", "v1").await;
        registry.register("greeting", "v2").await;
        let resolved = registry.resolve_version("greeting", 1).await.unwrap();
        assert_eq!(resolved.content, "v1");
        assert!(!resolved.active);
    }

    #[tokio::test]
    async fn resolve_unknown_prompt_is_an_error() {
        let registry = PromptRegistry::new();
        assert_eq!(
            registry.resolve("nope").await.unwrap_err(),
            PromptError::UnknownPrompt("nope".to_string())
        );
    }

    #[tokio::test]
    async fn resolve_unknown_version_is_an_error() {
        let registry = PromptRegistry::new();
        registry.register("greeting", "v1").await;
        assert_eq!(
            registry.resolve_version("greeting", 5).await.unwrap_err(),
            PromptError::UnknownVersion {
                name: "greeting".to_string(),
                version: 5
            }
        );
    }
}
