//! Chat configuration.
//!
//! Values are resolved in layers, later layers winning:
//! 1. built-in defaults
//! 2. `.priceyy/settings.json` in the workspace
//! 3. environment (`OPENROUTER_API_KEY`, `PRICEYY_MODEL`,
//!    `PRICEYY_PRICING_URL`, `PRICEYY_MAX_ROUNDS`)
//! 4. command-line flags, applied by the caller through the builder methods

use std::path::{Path, PathBuf};

use priceyy_pricing::DEFAULT_PRICING_URL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChatError, ChatResult};
use crate::models::{default_fallbacks, DEFAULT_MODEL};

/// OpenRouter's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default bound on model turns per round.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Workspace directory holding settings, threads and the cart.
pub const WORKSPACE_DIR: &str = ".priceyy";

/// Path of the settings file under a workspace root.
pub fn settings_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(WORKSPACE_DIR).join("settings.json")
}

/// Contents of `.priceyy/settings.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub fallback_models: Option<Vec<String>>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,
    pub max_rounds: Option<usize>,
    pub pricing_api_url: Option<String>,
}

impl Settings {
    /// Read settings from a workspace. A missing file yields empty settings.
    pub fn load(workspace_root: &Path) -> ChatResult<Self> {
        let path = settings_path(workspace_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let settings = serde_json::from_str(&content)
            .map_err(|e| ChatError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }
}

/// Resolved chat configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub fallback_models: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub max_rounds: usize,
    pub pricing_api_url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fallback_models: default_fallbacks(),
            max_tokens: 4096,
            temperature: 0.7,
            stream: true,
            max_rounds: DEFAULT_MAX_ROUNDS,
            pricing_api_url: DEFAULT_PRICING_URL.to_string(),
        }
    }
}

impl ChatConfig {
    /// Resolve defaults, workspace settings and the process environment.
    pub fn load(workspace_root: &Path) -> ChatResult<Self> {
        let settings = Settings::load(workspace_root)?;
        Self::default()
            .with_settings(settings)
            .with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from a settings file.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        if let Some(key) = settings.api_key.filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = settings.base_url {
            self.base_url = url;
        }
        if let Some(model) = settings.default_model {
            self.model = model;
        }
        if let Some(fallbacks) = settings.fallback_models {
            self.fallback_models = fallbacks;
        }
        if let Some(max_tokens) = settings.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = settings.temperature {
            self.temperature = temperature;
        }
        if let Some(stream) = settings.stream {
            self.stream = stream;
        }
        if let Some(max_rounds) = settings.max_rounds {
            self.max_rounds = max_rounds;
        }
        if let Some(url) = settings.pricing_api_url {
            self.pricing_api_url = url;
        }
        self
    }

    /// Overlay environment variables read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = get("PRICEYY_MODEL") {
            self.model = model;
        }
        if let Some(url) = get("PRICEYY_PRICING_URL") {
            self.pricing_api_url = url;
        }
        if let Some(raw) = get("PRICEYY_MAX_ROUNDS") {
            let rounds = raw.trim().parse::<usize>().map_err(|_| {
                ChatError::Config(format!("PRICEYY_MAX_ROUNDS must be a number, got '{}'", raw))
            })?;
            self.max_rounds = rounds;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_pricing_api_url(mut self, url: impl Into<String>) -> Self {
        self.pricing_api_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.max_rounds == 0 {
            return Err(ChatError::Config("maxRounds must be at least 1".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// The API key, or `LlmNotConfigured` when chat is used without one.
    pub fn require_api_key(&self) -> ChatResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ChatError::LlmNotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.max_rounds, 10);
        assert!(config.stream);
        assert_eq!(config.pricing_api_url, "http://localhost:8083");
        assert!(matches!(config.require_api_key(), Err(ChatError::LlmNotConfigured)));
    }

    #[test]
    fn test_layering_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(WORKSPACE_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("settings.json"),
            r#"{"apiKey": "from-file", "defaultModel": "qwen/qwen3-coder:free", "maxRounds": 4, "stream": false}"#,
        )
        .unwrap();

        let settings = Settings::load(temp.path()).unwrap();
        let config = ChatConfig::default()
            .with_settings(settings)
            .with_env(env(&[("OPENROUTER_API_KEY", "from-env"), ("PRICEYY_MAX_ROUNDS", "6")]))
            .unwrap()
            .with_model("z-ai/glm-4.5-air:free");

        assert_eq!(config.require_api_key().unwrap(), "from-env");
        assert_eq!(config.max_rounds, 6);
        assert!(!config.stream);
        assert_eq!(config.model, "z-ai/glm-4.5-air:free");
    }

    #[test]
    fn test_missing_settings_file() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Settings::load(temp.path()).unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_env_values_rejected() {
        let result = ChatConfig::default().with_env(env(&[("PRICEYY_MAX_ROUNDS", "lots")]));
        assert!(matches!(result, Err(ChatError::Config(_))));

        let result = ChatConfig::default().with_env(env(&[("PRICEYY_MAX_ROUNDS", "0")]));
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let config = ChatConfig::default()
            .with_env(env(&[("OPENROUTER_API_KEY", "  "), ("PRICEYY_MODEL", "")]))
            .unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
