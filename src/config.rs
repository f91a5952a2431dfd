//! Model settings passed in at startup.
//!
//! The library never reads stdin: callers resolve the API key (from a flag,
//! the environment, or an interactive prompt) and hand it over in
//! [`ModelSettings`].

use crate::error::{ChainError, Result};
use crate::model::{ModelConfig, OpenAiChatModel};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Hosted providers with known defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini through its OpenAI-compatible endpoint.
    Gemini,
    /// OpenAI.
    OpenAi,
}

impl Provider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::OpenAi => crate::model::openai::DEFAULT_BASE_URL,
        }
    }

    /// Environment variable conventionally holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Display name used in prompts and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
            Provider::OpenAi => "OpenAI",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "google_genai" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(ChainError::InvalidConfig(format!(
                "unknown provider '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }
}

/// Everything needed to build a chat model.
#[derive(Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Transport timeout for each request. Default: 60 seconds.
    pub timeout: Duration,
}

impl ModelSettings {
    /// Provider defaults, temperature 1.0, no key.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            api_key: None,
            temperature: 1.0,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill a missing API key from the provider's environment variable.
    /// Empty values count as unset.
    pub fn api_key_from_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(self.provider.api_key_env())
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the HTTP chat model. Fails without an API key.
    pub fn build(&self) -> Result<OpenAiChatModel> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ChainError::InvalidConfig(format!(
                "no API key for {} (set {})",
                self.provider.display_name(),
                self.provider.api_key_env()
            ))
        })?;

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChainError::InvalidConfig(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ChainError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        let mut config = ModelConfig::default().with_temperature(self.temperature);
        config.max_tokens = self.max_tokens;

        Ok(OpenAiChatModel::new(self.model.clone())
            .with_client(client)
            .with_base_url(self.base_url.clone())
            .with_api_key(api_key)
            .with_config(config))
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let gemini = ModelSettings::new(Provider::Gemini);
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert_eq!(gemini.temperature, 1.0);
        assert_eq!(Provider::Gemini.api_key_env(), "GOOGLE_API_KEY");

        let openai = ModelSettings::new(Provider::OpenAi);
        assert_eq!(openai.base_url, "https://api.openai.com/v1");
        assert_eq!(Provider::OpenAi.api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("google_genai".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("bedrock".parse::<Provider>().is_err());
    }

    #[test]
    fn test_build_requires_api_key() {
        let err = ModelSettings::new(Provider::OpenAi).build().unwrap_err();
        assert!(matches!(err, ChainError::InvalidConfig(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_build_rejects_bad_temperature() {
        let err = ModelSettings::new(Provider::OpenAi)
            .with_api_key("sk-x")
            .with_temperature(3.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_applies_settings() {
        let model = ModelSettings::new(Provider::Gemini)
            .with_api_key("key")
            .with_model("gemini-1.5-pro")
            .with_max_tokens(Some(64))
            .build()
            .unwrap();
        assert_eq!(model.model(), "gemini-1.5-pro");
        assert!(model.has_api_key());
        assert_eq!(model.config().temperature, 1.0);
        assert_eq!(model.config().max_tokens, Some(64));
        assert!(model.endpoint().starts_with("https://generativelanguage.googleapis.com/"));
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        let settings = ModelSettings::new(Provider::OpenAi)
            .with_api_key("explicit")
            .api_key_from_env();
        assert_eq!(settings.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_debug_hides_key() {
        let settings = ModelSettings::new(Provider::OpenAi).with_api_key("sk-secret");
        assert!(!format!("{:?}", settings).contains("sk-secret"));
    }
}
