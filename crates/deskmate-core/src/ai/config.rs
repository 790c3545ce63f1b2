//! Provider and model selection.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString, IntoEnumIterator};

use crate::persona::Persona;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    Gemini,
    Openai,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// Default model for this provider.
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaOverride {
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: Provider,
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub overrides: HashMap<Persona, PersonaOverride>,
}

/// The provider/model pair a request will be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub provider: Provider,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            gemini: ProviderSettings {
                api_key: None,
                model: "gemini-2.0-flash".to_owned(),
                base_url: "https://generativelanguage.googleapis.com".to_owned(),
            },
            openai: ProviderSettings {
                api_key: None,
                model: "gpt-4o-mini".to_owned(),
                base_url: "https://api.openai.com/v1".to_owned(),
            },
            timeout: Duration::from_secs(60),
            temperature: 0.7,
            max_output_tokens: 2048,
            overrides: HashMap::new(),
        }
    }
}

impl AiConfig {
    /// Build from a key lookup (normally `std::env::var`), defaulting every
    /// missing or unparsable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let provider_from = |key: &str| {
            get(key).and_then(|v| match v.parse::<Provider>() {
                Ok(p) => Some(p),
                Err(_) => {
                    tracing::warn!(key, value = %v, "unknown AI provider; ignoring");
                    None
                }
            })
        };

        let mut overrides = HashMap::new();
        for persona in Persona::iter() {
            let prefix = format!("DESK_AI_{}", persona.as_ref().to_uppercase());
            let entry = PersonaOverride {
                provider: provider_from(&format!("{prefix}_PROVIDER")),
                model: get(&format!("{prefix}_MODEL")),
            };
            if entry != PersonaOverride::default() {
                overrides.insert(persona, entry);
            }
        }

        Self {
            provider: provider_from("DESK_AI_PROVIDER").unwrap_or(defaults.provider),
            gemini: ProviderSettings {
                api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL").unwrap_or(defaults.gemini.model),
                base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini.base_url),
            },
            openai: ProviderSettings {
                api_key: get("OPENAI_API_KEY"),
                model: get("OPENAI_MODEL").unwrap_or(defaults.openai.model),
                base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
            },
            timeout: get("DESK_AI_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: get("DESK_AI_TEMPERATURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
            max_output_tokens: get("DESK_AI_MAX_OUTPUT_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_output_tokens),
            overrides,
        }
    }

    pub fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Gemini => &self.gemini,
            Provider::Openai => &self.openai,
        }
    }

    /// Per-persona override first, then the global provider and its default model.
    pub fn select(&self, persona: Option<Persona>) -> Selection {
        let over = persona.and_then(|p| self.overrides.get(&p));
        let provider = over.and_then(|o| o.provider).unwrap_or(self.provider);
        let model = over
            .and_then(|o| o.model.clone())
            .unwrap_or_else(|| self.settings(provider).model.clone());
        Selection { provider, model }
    }
}
