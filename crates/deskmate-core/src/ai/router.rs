use async_trait::async_trait;
use tracing::info;

use super::{AiBackend, AiConfig, AiError, AiReply, AiRequest, GeminiClient, OpenAiClient, Provider, Selection};
use crate::persona::Persona;

/// Dispatches each request to the provider configured for its persona.
#[derive(Debug, Clone)]
pub struct ProviderRouter {
    config: AiConfig,
    gemini: GeminiClient,
    openai: OpenAiClient,
}

impl ProviderRouter {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        Ok(Self {
            gemini: GeminiClient::new(&config)?,
            openai: OpenAiClient::new(&config)?,
            config,
        })
    }

    pub fn selection(&self, persona: Option<Persona>) -> Selection {
        self.config.select(persona)
    }
}

#[async_trait]
impl AiBackend for ProviderRouter {
    async fn generate(&self, request: &AiRequest) -> Result<AiReply, AiError> {
        let Selection { provider, model } = self.selection(request.persona);
        let started = std::time::Instant::now();

        let text = match provider {
            Provider::Gemini => self.gemini.complete(request, &model).await?,
            Provider::Openai => self.openai.complete(request, &model).await?,
        };

        info!(
            provider = %provider,
            model = %model,
            persona = ?request.persona,
            reply_len = text.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "ai reply generated"
        );
        Ok(AiReply { text, provider: provider.to_string(), model })
    }
}
