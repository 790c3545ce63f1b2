//! OpenAI chat-completions client.

use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use super::{AiConfig, AiError, AiRequest, ImageInput, ProviderSettings, TurnRole};
use crate::persona::system_prompt;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    settings: ProviderSettings,
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            settings: config.openai.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    pub async fn complete(&self, request: &AiRequest, model: &str) -> Result<String, AiError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::NotConfigured("OPENAI_API_KEY is not set".into()))?;

        let body = build_body(request, model, self.temperature, self.max_output_tokens);
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        debug!(model, history = request.history.len(), images = request.images.len(), "calling openai");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(AiError::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(AiError::from_transport)?;
        if !status.is_success() {
            return Err(AiError::from_status(status.as_u16(), &text));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AiError::InvalidResponse(format!("openai body is not JSON: {e}")))?;
        parse_response(&value)
    }
}

pub(crate) fn build_body(request: &AiRequest, model: &str, temperature: f32, max_tokens: u32) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt(request.persona) })];

    messages.extend(request.history.iter().map(|turn| {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        };
        json!({ "role": role, "content": turn.text })
    }));

    let current = if request.images.is_empty() {
        json!(request.message)
    } else {
        let mut parts = Vec::new();
        if !request.message.is_empty() {
            parts.push(json!({ "type": "text", "text": request.message }));
        }
        for image in &request.images {
            let url = match image {
                ImageInput::Url(url) => url.clone(),
                ImageInput::Inline { data, mime } => format!(
                    "data:{mime};base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(data)
                ),
            };
            parts.push(json!({ "type": "image_url", "image_url": { "url": url } }));
        }
        Value::Array(parts)
    };
    messages.push(json!({ "role": "user", "content": current }));

    json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "max_tokens": max_tokens,
    })
}

pub(crate) fn parse_response(value: &Value) -> Result<String, AiError> {
    let choice = value
        .pointer("/choices/0")
        .ok_or_else(|| AiError::InvalidResponse("no choices".into()))?;
    let text = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match choice.get("finish_reason").and_then(Value::as_str) {
            Some("length") => AiError::TokenLimit("openai stopped at max_tokens".into()),
            Some("content_filter") => AiError::Api { status: 200, message: "content filtered".into() },
            _ => AiError::InvalidResponse("empty completion".into()),
        });
    }
    Ok(text.to_owned())
}
