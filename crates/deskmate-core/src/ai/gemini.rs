//! Google Gemini `generateContent` client.

use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use super::{fetch_image, AiConfig, AiError, AiRequest, ImageInput, ProviderSettings, TurnRole};
use crate::persona::system_prompt;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    settings: ProviderSettings,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            settings: config.gemini.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    pub async fn complete(&self, request: &AiRequest, model: &str) -> Result<String, AiError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::NotConfigured("GEMINI_API_KEY is not set".into()))?;

        // Gemini only takes inline image data, so URLs are downloaded first.
        let mut images = Vec::with_capacity(request.images.len());
        for image in &request.images {
            match image {
                ImageInput::Inline { data, mime } => images.push((data.clone(), mime.clone())),
                ImageInput::Url(url) => images.push(fetch_image(&self.http, url).await?),
            }
        }

        let body = build_body(request, &images, self.temperature, self.max_output_tokens);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            model
        );
        debug!(model, history = request.history.len(), images = images.len(), "calling gemini");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
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
            .map_err(|e| AiError::InvalidResponse(format!("gemini body is not JSON: {e}")))?;
        parse_response(&value)
    }
}

pub(crate) fn build_body(
    request: &AiRequest,
    images: &[(Vec<u8>, String)],
    temperature: f32,
    max_output_tokens: u32,
) -> Value {
    let mut contents: Vec<Value> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": turn.text }] })
        })
        .collect();

    let mut parts = Vec::new();
    if !request.message.is_empty() {
        parts.push(json!({ "text": request.message }));
    }
    for (data, mime) in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": mime,
                "data": base64::engine::general_purpose::STANDARD.encode(data),
            }
        }));
    }
    contents.push(json!({ "role": "user", "parts": parts }));

    json!({
        "systemInstruction": { "parts": [{ "text": system_prompt(request.persona) }] },
        "contents": contents,
        "generationConfig": {
            "temperature": temperature,
            "maxOutputTokens": max_output_tokens,
        },
    })
}

pub(crate) fn parse_response(value: &Value) -> Result<String, AiError> {
    if let Some(reason) = value.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return Err(AiError::Api { status: 200, message: format!("prompt blocked: {reason}") });
    }

    let candidate = value
        .pointer("/candidates/0")
        .ok_or_else(|| AiError::InvalidResponse("no candidates".into()))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let finish = candidate.get("finishReason").and_then(Value::as_str).unwrap_or("");
    if text.trim().is_empty() {
        return Err(match finish {
            "MAX_TOKENS" => AiError::TokenLimit("gemini stopped at MAX_TOKENS".into()),
            "" => AiError::InvalidResponse("empty candidate".into()),
            other => AiError::Api { status: 200, message: format!("finish reason {other}") },
        });
    }
    Ok(text)
}
