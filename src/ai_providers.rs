use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::ai_service::AiRequestConfig;
use crate::errors::AiError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Raw outcome of one provider call, before the pipeline applies its contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub text: Option<String>,
    pub tokens: Option<u32>,
}

/// A generative text backend. Implementations are stateless configuration and
/// are shared across concurrent requests.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(&self, config: &AiRequestConfig) -> Result<ProviderResponse, AiError>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiProviderType {
    Gemini,
    OpenAI,
}

impl AiProviderType {
    /// Parse a provider name, returning `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gemini" | "google" => Some(AiProviderType::Gemini),
            "openai" | "chatgpt" | "gpt" => Some(AiProviderType::OpenAI),
            _ => None,
        }
    }
}

/// Factory for creating AI providers based on provider type
pub struct AiProviderFactory;

impl AiProviderFactory {
    pub fn create_provider(
        provider_type: AiProviderType,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Arc<dyn AiProvider> {
        match provider_type {
            AiProviderType::Gemini => Arc::new(GeminiProvider::new(api_key, base_url, model)),
            AiProviderType::OpenAI => Arc::new(OpenAIProvider::new(api_key, base_url, model)),
        }
    }
}

/// Turn a non-success HTTP response into a classified provider error.
async fn error_from_response(provider: &'static str, response: Response) -> AiError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    // Both providers wrap failures as {"error": {"message": ...}}
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    error!(
        provider = provider,
        status = %status,
        error = %detail,
        "AI API request failed"
    );

    AiError::provider(provider, Some(status.as_u16()), format!("[{}] {}", status, detail))
}

/// Connection-level failure. The URL is stripped so credentials never reach
/// the error text.
fn transport_error(provider: &'static str, err: reqwest::Error) -> AiError {
    let status = err.status().map(|s| s.as_u16());
    AiError::provider(provider, status, err.without_url().to_string())
}

/// Gemini provider implementation
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }

    fn build_request(config: &AiRequestConfig) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(config.prompt.clone()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: config.temperature,
                response_mime_type: if config.schema.is_some() {
                    "application/json"
                } else {
                    "text/plain"
                },
                response_schema: config.schema.clone(),
            },
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn generate(&self, config: &AiRequestConfig) -> Result<ProviderResponse, AiError> {
        let model = config.model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        info!(
            provider = self.provider_name(),
            model = %model,
            structured = config.schema.is_some(),
            prompt_length = config.prompt.len(),
            "Making AI request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&Self::build_request(config))
            .send()
            .await
            .map_err(|e| transport_error(self.provider_name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.provider_name(), response).await);
        }

        let body: GeminiResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "Malformed AI response body");
                return Ok(ProviderResponse::default());
            }
        };

        let text = body
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty());

        Ok(ProviderResponse {
            text,
            tokens: body.usage_metadata.and_then(|u| u.total_token_count),
        })
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI provider implementation
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        }
    }

    fn build_request(&self, config: &AiRequestConfig) -> OpenAIRequest {
        OpenAIRequest {
            model: config.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: Some(config.prompt.clone()),
            }],
            temperature: config.temperature,
            response_format: config.schema.as_ref().map(|schema| {
                json!({
                    "type": "json_schema",
                    "json_schema": { "name": "response", "schema": schema }
                })
            }),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAIProvider {
    async fn generate(&self, config: &AiRequestConfig) -> Result<ProviderResponse, AiError> {
        let request_body = self.build_request(config);

        info!(
            provider = self.provider_name(),
            model = %request_body.model,
            structured = config.schema.is_some(),
            prompt_length = config.prompt.len(),
            "Making AI request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(self.provider_name(), e))?;

        if !response.status().is_success() {
            return Err(error_from_response(self.provider_name(), response).await);
        }

        let body: OpenAIResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(provider = self.provider_name(), error = %e, "Malformed AI response body");
                return Ok(ProviderResponse::default());
            }
        };

        Ok(ProviderResponse {
            text: body
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|text| !text.is_empty()),
            tokens: body.usage.and_then(|u| u.total_tokens),
        })
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Centralized JSON response parser with robust extraction logic
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Extract JSON from responses that might be wrapped in markdown or other formatting
    pub fn extract_json_from_response(content: &str) -> String {
        // Try to find JSON within markdown code blocks
        if let Some(start) = content.find("```json") {
            if let Some(end) = content[start + 7..].find("```") {
                let json_start = start + 7;
                return content[json_start..json_start + end].trim().to_string();
            }
        }

        // Try to find JSON within plain code blocks
        if let Some(start) = content.find("```") {
            if let Some(end) = content[start + 3..].find("```") {
                let json_start = start + 3;
                let potential_json = content[json_start..json_start + end].trim();
                if potential_json.starts_with('{') || potential_json.starts_with('[') {
                    return potential_json.to_string();
                }
            }
        }

        let trimmed = content.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return trimmed.to_string();
        }

        // Standalone object or array surrounded by prose
        if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
            if end > start {
                return content[start..=end].to_string();
            }
        }
        if let (Some(start), Some(end)) = (content.find('['), content.rfind(']')) {
            if end > start {
                return content[start..=end].to_string();
            }
        }

        trimmed.to_string()
    }

    pub fn parse_json_value(content: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&Self::extract_json_from_response(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured_config() -> AiRequestConfig {
        AiRequestConfig::new("Explain 'perro'")
            .with_schema(json!({"type": "object"}))
            .with_temperature(0.2)
    }

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(AiProviderType::parse("Gemini"), Some(AiProviderType::Gemini));
        assert_eq!(AiProviderType::parse("google"), Some(AiProviderType::Gemini));
        assert_eq!(AiProviderType::parse("gpt"), Some(AiProviderType::OpenAI));
        assert_eq!(AiProviderType::parse("claude"), None);
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = serde_json::to_value(GeminiProvider::build_request(&structured_config())).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Explain 'perro'");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "object");

        let plain = serde_json::to_value(GeminiProvider::build_request(&AiRequestConfig::new("hi")))
            .unwrap();
        assert_eq!(plain["generationConfig"]["responseMimeType"], "text/plain");
        assert!(plain["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_openai_request_uses_json_schema_format() {
        let provider = OpenAIProvider::new("key".to_string(), None, None);
        let body = serde_json::to_value(provider.build_request(&structured_config())).unwrap();

        assert_eq!(body["model"], DEFAULT_OPENAI_MODEL);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["messages"][0]["role"], "user");

        let override_model = structured_config().with_model("gpt-4o");
        let body = serde_json::to_value(provider.build_request(&override_model)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn test_factory_respects_model_defaults() {
        let gemini = AiProviderFactory::create_provider(AiProviderType::Gemini, "k".into(), None, None);
        assert_eq!(gemini.provider_name(), "Gemini");
        assert_eq!(gemini.model_name(), DEFAULT_GEMINI_MODEL);

        let openai = AiProviderFactory::create_provider(
            AiProviderType::OpenAI,
            "k".into(),
            None,
            Some("gpt-4.1".into()),
        );
        assert_eq!(openai.model_name(), "gpt-4.1");
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let content = "Here you go:\n```json\n{\"meaning\": \"dog\"}\n```\nEnjoy";
        assert_eq!(
            JsonResponseParser::extract_json_from_response(content),
            "{\"meaning\": \"dog\"}"
        );
    }

    #[test]
    fn test_extract_json_from_prose() {
        let content = "Sure! {\"a\": [1, 2]} hope that helps";
        let value = JsonResponseParser::parse_json_value(content).unwrap();
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        assert!(JsonResponseParser::parse_json_value("no json here").is_err());
    }
}
