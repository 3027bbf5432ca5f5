use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::ai_providers::{AiProvider, JsonResponseParser};
pub use crate::errors::AiError;
use crate::prompts::{FeatureRequest, LanguagePair};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::log_ai_operation;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One generation request. Reused unchanged across retries.
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequestConfig {
    pub prompt: String,
    /// JSON schema the output must follow; `None` means free text.
    pub schema: Option<Value>,
    /// Overrides the provider's configured model.
    pub model: Option<String>,
    pub temperature: f32,
}

impl AiRequestConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiResult {
    pub text: String,
    /// Usage accounting for telemetry; 0 when the provider does not report it.
    pub tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureOutput {
    pub feature: &'static str,
    pub data: Value,
    pub tokens: u32,
}

#[derive(Clone)]
pub struct AiService {
    provider: Arc<dyn AiProvider>,
    policy: RetryPolicy,
    max_attempts: u32,
    languages: LanguagePair,
}

impl AiService {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            languages: LanguagePair::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy, max_attempts: u32) -> Self {
        self.policy = policy;
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_languages(mut self, languages: LanguagePair) -> Self {
        self.languages = languages;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    /// Generate with the configured attempt budget.
    pub async fn generate_content(&self, config: &AiRequestConfig) -> Result<AiResult, AiError> {
        self.generate_content_with_retry(config, self.max_attempts).await
    }

    /// Call the provider up to `retries` times.
    ///
    /// Only rate-limit and overload failures are retried, with exponential
    /// backoff between attempts. An empty payload fails at once even with
    /// attempts left, and every other error is returned as the provider
    /// produced it.
    pub async fn generate_content_with_retry(
        &self,
        config: &AiRequestConfig,
        retries: u32,
    ) -> Result<AiResult, AiError> {
        let provider = self.provider.provider_name();
        let started = Instant::now();

        for attempt in 1..=retries {
            match self.provider.generate(config).await {
                Ok(response) => {
                    let text = match response.text {
                        Some(text) if !text.trim().is_empty() => text,
                        _ => {
                            log_ai_operation!(warn, "generate_content", "provider returned no text");
                            return Err(AiError::EmptyResponse);
                        }
                    };
                    let tokens = response.tokens.unwrap_or(0);

                    log_ai_operation!(
                        success,
                        "generate_content",
                        provider = provider,
                        duration_ms = started.elapsed().as_millis() as u64,
                        tokens = tokens
                    );
                    return Ok(AiResult { text, tokens });
                }
                Err(err) => match self.policy.decide(attempt, retries, &err) {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            component = "ai_service",
                            provider = provider,
                            attempt = attempt,
                            max_attempts = retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient AI failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Fail => {
                        log_ai_operation!(
                            error,
                            "generate_content",
                            provider = provider,
                            error = err,
                            retry_count = attempt - 1
                        );
                        return Err(err);
                    }
                },
            }
        }

        Err(AiError::MaxRetriesExceeded { attempts: retries })
    }

    /// Run a feature end to end: build its prompt, call the provider, then
    /// validate and post-process structured output.
    pub async fn run_feature(&self, request: &FeatureRequest) -> Result<FeatureOutput, AiError> {
        let feature = request.name();
        let spec = request.build_prompt(&self.languages);

        log_ai_operation!(
            start,
            feature,
            provider = self.provider.provider_name(),
            structured = spec.schema.is_some()
        );

        let structured = spec.schema.is_some();
        let config = spec.into_config();
        let result = self.generate_content(&config).await?;

        let data = if structured {
            let value = JsonResponseParser::parse_json_value(&result.text).map_err(|e| {
                error!(
                    component = "ai_service",
                    feature = feature,
                    error = %e,
                    raw_output = %result.text,
                    "Failed to parse structured AI output"
                );
                AiError::InvalidOutput {
                    reason: e.to_string(),
                    raw: result.text.clone(),
                }
            })?;
            request.post_process(value)
        } else {
            Value::String(result.text)
        };

        debug!(feature = feature, tokens = result.tokens, "Feature output ready");
        Ok(FeatureOutput {
            feature,
            data,
            tokens: result.tokens,
        })
    }
}
