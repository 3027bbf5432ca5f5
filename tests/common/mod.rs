#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use language_tutor::{
    ai_providers::{AiProvider, ProviderResponse},
    api::{create_router, AppState},
    AiError, AiRequestConfig, AiService, Database, FlashcardService, RetryPolicy,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider double that replays a fixed script and records every request.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, AiError>>>,
    requests: Mutex<Vec<AiRequestConfig>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, AiError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<AiRequestConfig> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn generate(&self, config: &AiRequestConfig) -> Result<ProviderResponse, AiError> {
        self.requests.lock().unwrap().push(config.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::provider("Scripted", None, "script exhausted")))
    }

    fn provider_name(&self) -> &'static str {
        "Scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

pub fn reply(text: &str) -> Result<ProviderResponse, AiError> {
    Ok(ProviderResponse {
        text: Some(text.to_string()),
        tokens: Some(120),
    })
}

pub fn overloaded() -> Result<ProviderResponse, AiError> {
    Err(AiError::provider(
        "Scripted",
        Some(503),
        "[503 Service Unavailable] The model is overloaded. Please try again later.",
    ))
}

pub fn rate_limited() -> Result<ProviderResponse, AiError> {
    Err(AiError::provider(
        "Scripted",
        Some(429),
        "[429 Too Many Requests] Resource has been exhausted",
    ))
}

/// Server over an in-memory database. Backoff is shortened so retry paths
/// finish quickly in real time.
pub async fn create_test_server(provider: Arc<ScriptedProvider>) -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let ai_service = AiService::new(provider)
        .with_retry_policy(RetryPolicy::new(Duration::from_millis(5)), 3);
    let state = AppState::new(FlashcardService::new(db), ai_service);

    TestServer::new(create_router(state)).unwrap()
}
