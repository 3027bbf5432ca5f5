use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{error, info, warn};

/// Message shown to users whenever the AI provider is rate limiting or overloaded.
pub const SERVICE_BUSY_MESSAGE: &str =
    "The AI service is busy right now. Please try again in a moment.";

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("AI service error: {0}")]
    AiError(String),

    #[error("AI service busy: {0}")]
    ServiceBusy(String),

    #[error("Invalid AI output: {0}")]
    InvalidAiOutput(String),

    #[error("AI configuration error: {0}")]
    AiConfiguration(String),

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateResource(_) => StatusCode::CONFLICT,
            ApiError::ServiceBusy(_) | ApiError::AiError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidAiOutput(_)
            | ApiError::AiConfiguration(_)
            | ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        let status = self.status_code();
        let message = match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                context
                    .user_friendly_message
                    .unwrap_or_else(|| format!("{} not found", context.resource_type))
            }
            ApiError::ValidationError(_) | ApiError::DuplicateResource(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Rejected request"
                );
                self.to_string()
            }
            ApiError::ServiceBusy(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "AI provider busy after retries"
                );
                SERVICE_BUSY_MESSAGE.to_string()
            }
            ApiError::AiError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "AI service error"
                );
                "AI service temporarily unavailable. Please try again.".to_string()
            }
            ApiError::InvalidAiOutput(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "AI returned malformed structured output"
                );
                "The AI service returned an unexpected response. Please try again.".to_string()
            }
            ApiError::AiConfiguration(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "AI provider configuration error"
                );
                "AI model configuration error. Check the configured model name.".to_string()
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                "Database operation failed. Please try again.".to_string()
            }
        };

        (status, Json(ApiResponse::error(message)))
    }

    /// Simple conversion without context
    pub fn to_response(self) -> (StatusCode, Json<ApiResponse<()>>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(anyhow::Error::from(err))
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err.kind() {
            Some(ProviderErrorKind::RateLimited) | Some(ProviderErrorKind::Overloaded) => {
                ApiError::ServiceBusy(err.to_string())
            }
            Some(ProviderErrorKind::ModelNotFound) => ApiError::AiConfiguration(err.to_string()),
            _ => match err {
                AiError::InvalidOutput { reason, .. } => ApiError::InvalidAiOutput(reason),
                other => ApiError::AiError(other.to_string()),
            },
        }
    }
}

/// Helper function to detect error types from anyhow error messages
pub fn classify_database_error(error: &anyhow::Error) -> ApiError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("already exists") || error_str.contains("unique constraint") {
        ApiError::DuplicateResource("Resource already exists".to_string())
    } else if error_str.contains("not found") || error_str.contains("no rows") {
        ApiError::NotFound("Resource not found".to_string())
    } else if error_str.contains("required") || error_str.contains("cannot be null") {
        ApiError::ValidationError("Required field is missing or invalid".to_string())
    } else {
        ApiError::DatabaseError(anyhow::anyhow!("{}", error))
    }
}

// ============================================================================
// AI pipeline errors
// ============================================================================

/// Structured classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimited,
    Overloaded,
    ModelNotFound,
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Overloaded => "overloaded",
            ProviderErrorKind::ModelNotFound => "model_not_found",
            ProviderErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

static RATE_LIMIT_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b429\b|too many requests|resource[_ ]exhausted|rate limit")
        .expect("rate limit pattern is valid")
});

static OVERLOAD_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b503\b|overloaded|service unavailable")
        .expect("overload pattern is valid")
});

static MODEL_NOT_FOUND_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b404\b|model .*not found|invalid model|unknown model")
        .expect("model pattern is valid")
});

impl ProviderErrorKind {
    /// Classify from the HTTP status when there is one, otherwise from the
    /// signal substrings providers put in their error messages.
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(429) => return ProviderErrorKind::RateLimited,
            Some(503) => return ProviderErrorKind::Overloaded,
            Some(404) => return ProviderErrorKind::ModelNotFound,
            _ => {}
        }

        if RATE_LIMIT_SIGNAL.is_match(message) {
            ProviderErrorKind::RateLimited
        } else if OVERLOAD_SIGNAL.is_match(message) {
            ProviderErrorKind::Overloaded
        } else if MODEL_NOT_FOUND_SIGNAL.is_match(message) {
            ProviderErrorKind::ModelNotFound
        } else {
            ProviderErrorKind::Other
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderErrorKind::RateLimited | ProviderErrorKind::Overloaded)
    }
}

/// Failures of a single AI invocation.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("{provider} request failed [{kind}]: {message}")]
    Provider {
        provider: String,
        kind: ProviderErrorKind,
        status: Option<u16>,
        message: String,
    },

    #[error("AI provider returned an empty response")]
    EmptyResponse,

    #[error("AI output is not valid JSON: {reason}")]
    InvalidOutput { reason: String, raw: String },

    #[error("AI request failed after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

impl AiError {
    /// Build a provider error, classifying it from status and message.
    pub fn provider(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        AiError::Provider {
            provider: provider.to_string(),
            kind: ProviderErrorKind::classify(status, &message),
            status,
            message,
        }
    }

    pub fn kind(&self) -> Option<ProviderErrorKind> {
        match self {
            AiError::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_some_and(|kind| kind.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("create_flashcard", "flashcard")
            .with_id("123")
            .with_user_message("Custom message");

        assert_eq!(context.operation, "create_flashcard");
        assert_eq!(context.resource_type, "flashcard");
        assert_eq!(context.resource_id, Some("123".to_string()));
        assert_eq!(
            context.user_friendly_message,
            Some("Custom message".to_string())
        );
    }

    #[test]
    fn test_error_classification() {
        let duplicate_error =
            anyhow::anyhow!("UNIQUE constraint failed: flashcards.dictionary_entry_id");
        let classified = classify_database_error(&duplicate_error);
        assert!(matches!(classified, ApiError::DuplicateResource(_)));

        let not_found_error = anyhow::anyhow!("No rows returned");
        let classified = classify_database_error(&not_found_error);
        assert!(matches!(classified, ApiError::NotFound(_)));

        let other = anyhow::anyhow!("disk I/O error");
        assert!(matches!(classify_database_error(&other), ApiError::DatabaseError(_)));
    }

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::NotFound("Flashcard not found".to_string());
        let context = ErrorContext::new("get_flashcard", "flashcard").with_id("123");
        let (status, _response) = error.to_response_with_context(context);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = ApiError::ValidationError("Invalid data".to_string()).to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ApiError::DuplicateResource("Already exists".to_string()).to_response();
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = ApiError::ServiceBusy("429".to_string()).to_response();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0.error.as_deref(), Some(SERVICE_BUSY_MESSAGE));
    }

    #[test]
    fn test_provider_kind_prefers_status() {
        assert_eq!(
            ProviderErrorKind::classify(Some(429), "whatever"),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            ProviderErrorKind::classify(Some(503), ""),
            ProviderErrorKind::Overloaded
        );
        assert_eq!(
            ProviderErrorKind::classify(Some(404), ""),
            ProviderErrorKind::ModelNotFound
        );
        assert_eq!(
            ProviderErrorKind::classify(Some(400), "bad request"),
            ProviderErrorKind::Other
        );
    }

    #[test]
    fn test_provider_kind_falls_back_to_message_signals() {
        let cases = [
            ("[429 Too Many Requests] quota exceeded", ProviderErrorKind::RateLimited),
            ("RESOURCE_EXHAUSTED", ProviderErrorKind::RateLimited),
            ("got status 503 from upstream", ProviderErrorKind::Overloaded),
            ("The model is Overloaded. Please try again later.", ProviderErrorKind::Overloaded),
            ("models/gemini-9 is not found (404)", ProviderErrorKind::ModelNotFound),
            ("invalid model", ProviderErrorKind::ModelNotFound),
            ("API key not valid", ProviderErrorKind::Other),
        ];

        for (message, expected) in cases {
            assert_eq!(
                ProviderErrorKind::classify(None, message),
                expected,
                "message '{}'",
                message
            );
        }
    }

    #[test]
    fn test_ai_error_maps_to_api_error() {
        let busy = AiError::provider("Gemini", Some(503), "Overloaded");
        assert!(busy.is_transient());
        assert!(matches!(ApiError::from(busy), ApiError::ServiceBusy(_)));

        let config = AiError::provider("Gemini", Some(404), "model not found");
        assert!(!config.is_transient());
        assert!(matches!(ApiError::from(config), ApiError::AiConfiguration(_)));

        let invalid = AiError::InvalidOutput {
            reason: "expected value".to_string(),
            raw: "not json".to_string(),
        };
        assert!(matches!(ApiError::from(invalid), ApiError::InvalidAiOutput(_)));

        assert!(matches!(ApiError::from(AiError::EmptyResponse), ApiError::AiError(_)));
        assert!(matches!(
            ApiError::from(AiError::MaxRetriesExceeded { attempts: 0 }),
            ApiError::AiError(_)
        ));
    }
}
