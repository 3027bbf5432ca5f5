pub mod ai_providers;
pub mod ai_service;
pub mod api;
pub mod card_service;
pub mod config;
pub mod database;
pub mod dictionary_service;
pub mod errors;
pub mod logging;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod review_scheduler;

pub use ai_providers::{AiProvider, AiProviderFactory, AiProviderType, JsonResponseParser};
pub use ai_service::{AiRequestConfig, AiResult, AiService};
pub use card_service::FlashcardService;
pub use database::Database;
pub use dictionary_service::DictionaryService;
pub use errors::*;
pub use models::*;
pub use prompts::{FeatureRequest, LanguagePair};
pub use retry::{RetryDecision, RetryPolicy};
pub use review_scheduler::{ReviewOutcome, ReviewScheduler};
