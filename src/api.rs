use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ai_service::{AiService, FeatureOutput},
    card_service::FlashcardService,
    dictionary_service::DictionaryService,
    errors::{ApiError, ErrorContext},
    models::*,
    prompts::FeatureRequest,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Clone)]
pub struct AppState {
    pub flashcard_service: FlashcardService,
    pub dictionary_service: DictionaryService,
    pub ai_service: AiService,
}

impl AppState {
    pub fn new(flashcard_service: FlashcardService, ai_service: AiService) -> Self {
        let dictionary_service =
            DictionaryService::new(flashcard_service.database().clone(), ai_service.clone());
        Self {
            flashcard_service,
            dictionary_service,
            ai_service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub due: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// Flashcard endpoints
pub async fn create_flashcard(
    State(state): State<AppState>,
    Json(request): Json<CreateFlashcardRequest>,
) -> ApiResult<Flashcard> {
    log_api_start!("create_flashcard", word = request.word);
    let word = request.word.clone();

    match state.flashcard_service.create_card(request).await {
        Ok(card) => {
            log_api_success!("create_flashcard", card_id = card.id, "flashcard created");
            Ok(Json(ApiResponse::success(card)))
        }
        Err(e) => {
            let context = ErrorContext::new("create_flashcard", "flashcard").with_id(word.trim());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn list_flashcards(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> ApiResult<Vec<Flashcard>> {
    let only_due = query.due.unwrap_or(false);
    log_api_start!("list_flashcards");

    match state.flashcard_service.get_cards(only_due).await {
        Ok(cards) => {
            log_api_success!("list_flashcards", count = cards.len(), "flashcards listed");
            Ok(Json(ApiResponse::success(cards)))
        }
        Err(e) => {
            log_api_error!("list_flashcards", error = e, "failed to list flashcards");
            Err(e.to_response_with_context(ErrorContext::new("list_flashcards", "flashcard")))
        }
    }
}

pub async fn get_flashcard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Flashcard> {
    log_api_start!("get_flashcard", card_id = id);

    match state.flashcard_service.get_card(id).await {
        Ok(card) => Ok(Json(ApiResponse::success(card))),
        Err(e) => {
            let context = ErrorContext::new("get_flashcard", "Flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn review_flashcard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(submission): Json<ReviewSubmission>,
) -> ApiResult<Flashcard> {
    log_api_start!("review_flashcard", card_id = id);

    match state
        .flashcard_service
        .submit_review(id, submission.is_remembered)
        .await
    {
        Ok(card) => {
            log_api_success!("review_flashcard", card_id = id, "review recorded");
            Ok(Json(ApiResponse::success(card)))
        }
        Err(e) => {
            log_api_warn!("review_flashcard", card_id = id, "review was not recorded");
            let context =
                ErrorContext::new("review_flashcard", "Flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn delete_flashcard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<bool> {
    log_api_start!("delete_flashcard", card_id = id);

    match state.flashcard_service.delete_card(id).await {
        Ok(()) => {
            log_api_success!("delete_flashcard", card_id = id, "flashcard deleted");
            Ok(Json(ApiResponse::success(true)))
        }
        Err(e) => {
            let context =
                ErrorContext::new("delete_flashcard", "Flashcard").with_id(&id.to_string());
            Err(e.to_response_with_context(context))
        }
    }
}

// Dictionary endpoints
pub async fn get_dictionary_entry(
    State(state): State<AppState>,
    Path(word): Path<String>,
) -> ApiResult<DictionaryEntry> {
    log_api_start!("get_dictionary_entry", word = word);

    match state.dictionary_service.get_entry(&word).await {
        Ok(entry) => Ok(Json(ApiResponse::success(entry))),
        Err(e) => {
            let context =
                ErrorContext::new("get_dictionary_entry", "Dictionary entry").with_id(&word);
            Err(e.to_response_with_context(context))
        }
    }
}

pub async fn lookup_word(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> ApiResult<DictionaryEntry> {
    log_api_start!("lookup_word", word = request.word);

    match state
        .dictionary_service
        .lookup(&request.word, request.context.as_deref())
        .await
    {
        Ok(entry) => {
            log_api_success!("lookup_word", word = entry.word, "entry returned");
            Ok(Json(ApiResponse::success(entry)))
        }
        Err(e) => {
            let context = ErrorContext::new("lookup_word", "Dictionary entry")
                .with_id(request.word.trim());
            Err(e.to_response_with_context(context))
        }
    }
}

// AI endpoints
pub async fn generate_feature(
    State(state): State<AppState>,
    Json(request): Json<FeatureRequest>,
) -> ApiResult<FeatureOutput> {
    let feature = request.name();
    log_api_start!("generate_feature", feature = feature);

    if let Err(reason) = request.validate() {
        return Err(ApiError::ValidationError(reason)
            .to_response_with_context(ErrorContext::new("generate_feature", feature)));
    }

    match state.ai_service.run_feature(&request).await {
        Ok(output) => {
            log_api_success!("generate_feature", "feature content generated");
            Ok(Json(ApiResponse::success(output)))
        }
        Err(e) => {
            log_api_error!("generate_feature", feature = feature, error = e, "AI feature failed");
            Err(ApiError::from(e)
                .to_response_with_context(ErrorContext::new("generate_feature", feature)))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Flashcard routes
        .route("/api/flashcards", post(create_flashcard).get(list_flashcards))
        .route(
            "/api/flashcards/:id",
            get(get_flashcard).delete(delete_flashcard),
        )
        .route("/api/flashcards/:id/review", post(review_flashcard))
        // Dictionary routes
        .route("/api/dictionary/lookup", post(lookup_word))
        .route("/api/dictionary/:word", get(get_dictionary_entry))
        // AI routes
        .route("/api/ai/generate", post(generate_feature))
        .with_state(state)
}
