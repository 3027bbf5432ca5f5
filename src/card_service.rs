use chrono::{SubsecRound, Utc};
use std::time::Instant;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{classify_database_error, ApiError};
use crate::models::*;
use crate::review_scheduler::{ReviewOutcome, ReviewScheduler};
use crate::{log_service_start, log_service_success, log_service_warn};

#[derive(Clone)]
pub struct FlashcardService {
    db: Database,
    scheduler: ReviewScheduler,
}

impl FlashcardService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            scheduler: ReviewScheduler::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create a flashcard for `word`, creating its dictionary entry on the way
    /// if needed. A word can back at most one flashcard.
    pub async fn create_card(&self, request: CreateFlashcardRequest) -> Result<Flashcard, ApiError> {
        let word = request.word.trim();
        if word.is_empty() {
            return Err(ApiError::ValidationError("Word must not be empty".to_string()));
        }
        log_service_start!("flashcard_service", "create_card", word = word);

        let meaning = request
            .meaning
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let entry = self.db.upsert_entry_by_word(word, meaning).await?;

        if self.db.find_flashcard_by_entry(entry.id).await?.is_some() {
            log_service_warn!(
                "flashcard_service",
                "create_card",
                format!("flashcard for '{}' already exists", word)
            );
            return Err(ApiError::DuplicateResource(format!(
                "A flashcard for '{}' already exists",
                word
            )));
        }

        let context = request
            .context_usage
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        // A concurrent create can still trip the unique index
        let card = self
            .db
            .create_flashcard(&entry, context, request.source_type, Utc::now())
            .await
            .map_err(|e| match classify_database_error(&e) {
                ApiError::DuplicateResource(_) => ApiError::DuplicateResource(format!(
                    "A flashcard for '{}' already exists",
                    word
                )),
                other => other,
            })?;

        log_service_success!("flashcard_service", "create_card", "flashcard created");
        Ok(card)
    }

    pub async fn get_card(&self, id: Uuid) -> Result<Flashcard, ApiError> {
        self.db
            .get_flashcard(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Flashcard {}", id)))
    }

    /// All cards, or only the ones due right now, ordered by next review date.
    pub async fn get_cards(&self, only_due: bool) -> Result<Vec<Flashcard>, ApiError> {
        let due_at = only_due.then(Utc::now);
        Ok(self.db.list_flashcards(due_at).await?)
    }

    /// Record a review outcome and persist the new schedule in one UPDATE.
    pub async fn submit_review(&self, id: Uuid, is_remembered: bool) -> Result<Flashcard, ApiError> {
        let started = Instant::now();
        log_service_start!("flashcard_service", "submit_review", card_id = id);

        let card = self.get_card(id).await?;
        let now = Utc::now().trunc_subsecs(6);
        let outcome = ReviewOutcome::from(is_remembered);

        let update = self.scheduler.schedule(outcome, now)?;
        if !self.db.update_flashcard_review(id, &update).await? {
            // Deleted between the read and the write
            return Err(ApiError::NotFound(format!("Flashcard {}", id)));
        }

        let reviewed = self.scheduler.apply_review(&card, outcome, now)?;
        log_service_success!(
            "flashcard_service",
            "submit_review",
            card_id = id,
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(reviewed)
    }

    pub async fn delete_card(&self, id: Uuid) -> Result<(), ApiError> {
        if self.db.delete_flashcard(id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("Flashcard {}", id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardStatus, MAX_MASTERY_LEVEL, MIN_MASTERY_LEVEL};
    use chrono::Duration;

    async fn setup() -> FlashcardService {
        let db = Database::new("sqlite::memory:").await.unwrap();
        FlashcardService::new(db)
    }

    fn request(word: &str) -> CreateFlashcardRequest {
        CreateFlashcardRequest {
            word: word.to_string(),
            meaning: Some("dog".to_string()),
            context_usage: Some("El perro ladra".to_string()),
            source_type: SourceType::Story,
        }
    }

    #[tokio::test]
    async fn test_create_card_starts_new_and_due() {
        let service = setup().await;
        let before = Utc::now();

        let card = service.create_card(request("  perro ")).await.unwrap();

        assert_eq!(card.word, "perro");
        assert_eq!(card.meaning.as_deref(), Some("dog"));
        assert_eq!(card.status, CardStatus::New);
        assert_eq!(card.mastery_level, MIN_MASTERY_LEVEL);
        assert!(card.next_review_date <= Utc::now());
        assert!(card.next_review_date >= before - Duration::seconds(1));
        assert!(card.last_reviewed_at.is_none());
        assert_eq!(card.source_type, SourceType::Story);
    }

    #[tokio::test]
    async fn test_create_card_rejects_blank_word() {
        let service = setup().await;
        let err = service.create_card(request("   ")).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert_eq!(service.database().count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_word_conflicts_without_second_entry() {
        let service = setup().await;
        service.create_card(request("perro")).await.unwrap();

        let err = service.create_card(request("perro ")).await.unwrap_err();

        assert!(matches!(err, ApiError::DuplicateResource(_)));
        assert_eq!(service.database().count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_entry_meaning_is_reused() {
        let service = setup().await;
        service
            .database()
            .upsert_entry_by_word("gato", Some("cat"))
            .await
            .unwrap();

        let card = service
            .create_card(CreateFlashcardRequest {
                word: "gato".to_string(),
                meaning: Some("kitty".to_string()),
                context_usage: None,
                source_type: SourceType::Manual,
            })
            .await
            .unwrap();

        assert_eq!(card.meaning.as_deref(), Some("cat"));
    }

    #[tokio::test]
    async fn test_remembered_review_masters_card() {
        let service = setup().await;
        let card = service.create_card(request("perro")).await.unwrap();

        let reviewed = service.submit_review(card.id, true).await.unwrap();

        assert_eq!(reviewed.status, CardStatus::Mastered);
        assert_eq!(reviewed.mastery_level, MAX_MASTERY_LEVEL);
        assert!(reviewed.next_review_date > Utc::now() + Duration::days(365 * 50));

        // Persisted state matches what was returned
        let stored = service.get_card(card.id).await.unwrap();
        assert_eq!(stored.status, CardStatus::Mastered);
        assert_eq!(stored.next_review_date, reviewed.next_review_date);
        assert_eq!(stored.last_reviewed_at, reviewed.last_reviewed_at);
    }

    #[tokio::test]
    async fn test_forgotten_review_schedules_tomorrow() {
        let service = setup().await;
        let card = service.create_card(request("perro")).await.unwrap();
        let now = Utc::now();

        let reviewed = service.submit_review(card.id, false).await.unwrap();

        assert_eq!(reviewed.status, CardStatus::Learning);
        assert_eq!(reviewed.mastery_level, MIN_MASTERY_LEVEL);
        assert!(reviewed.next_review_date >= now);
        assert!(reviewed.next_review_date <= now + Duration::hours(25));
        assert_eq!(reviewed.source_context.as_deref(), Some("El perro ladra"));
    }

    #[tokio::test]
    async fn test_review_unknown_card_is_not_found() {
        let service = setup().await;
        let err = service.submit_review(Uuid::new_v4(), true).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_due_list_excludes_mastered_and_includes_new() {
        let service = setup().await;
        let mastered = service.create_card(request("perro")).await.unwrap();
        let fresh = service.create_card(request("gato")).await.unwrap();
        let parked = service.create_card(request("casa")).await.unwrap();

        service.submit_review(mastered.id, true).await.unwrap();
        // NEW cards are due even with a future date
        service
            .database()
            .set_mastery_state(
                parked.id,
                CardStatus::New,
                MIN_MASTERY_LEVEL,
                Utc::now() + Duration::days(30),
            )
            .await
            .unwrap();

        let due = service.get_cards(true).await.unwrap();
        let due_ids: Vec<Uuid> = due.iter().map(|c| c.id).collect();

        assert!(!due_ids.contains(&mastered.id));
        assert!(due_ids.contains(&fresh.id));
        assert!(due_ids.contains(&parked.id));
        assert!(due.iter().all(|c| ReviewScheduler::is_due(c, Utc::now())));

        let all = service.get_cards(false).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all
            .windows(2)
            .all(|pair| pair[0].next_review_date <= pair[1].next_review_date));
    }

    #[tokio::test]
    async fn test_delete_card() {
        let service = setup().await;
        let card = service.create_card(request("perro")).await.unwrap();

        service.delete_card(card.id).await.unwrap();

        assert!(matches!(
            service.get_card(card.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            service.delete_card(card.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
