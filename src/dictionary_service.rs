use std::time::Instant;

use crate::ai_service::AiService;
use crate::database::Database;
use crate::errors::ApiError;
use crate::models::DictionaryEntry;
use crate::prompts::FeatureRequest;
use crate::{log_service_error, log_service_start, log_service_success};

/// Word lookup backed by the dictionary store, falling back to an AI analysis
/// for words that have not been analysed yet.
#[derive(Clone)]
pub struct DictionaryService {
    db: Database,
    ai: AiService,
}

impl DictionaryService {
    pub fn new(db: Database, ai: AiService) -> Self {
        Self { db, ai }
    }

    pub async fn get_entry(&self, word: &str) -> Result<DictionaryEntry, ApiError> {
        let word = word.trim();
        self.db
            .find_entry_by_word(word)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Dictionary entry '{}'", word)))
    }

    /// Return the analysed entry for `word`. A stored analysis is served as is;
    /// otherwise `explain_vocab` runs and its result is saved on the entry.
    pub async fn lookup(
        &self,
        word: &str,
        context: Option<&str>,
    ) -> Result<DictionaryEntry, ApiError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(ApiError::ValidationError("Word must not be empty".to_string()));
        }

        if let Some(entry) = self.db.find_entry_by_word(word).await? {
            if entry.content.is_some() {
                return Ok(entry);
            }
        }

        let started = Instant::now();
        log_service_start!("dictionary_service", "lookup", word = word);

        let request = FeatureRequest::ExplainVocab {
            word: word.to_string(),
            context: context
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        };
        let output = self.ai.run_feature(&request).await.map_err(|e| {
            log_service_error!("dictionary_service", "lookup", word = word, error = e);
            ApiError::from(e)
        })?;

        let meaning = output
            .data
            .get("meaning")
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let entry = self.db.save_entry_analysis(word, meaning, &output.data).await?;

        log_service_success!(
            "dictionary_service",
            "lookup",
            word = word,
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(entry)
    }
}
