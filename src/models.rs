use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Mastery level stored on a card that has never been remembered.
pub const MIN_MASTERY_LEVEL: i32 = 0;

/// Mastery level stored on a `MASTERED` card.
pub const MAX_MASTERY_LEVEL: i32 = 5;

/// Review lifecycle of a flashcard. `Mastered` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    New,
    Learning,
    Mastered,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::New => "NEW",
            CardStatus::Learning => "LEARNING",
            CardStatus::Mastered => "MASTERED",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(CardStatus::New),
            "LEARNING" => Ok(CardStatus::Learning),
            "MASTERED" => Ok(CardStatus::Mastered),
            other => Err(anyhow::anyhow!("Unknown card status '{}'", other)),
        }
    }
}

/// Where a flashcard was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[default]
    Dictionary,
    Story,
    Challenge,
    Manual,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Dictionary => "DICTIONARY",
            SourceType::Story => "STORY",
            SourceType::Challenge => "CHALLENGE",
            SourceType::Manual => "MANUAL",
        }
    }
}

impl FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DICTIONARY" => Ok(SourceType::Dictionary),
            "STORY" => Ok(SourceType::Story),
            "CHALLENGE" => Ok(SourceType::Challenge),
            "MANUAL" => Ok(SourceType::Manual),
            other => Err(anyhow::anyhow!("Unknown source type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    pub id: Uuid,
    pub word: String,
    pub meaning: Option<String>,
    /// AI analysis of the word, stored as returned by the `explain_vocab` feature.
    pub content: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: Uuid,
    pub dictionary_entry_id: Uuid,
    pub word: String,
    pub meaning: Option<String>,
    pub status: CardStatus,
    /// Declared range is 0-5 but review only ever writes 0 or 5.
    pub mastery_level: i32,
    pub next_review_date: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub source_context: Option<String>,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlashcardRequest {
    pub word: String,
    pub meaning: Option<String>,
    pub context_usage: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub is_remembered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub word: String,
    pub context: Option<String>,
}
