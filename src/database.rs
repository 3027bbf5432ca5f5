use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

use crate::log_db_operation;
use crate::models::*;
use crate::review_scheduler::ScheduleUpdate;

const FLASHCARD_COLUMNS: &str = r#"
    f.id, f.dictionary_entry_id, f.status, f.mastery_level, f.next_review_date,
    f.last_reviewed_at, f.source_context, f.source_type, f.created_at,
    d.word, d.meaning
"#;

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dictionary_entries (
                id TEXT PRIMARY KEY,
                word TEXT NOT NULL UNIQUE,
                meaning TEXT,
                content TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                dictionary_entry_id TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'NEW',
                mastery_level INTEGER NOT NULL DEFAULT 0,
                next_review_date TEXT NOT NULL,
                last_reviewed_at TEXT,
                source_context TEXT,
                source_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (dictionary_entry_id) REFERENCES dictionary_entries(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_flashcards_next_review ON flashcards(next_review_date)",
        )
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "migrate", "schema is up to date");
        Ok(())
    }

    // Dictionary operations
    pub async fn find_entry_by_word(&self, word: &str) -> Result<Option<DictionaryEntry>> {
        let row = sqlx::query("SELECT * FROM dictionary_entries WHERE word = ?1")
            .bind(word)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_entry(&row)).transpose()
    }

    /// Create the entry for `word` if it is missing. An existing entry is left
    /// untouched, including its meaning.
    pub async fn upsert_entry_by_word(
        &self,
        word: &str,
        meaning: Option<&str>,
    ) -> Result<DictionaryEntry> {
        let now = format_timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO dictionary_entries (id, word, meaning, content, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, ?4, ?4)
            ON CONFLICT(word) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(word)
        .bind(meaning)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_entry_by_word(word)
            .await?
            .ok_or_else(|| anyhow!("Dictionary entry for '{}' vanished after upsert", word))
    }

    /// Store an AI analysis for `word`, refreshing meaning and content if the
    /// entry already exists.
    pub async fn save_entry_analysis(
        &self,
        word: &str,
        meaning: Option<&str>,
        content: &serde_json::Value,
    ) -> Result<DictionaryEntry> {
        let now = format_timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO dictionary_entries (id, word, meaning, content, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(word) DO UPDATE SET
                meaning = COALESCE(excluded.meaning, dictionary_entries.meaning),
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(word)
        .bind(meaning)
        .bind(serde_json::to_string(content)?)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_entry_by_word(word)
            .await?
            .ok_or_else(|| anyhow!("Dictionary entry for '{}' vanished after save", word))
    }

    pub async fn count_entries(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM dictionary_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    fn row_to_entry(row: &SqliteRow) -> Result<DictionaryEntry> {
        let content = row
            .get::<Option<String>, _>("content")
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;

        Ok(DictionaryEntry {
            id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            word: row.get("word"),
            meaning: row.get("meaning"),
            content,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    // Flashcard operations
    pub async fn create_flashcard(
        &self,
        entry: &DictionaryEntry,
        source_context: Option<String>,
        source_type: SourceType,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        let now = now.trunc_subsecs(6);
        let card = Flashcard {
            id: Uuid::new_v4(),
            dictionary_entry_id: entry.id,
            word: entry.word.clone(),
            meaning: entry.meaning.clone(),
            status: CardStatus::New,
            mastery_level: MIN_MASTERY_LEVEL,
            next_review_date: now,
            last_reviewed_at: None,
            source_context,
            source_type,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO flashcards (id, dictionary_entry_id, status, mastery_level, next_review_date,
                                    last_reviewed_at, source_context, source_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(card.id.to_string())
        .bind(card.dictionary_entry_id.to_string())
        .bind(card.status.as_str())
        .bind(card.mastery_level)
        .bind(format_timestamp(card.next_review_date))
        .bind(card.last_reviewed_at.map(format_timestamp))
        .bind(&card.source_context)
        .bind(card.source_type.as_str())
        .bind(format_timestamp(card.created_at))
        .execute(&self.pool)
        .await?;

        Ok(card)
    }

    pub async fn get_flashcard(&self, id: Uuid) -> Result<Option<Flashcard>> {
        let started = Instant::now();
        let query = format!(
            "SELECT {} FROM flashcards f JOIN dictionary_entries d ON d.id = f.dictionary_entry_id WHERE f.id = ?1",
            FLASHCARD_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        log_db_operation!(
            debug,
            "get_flashcard",
            card_id = id,
            duration_ms = started.elapsed().as_millis() as u64
        );
        row.map(|row| Self::row_to_flashcard(&row)).transpose()
    }

    pub async fn find_flashcard_by_entry(&self, entry_id: Uuid) -> Result<Option<Flashcard>> {
        let query = format!(
            "SELECT {} FROM flashcards f JOIN dictionary_entries d ON d.id = f.dictionary_entry_id WHERE f.dictionary_entry_id = ?1",
            FLASHCARD_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(entry_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_flashcard(&row)).transpose()
    }

    /// List cards ordered by next review date. With `due_at` set, only cards
    /// that are due at that instant are returned.
    pub async fn list_flashcards(&self, due_at: Option<DateTime<Utc>>) -> Result<Vec<Flashcard>> {
        let started = Instant::now();
        let rows = match due_at {
            Some(now) => {
                let query = format!(
                    r#"
                    SELECT {} FROM flashcards f
                    JOIN dictionary_entries d ON d.id = f.dictionary_entry_id
                    WHERE (f.next_review_date <= ?1 OR f.status IN ('NEW', 'LEARNING'))
                      AND f.status != 'MASTERED'
                    ORDER BY f.next_review_date ASC, f.created_at ASC
                    "#,
                    FLASHCARD_COLUMNS
                );
                sqlx::query(&query)
                    .bind(format_timestamp(now))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    r#"
                    SELECT {} FROM flashcards f
                    JOIN dictionary_entries d ON d.id = f.dictionary_entry_id
                    ORDER BY f.next_review_date ASC, f.created_at ASC
                    "#,
                    FLASHCARD_COLUMNS
                );
                sqlx::query(&query).fetch_all(&self.pool).await?
            }
        };

        let cards = Self::rows_to_flashcards(rows)?;
        log_db_operation!(
            debug,
            "list_flashcards",
            count = cards.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        Ok(cards)
    }

    /// Write a review result. Returns false when the card no longer exists.
    pub async fn update_flashcard_review(&self, id: Uuid, update: &ScheduleUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET status = ?1, mastery_level = ?2, next_review_date = ?3, last_reviewed_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(update.status.as_str())
        .bind(update.mastery_level)
        .bind(format_timestamp(update.next_review_date))
        .bind(format_timestamp(update.last_reviewed_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_flashcard(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM flashcards WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cards whose level, status and date disagree with the one-shot mastery
    /// model: partial levels, or a mastered flag without the matching level or
    /// horizon.
    pub async fn find_inconsistent_mastery(
        &self,
        horizon_threshold: DateTime<Utc>,
    ) -> Result<Vec<Flashcard>> {
        let query = format!(
            r#"
            SELECT {} FROM flashcards f
            JOIN dictionary_entries d ON d.id = f.dictionary_entry_id
            WHERE (f.mastery_level > 0 AND f.mastery_level < 5)
               OR (f.mastery_level = 5 AND f.status != 'MASTERED')
               OR (f.status = 'MASTERED' AND (f.mastery_level != 5 OR f.next_review_date < ?1))
            ORDER BY f.created_at ASC
            "#,
            FLASHCARD_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(format_timestamp(horizon_threshold))
            .fetch_all(&self.pool)
            .await?;

        Self::rows_to_flashcards(rows)
    }

    /// Force a card into `MASTERED` without touching `last_reviewed_at`.
    pub async fn force_mastered(&self, id: Uuid, next_review_date: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE flashcards SET status = ?1, mastery_level = ?2, next_review_date = ?3 WHERE id = ?4",
        )
        .bind(CardStatus::Mastered.as_str())
        .bind(MAX_MASTERY_LEVEL)
        .bind(format_timestamp(next_review_date))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Raw write used by maintenance tooling and tests to seed legacy rows.
    pub async fn set_mastery_state(
        &self,
        id: Uuid,
        status: CardStatus,
        mastery_level: i32,
        next_review_date: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE flashcards SET status = ?1, mastery_level = ?2, next_review_date = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(mastery_level)
        .bind(format_timestamp(next_review_date))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    fn rows_to_flashcards(rows: Vec<SqliteRow>) -> Result<Vec<Flashcard>> {
        rows.iter().map(Self::row_to_flashcard).collect()
    }

    fn row_to_flashcard(row: &SqliteRow) -> Result<Flashcard> {
        Ok(Flashcard {
            id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            dictionary_entry_id: Uuid::parse_str(&row.get::<String, _>("dictionary_entry_id"))?,
            word: row.get("word"),
            meaning: row.get("meaning"),
            status: row.get::<String, _>("status").parse()?,
            mastery_level: row.get("mastery_level"),
            next_review_date: parse_timestamp(&row.get::<String, _>("next_review_date"))?,
            last_reviewed_at: row
                .get::<Option<String>, _>("last_reviewed_at")
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            source_context: row.get("source_context"),
            source_type: row.get::<String, _>("source_type").parse()?,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        })
    }
}
