use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Months, Utc};

use crate::models::{CardStatus, Flashcard, MAX_MASTERY_LEVEL, MIN_MASTERY_LEVEL};

/// How far a mastered card is pushed out. Effectively "never due again".
pub const MASTERED_HORIZON_MONTHS: u32 = 100 * 12;

/// Delay before a forgotten card comes back.
pub const RELEARN_DELAY_HOURS: i64 = 24;

/// Outcome of a single review as reported by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Remembered,
    Forgotten,
}

impl From<bool> for ReviewOutcome {
    fn from(is_remembered: bool) -> Self {
        if is_remembered {
            ReviewOutcome::Remembered
        } else {
            ReviewOutcome::Forgotten
        }
    }
}

/// New scheduling state produced by a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub status: CardStatus,
    pub mastery_level: i32,
    pub next_review_date: DateTime<Utc>,
    pub last_reviewed_at: DateTime<Utc>,
}

/// One-shot mastery scheduler.
///
/// A remembered card jumps straight to `MASTERED` (level 5) and is parked a
/// century out; a forgotten card drops to `LEARNING` (level 0) and is due again
/// tomorrow. Levels 1-4 are never produced here even though the column allows
/// them; `promote_mastery` folds any such legacy rows into `MASTERED`.
#[derive(Debug, Clone, Default)]
pub struct ReviewScheduler;

impl ReviewScheduler {
    pub fn new() -> Self {
        Self
    }

    pub fn schedule(&self, outcome: ReviewOutcome, now: DateTime<Utc>) -> Result<ScheduleUpdate> {
        match outcome {
            ReviewOutcome::Remembered => Ok(ScheduleUpdate {
                status: CardStatus::Mastered,
                mastery_level: MAX_MASTERY_LEVEL,
                next_review_date: Self::mastered_review_date(now)?,
                last_reviewed_at: now,
            }),
            ReviewOutcome::Forgotten => Ok(ScheduleUpdate {
                status: CardStatus::Learning,
                mastery_level: MIN_MASTERY_LEVEL,
                next_review_date: now + Duration::hours(RELEARN_DELAY_HOURS),
                last_reviewed_at: now,
            }),
        }
    }

    /// Apply a review to a card, returning the updated copy.
    pub fn apply_review(
        &self,
        card: &Flashcard,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<Flashcard> {
        let update = self.schedule(outcome, now)?;

        Ok(Flashcard {
            status: update.status,
            mastery_level: update.mastery_level,
            next_review_date: update.next_review_date,
            last_reviewed_at: Some(update.last_reviewed_at),
            ..card.clone()
        })
    }

    /// Due filter: anything not mastered that is either past its date or still
    /// in `NEW`/`LEARNING`.
    pub fn is_due(card: &Flashcard, now: DateTime<Utc>) -> bool {
        let in_progress = matches!(card.status, CardStatus::New | CardStatus::Learning);
        (card.next_review_date <= now || in_progress) && card.status != CardStatus::Mastered
    }

    pub fn mastered_review_date(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_months(Months::new(MASTERED_HORIZON_MONTHS))
            .ok_or_else(|| anyhow!("Mastered review date overflows for {}", now))
    }
}
