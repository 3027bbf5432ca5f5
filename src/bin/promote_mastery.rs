use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use language_tutor::database::Database;
use language_tutor::models::{CardStatus, Flashcard, MAX_MASTERY_LEVEL, MIN_MASTERY_LEVEL};
use language_tutor::review_scheduler::ReviewScheduler;
use std::env;

/// Mastered cards due sooner than this were not written by the current scheduler.
const HORIZON_THRESHOLD_YEARS: i64 = 50;

#[derive(Debug, Default)]
struct PromotionStats {
    total_cards: usize,
    inconsistent_cards: usize,
    cards_promoted: usize,
    errors: Vec<String>,
}

impl PromotionStats {
    fn print_summary(&self, dry_run: bool) {
        println!("\n=== Promotion Summary ===");
        println!("Total flashcards examined: {}", self.total_cards);
        println!("Flashcards with inconsistent mastery: {}", self.inconsistent_cards);

        if dry_run {
            println!("Flashcards that WOULD BE promoted: {}", self.inconsistent_cards);
            println!("\n** DRY RUN MODE - No changes were made **");
        } else {
            println!("Flashcards promoted to MASTERED: {}", self.cards_promoted);
            if !self.errors.is_empty() {
                println!("Errors encountered: {}", self.errors.len());
                for error in &self.errors {
                    println!("  - {}", error);
                }
            }
        }
    }
}

/// Why a card does not fit the one-shot mastery model.
fn describe_problem(card: &Flashcard, horizon_threshold: DateTime<Utc>) -> &'static str {
    if card.mastery_level > MIN_MASTERY_LEVEL && card.mastery_level < MAX_MASTERY_LEVEL {
        "partial mastery level"
    } else if card.mastery_level == MAX_MASTERY_LEVEL && card.status != CardStatus::Mastered {
        "full level without MASTERED status"
    } else if card.status == CardStatus::Mastered && card.mastery_level != MAX_MASTERY_LEVEL {
        "MASTERED status without full level"
    } else if card.status == CardStatus::Mastered && card.next_review_date < horizon_threshold {
        "MASTERED card due too soon"
    } else {
        "consistent"
    }
}

fn print_preview(card: &Flashcard, horizon_threshold: DateTime<Utc>) {
    println!("\nFlashcard: {} ({})", card.word, card.id);
    println!("  Problem: {}", describe_problem(card, horizon_threshold));
    println!(
        "  Before: status={} level={} next_review={}",
        card.status,
        card.mastery_level,
        card.next_review_date.format("%Y-%m-%d")
    );
}

async fn promote(db: &Database, cards: &[Flashcard], now: DateTime<Utc>) -> Result<PromotionStats> {
    let mut stats = PromotionStats::default();
    let next_review_date = ReviewScheduler::mastered_review_date(now)?;

    for card in cards {
        match db.force_mastered(card.id, next_review_date).await {
            Ok(true) => {
                stats.cards_promoted += 1;
                println!("✓ Promoted '{}' to MASTERED", card.word);
            }
            Ok(false) => {
                stats
                    .errors
                    .push(format!("Flashcard '{}' disappeared before promotion", card.word));
            }
            Err(e) => {
                stats
                    .errors
                    .push(format!("Failed to promote '{}': {}", card.word, e));
            }
        }
    }

    Ok(stats)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let assume_yes = args.iter().any(|a| a == "--yes");

    println!("=== Flashcard Mastery Promotion Tool ===");
    if dry_run {
        println!("** RUNNING IN DRY-RUN MODE **");
        println!("This will show what would be changed without making any updates.");
    } else {
        println!("** LIVE MODE - Changes will be made to the database **");
        println!("Make sure you have backed up your database before proceeding!");
    }

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:language_tutor.db".to_string());

    println!("\nConnecting to database: {}", database_url);
    let db = Database::new(&database_url).await?;

    let now = Utc::now();
    let horizon_threshold = now + Duration::days(365 * HORIZON_THRESHOLD_YEARS);

    println!("\nScanning for flashcards with inconsistent mastery...");
    let cards = db.find_inconsistent_mastery(horizon_threshold).await?;

    let mut stats = PromotionStats {
        total_cards: db.list_flashcards(None).await?.len(),
        inconsistent_cards: cards.len(),
        ..PromotionStats::default()
    };

    if cards.is_empty() {
        println!("\n✓ Every flashcard already follows the one-shot mastery model.");
        stats.print_summary(dry_run);
        return Ok(());
    }

    println!("\nFound {} flashcards to promote:", cards.len());
    for (i, card) in cards.iter().enumerate() {
        if i < 5 || dry_run {
            print_preview(card, horizon_threshold);
        } else {
            println!("\n... and {} more flashcards", cards.len() - 5);
            break;
        }
    }

    if dry_run {
        stats.print_summary(true);
        println!("\nTo perform the promotion, run:");
        println!("cargo run --bin promote_mastery");
        return Ok(());
    }

    if !assume_yes {
        println!("\nProceed with promoting {} flashcards? (y/N): ", cards.len());
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "y" {
            println!("Promotion cancelled.");
            return Ok(());
        }
    }

    println!("\nApplying updates...");
    let applied = promote(&db, &cards, now).await?;
    stats.cards_promoted = applied.cards_promoted;
    stats.errors = applied.errors;

    stats.print_summary(false);

    Ok(())
}
